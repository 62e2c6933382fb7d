//! The orchestrator wiring store, VCS, builder, and worker pool.
//!
//! The read path is a read-through cache: a hit streams from the store, a
//! miss queues a background sync and returns the queued sentinel
//! immediately. Worker failures are logged and swallowed; the store stays
//! empty for that fingerprint and the next request re-queues.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::builder::DocBuilder;
use crate::git::VcsClient;
use crate::manifest::Manifest;
use crate::pool::{Job, JobKind, PoolError, WorkerPool};
use crate::source::RemoteSource;
use crate::store::{ArtifactStore, Result, StoreError};

/// Outcome of a read that may have triggered a background sync.
#[derive(Debug)]
pub enum Cached<T> {
    /// The artifact was present in the store.
    Ready(T),
    /// The artifact was missing; a sync job is now in flight (queued by this
    /// request or an earlier one).
    Queued,
}

impl<T> Cached<T> {
    /// Map the ready value, preserving the queued state.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Cached<U> {
        match self {
            Cached::Ready(value) => Cached::Ready(f(value)),
            Cached::Queued => Cached::Queued,
        }
    }
}

struct Capabilities {
    store: Arc<dyn ArtifactStore>,
    vcs: Arc<dyn VcsClient>,
    builder: Arc<dyn DocBuilder>,
    pool: WorkerPool,
}

/// Materializes and caches documentation for remote sources.
///
/// Cheap to clone; all clones share one set of capabilities.
#[derive(Clone)]
pub struct DocsRepository {
    inner: Arc<Capabilities>,
}

impl DocsRepository {
    /// Wire the orchestrator from its capabilities.
    #[must_use]
    pub fn new(
        store: Arc<dyn ArtifactStore>,
        vcs: Arc<dyn VcsClient>,
        builder: Arc<dyn DocBuilder>,
        pool: WorkerPool,
    ) -> Self {
        Self {
            inner: Arc::new(Capabilities {
                store,
                vcs,
                builder,
                pool,
            }),
        }
    }

    /// The central read path: open the manifest, or queue the sync that will
    /// produce it.
    ///
    /// Store errors other than a miss are surfaced verbatim.
    pub fn get_docs_manifest(&self, source: &RemoteSource) -> Result<Cached<Manifest>> {
        match self.inner.store.open_manifest(source) {
            Ok(manifest) => Ok(Cached::Ready(manifest)),
            Err(StoreError::NotFound) => {
                let kind = if source.is_latest() {
                    JobKind::SyncLatest
                } else {
                    JobKind::SyncRepository
                };
                self.queue(kind, source.clone());
                Ok(Cached::Queued)
            }
            Err(e) => Err(e),
        }
    }

    /// Whether the artifact is present, without queueing anything.
    #[must_use]
    pub fn is_ready(&self, source: &RemoteSource) -> bool {
        self.inner.store.open_manifest(source).is_ok()
    }

    /// Submit a sync job, coalescing with any identical in-flight job.
    fn queue(&self, kind: JobKind, source: RemoteSource) {
        let job = Job::new(kind, source.clone());
        let fingerprint = job.fingerprint();
        let this = self.clone();
        let result = self.inner.pool.add_job(job, async move {
            match kind {
                JobKind::SyncLatest => this.run_sync_latest(source).await,
                JobKind::SyncRepository => this.run_sync_repository(source).await,
            }
        });
        match result {
            Ok(()) => {}
            Err(PoolError::JobExists) => debug!(%fingerprint, "sync already in flight"),
            Err(PoolError::PoolStopped) => warn!(%fingerprint, "sync refused, shutting down"),
        }
    }

    /// Resolve `latest` to a concrete version, link it, and chain the
    /// repository sync for the resolved version.
    async fn run_sync_latest(&self, source: RemoteSource) {
        let tag = match self.inner.vcs.latest_tag(&source.url()).await {
            Ok(tag) => tag,
            Err(e) => {
                error!(%source, error = %e, "latest resolution failed");
                return;
            }
        };
        info!(%source, version = %tag.name, "resolved latest");

        let resolved = source.with_version(&tag.name);
        if let Err(e) = self.inner.store.link_latest(&resolved) {
            error!(source = %resolved, error = %e, "linking latest failed");
            return;
        }

        self.queue(JobKind::SyncRepository, resolved);
    }

    /// Clone, build, and publish one concrete `(repository, version)`.
    async fn run_sync_repository(&self, source: RemoteSource) {
        let workdir = match tempfile::tempdir() {
            Ok(dir) => dir,
            Err(e) => {
                error!(%source, error = %e, "could not create working directory");
                return;
            }
        };
        let checkout = workdir.path().join("checkout");

        if let Err(e) = self
            .inner
            .vcs
            .clone_repo(&source.url(), &source.version, &checkout)
            .await
        {
            error!(%source, error = %e, "clone failed");
            return;
        }

        if !self.inner.builder.has_build_script(&checkout) {
            info!(%source, "checkout has no build script, nothing to document");
            return;
        }

        let manifest = match self.inner.builder.build(&checkout).await {
            Ok(manifest) => manifest,
            Err(e) => {
                error!(%source, error = %e, "documentation build failed");
                return;
            }
        };

        let store = Arc::clone(&self.inner.store);
        let publish_source = source.clone();
        let published =
            tokio::task::spawn_blocking(move || store.write_manifest(&publish_source, &manifest))
                .await;
        match published {
            Ok(Ok(())) => info!(%source, "documentation synced"),
            Ok(Err(e)) => error!(%source, error = %e, "publishing artifact failed"),
            Err(e) => error!(%source, error = %e, "publish task failed"),
        }
    }
}
