//! Fingerprinted background job registry.
//!
//! The pool admits a job only when no job with the same fingerprint is
//! already running, which is what coalesces duplicate sync requests: the
//! second submitter gets [`PoolError::JobExists`] and treats it as "someone
//! else is already handling it".

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::source::RemoteSource;

/// Result type alias for pool operations.
pub type Result<T> = std::result::Result<T, PoolError>;

/// Error type for job admission.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// A job with the same fingerprint is already running.
    #[error("an identical job is already running")]
    JobExists,

    /// The pool is shutting down and refuses new work.
    #[error("worker pool stopped")]
    PoolStopped,
}

/// What a sync job does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// Resolve `latest` to a concrete version, link it, and chain a
    /// [`JobKind::SyncRepository`] for the resolved version.
    SyncLatest,
    /// Clone, build, and publish one concrete `(repository, version)`.
    SyncRepository,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::SyncLatest => write!(f, "SyncLatest"),
            JobKind::SyncRepository => write!(f, "SyncRepository"),
        }
    }
}

/// A unit of background work, owning its source identity.
#[derive(Debug, Clone)]
pub struct Job {
    /// The artifact the job materializes.
    pub source: RemoteSource,
    /// What to do for it.
    pub kind: JobKind,
}

impl Job {
    /// Create a job for `source`.
    #[must_use]
    pub fn new(kind: JobKind, source: RemoteSource) -> Self {
        Self { source, kind }
    }

    /// The deduplication key: `kind ":" repository "@" version`.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        fingerprint(self.kind, &self.source.repository, &self.source.version)
    }
}

/// Build a fingerprint without constructing a [`Job`].
#[must_use]
pub fn fingerprint(kind: JobKind, repository: &str, version: &str) -> String {
    format!("{kind}:{repository}@{version}")
}

struct PoolState {
    jobs: HashMap<String, JoinHandle<()>>,
    shutdown: bool,
}

struct PoolInner {
    state: Mutex<PoolState>,
    completions: Notify,
}

/// Registry of in-flight background jobs.
///
/// Cheap to clone; all clones share one registry.
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerPool {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    jobs: HashMap::new(),
                    shutdown: false,
                }),
                completions: Notify::new(),
            }),
        }
    }

    /// Admit `job` and spawn `body` for it.
    ///
    /// The fingerprint table is checked and updated under one guard held
    /// across the spawn, so two submitters racing on the same fingerprint
    /// cannot both succeed. The worker task deregisters itself on every
    /// terminal path.
    pub fn add_job<F>(&self, job: Job, body: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = job.fingerprint();
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.shutdown {
            return Err(PoolError::PoolStopped);
        }
        if state.jobs.contains_key(&key) {
            return Err(PoolError::JobExists);
        }

        debug!(fingerprint = %key, "job admitted");
        let pool = self.clone();
        let completed_key = key.clone();
        let handle = tokio::spawn(async move {
            body.await;
            pool.complete(&completed_key);
        });
        state.jobs.insert(key, handle);
        Ok(())
    }

    /// Whether a job with this exact fingerprint is in flight.
    #[must_use]
    pub fn is_running(&self, fingerprint: &str) -> bool {
        let state = self.inner.state.lock().expect("pool mutex poisoned");
        state.jobs.contains_key(fingerprint)
    }

    /// Whether any repository sync for `repository` is in flight, under any
    /// version. Covers the window in which a `latest` chain has moved on to
    /// its resolved version.
    #[must_use]
    pub fn has_repository_sync(&self, repository: &str) -> bool {
        let prefix = format!("{}:{repository}@", JobKind::SyncRepository);
        let state = self.inner.state.lock().expect("pool mutex poisoned");
        state.jobs.keys().any(|key| key.starts_with(&prefix))
    }

    /// Number of in-flight jobs.
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.inner.state.lock().expect("pool mutex poisoned");
        state.jobs.len()
    }

    /// Whether no job is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Completion notifier: fired once per job on its terminal path.
    ///
    /// Waiters should create (and enable) the notified future before
    /// re-checking state, so a completion between check and wait is not
    /// missed.
    #[must_use]
    pub fn completions(&self) -> &Notify {
        &self.inner.completions
    }

    fn complete(&self, fingerprint: &str) {
        {
            let mut state = self.inner.state.lock().expect("pool mutex poisoned");
            state.jobs.remove(fingerprint);
        }
        debug!(%fingerprint, "job completed");
        self.inner.completions.notify_waiters();
    }

    /// Refuse new work and join every in-flight job. Idempotent.
    pub async fn shutdown(&self) {
        let handles: Vec<JoinHandle<()>> = {
            let mut state = self.inner.state.lock().expect("pool mutex poisoned");
            state.shutdown = true;
            state.jobs.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Semaphore;

    fn job(kind: JobKind, path: &str) -> Job {
        Job::new(kind, RemoteSource::parse(path).unwrap())
    }

    #[test]
    fn test_fingerprint_format() {
        let j = job(JobKind::SyncLatest, "github.com/a/b");
        assert_eq!(j.fingerprint(), "SyncLatest:github.com/a/b@latest");

        let j = job(JobKind::SyncRepository, "github.com/a/b@v1.0.0");
        assert_eq!(j.fingerprint(), "SyncRepository:github.com/a/b@v1.0.0");
    }

    #[tokio::test]
    async fn test_duplicate_fingerprint_rejected() {
        let pool = WorkerPool::new();
        let gate = Arc::new(Semaphore::new(0));

        let wait = Arc::clone(&gate);
        pool.add_job(job(JobKind::SyncLatest, "github.com/a/b"), async move {
            let _permit = wait.acquire().await;
        })
        .unwrap();

        let err = pool
            .add_job(job(JobKind::SyncLatest, "github.com/a/b"), async {})
            .unwrap_err();
        assert_eq!(err, PoolError::JobExists);
        assert_eq!(pool.len(), 1);

        gate.add_permits(1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_same_source_different_kind_is_distinct() {
        let pool = WorkerPool::new();
        let gate = Arc::new(Semaphore::new(0));

        for kind in [JobKind::SyncLatest, JobKind::SyncRepository] {
            let wait = Arc::clone(&gate);
            pool.add_job(job(kind, "github.com/a/b"), async move {
                let _permit = wait.acquire().await;
            })
            .unwrap();
        }
        assert_eq!(pool.len(), 2);

        gate.add_permits(2);
        pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_add_exactly_one_wins() {
        let pool = WorkerPool::new();
        let gate = Arc::new(Semaphore::new(0));
        let admitted = Arc::new(AtomicUsize::new(0));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let gate = Arc::clone(&gate);
            let admitted = Arc::clone(&admitted);
            tasks.push(tokio::spawn(async move {
                let body_gate = Arc::clone(&gate);
                let result = pool.add_job(job(JobKind::SyncLatest, "github.com/a/b"), async move {
                    let _permit = body_gate.acquire().await;
                });
                match result {
                    Ok(()) => {
                        admitted.fetch_add(1, Ordering::SeqCst);
                    }
                    Err(PoolError::JobExists) => {}
                    Err(other) => panic!("unexpected error: {other}"),
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(admitted.load(Ordering::SeqCst), 1);
        assert_eq!(pool.len(), 1);

        gate.add_permits(1);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_job_deregisters_on_completion() {
        let pool = WorkerPool::new();
        let fingerprint = job(JobKind::SyncRepository, "github.com/a/b@v1").fingerprint();

        pool.add_job(job(JobKind::SyncRepository, "github.com/a/b@v1"), async {})
            .unwrap();
        pool.shutdown().await;

        assert!(!pool.is_running(&fingerprint));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_completion_notifies_enabled_waiter() {
        let pool = WorkerPool::new();

        let notified = pool.completions().notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        pool.add_job(job(JobKind::SyncRepository, "github.com/a/b@v1"), async {})
            .unwrap();
        notified.await;

        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_refuses_new_work() {
        let pool = WorkerPool::new();
        pool.shutdown().await;

        let err = pool
            .add_job(job(JobKind::SyncLatest, "github.com/a/b"), async {})
            .unwrap_err();
        assert_eq!(err, PoolError::PoolStopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_joins_in_flight_jobs() {
        let pool = WorkerPool::new();
        let finished = Arc::new(AtomicUsize::new(0));

        for i in 0..3 {
            let finished = Arc::clone(&finished);
            pool.add_job(
                job(JobKind::SyncRepository, &format!("github.com/a/b@v{i}")),
                async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    finished.fetch_add(1, Ordering::SeqCst);
                },
            )
            .unwrap();
        }

        pool.shutdown().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert!(pool.is_empty());

        // Idempotent.
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_has_repository_sync_matches_any_version() {
        let pool = WorkerPool::new();
        let gate = Arc::new(Semaphore::new(0));

        let wait = Arc::clone(&gate);
        pool.add_job(
            job(JobKind::SyncRepository, "github.com/a/b@v2.1"),
            async move {
                let _permit = wait.acquire().await;
            },
        )
        .unwrap();

        assert!(pool.has_repository_sync("github.com/a/b"));
        assert!(!pool.has_repository_sync("github.com/a/other"));

        gate.add_permits(1);
        pool.shutdown().await;
    }
}
