//! Artifact store trait and implementations.
//!
//! The store is a filesystem-rooted cache keyed by `(repository, version)`:
//! the directory layout *is* the cache key, and the `latest` pointer is a
//! symlink swap. The trait is the extension point for remote stores; today
//! there is one implementation, [`LocalDirStore`].

mod local;

pub use self::local::LocalDirStore;

use thiserror::Error;

use crate::manifest::Manifest;
use crate::source::RemoteSource;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    /// No artifact exists for the requested `(repository, version)`.
    #[error("no artifact for the requested repository and version")]
    NotFound,

    /// A name would escape the store root or span path segments.
    #[error("invalid store path: {0}")]
    InvalidPath(String),

    /// An artifact exists but could not be enumerated or opened.
    #[error("failed to read artifact: {0}")]
    ReadFailed(std::io::Error),

    /// The artifact could not be staged or published.
    #[error("failed to write artifact: {0}")]
    WriteFailed(std::io::Error),

    /// Other filesystem failure.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability interface over the artifact cache.
///
/// Implementations never touch the network; all operations are plain
/// filesystem work and callers move the bulky ones onto blocking threads.
pub trait ArtifactStore: Send + Sync {
    /// Open the manifest for `(source.repository, source.version)`.
    ///
    /// Returns [`StoreError::NotFound`] when the version directory does not
    /// exist, and also when it exists but holds no modules — an empty
    /// directory reads as a miss so a dangling `latest` target is re-queued
    /// rather than served.
    fn open_manifest(&self, source: &RemoteSource) -> Result<Manifest>;

    /// Publish a built manifest for `(source.repository, source.version)`.
    ///
    /// Every regular file of each module tree is copied to a path of the
    /// same basename under `<module>/`. The artifact is staged in a
    /// temporary sibling directory and renamed into place, replacing any
    /// previous content for the same version.
    fn write_manifest(&self, source: &RemoteSource, manifest: &Manifest) -> Result<()>;

    /// Point `<repository>/latest` at `source.version`.
    ///
    /// Creates the version directory if absent. Concurrent calls for one
    /// repository are serialized by the worker-pool fingerprint.
    fn link_latest(&self, source: &RemoteSource) -> Result<()>;
}
