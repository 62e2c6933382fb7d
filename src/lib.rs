//! docharbor - on-demand documentation server for remote Zig modules
//!
//! This crate provides:
//! - **source**: request-path parsing into a [`RemoteSource`] identity
//! - **store**: the filesystem artifact cache behind [`ArtifactStore`]
//! - **git** / **builder**: capabilities over the external `git` and `zig`
//!   binaries
//! - **pool**: the fingerprinted [`WorkerPool`] coalescing duplicate builds
//! - **repository** / **service**: the build-and-cache orchestrator and its
//!   read facade
//! - **server**: the axum HTTP surface
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use docharbor::prelude::*;
//!
//! # fn main() -> docharbor::Result<()> {
//! let config = Config::default();
//! let store = Arc::new(LocalDirStore::new(&config.data_dir)?);
//! let vcs = Arc::new(GitClient::new(&config.git_executable));
//! let builder = Arc::new(ZigDocBuilder::new(
//!     &config.zig_executable,
//!     config.zig_cache_dir.clone(),
//! ));
//! let pool = WorkerPool::new();
//! let repository = DocsRepository::new(store, vcs, builder, pool.clone());
//! let service = DocsService::new(repository);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod builder;
pub mod config;
pub mod error;
pub mod git;
pub mod manifest;
pub mod pool;
pub mod repository;
pub mod server;
pub mod service;
pub mod source;
pub mod store;

pub use builder::{DocBuilder, ZigDocBuilder};
pub use config::Config;
pub use error::{Error, Result};
pub use git::{GitClient, Tag, VcsClient};
pub use manifest::{Manifest, ModuleDir};
pub use pool::{Job, JobKind, WorkerPool};
pub use repository::{Cached, DocsRepository};
pub use service::{DocsService, Resource};
pub use source::{ParseError, RemoteSource};
pub use store::{ArtifactStore, LocalDirStore};

/// Prelude for commonly used types.
pub mod prelude {
    pub use crate::builder::{DocBuilder, ZigDocBuilder};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::git::{GitClient, Tag, VcsClient};
    pub use crate::manifest::{Manifest, ModuleDir};
    pub use crate::pool::{Job, JobKind, PoolError, WorkerPool};
    pub use crate::repository::{Cached, DocsRepository};
    pub use crate::service::{DocsService, Resource, ServiceError};
    pub use crate::source::{ParseError, RemoteSource};
    pub use crate::store::{ArtifactStore, LocalDirStore, StoreError};
}
