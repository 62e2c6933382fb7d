//! Thin read-side facade used by the HTTP layer.

use std::fs::File;

use thiserror::Error;

use crate::repository::{Cached, DocsRepository};
use crate::source::RemoteSource;
use crate::store::StoreError;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error type for read-side operations.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// The manifest has no module under the requested name.
    #[error("module not found: {0}")]
    ModuleNotFound(String),

    /// The requested file has no extension, or one with no known content
    /// type.
    #[error("unrecognized file extension: {0}")]
    UnrecognizedFileExtension(String),

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The artifact file could not be opened.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// An artifact file ready to serve.
#[derive(Debug)]
pub struct Resource {
    /// The opened artifact file.
    pub file: File,
    /// Content type derived from the file extension.
    pub content_type: &'static str,
}

/// Read facade over the docs repository.
#[derive(Clone)]
pub struct DocsService {
    repository: DocsRepository,
}

impl DocsService {
    /// Create a service over `repository`.
    #[must_use]
    pub fn new(repository: DocsRepository) -> Self {
        Self { repository }
    }

    /// The orchestrator behind this facade.
    #[must_use]
    pub fn repository(&self) -> &DocsRepository {
        &self.repository
    }

    /// Module names for `(repository, version)`, or the queued sentinel.
    pub fn modules(&self, source: &RemoteSource) -> Result<Cached<Vec<String>>> {
        Ok(self
            .repository
            .get_docs_manifest(source)?
            .map(|manifest| manifest.names()))
    }

    /// Open one artifact file, or the queued sentinel.
    pub fn resource(&self, source: &RemoteSource) -> Result<Cached<Resource>> {
        let manifest = match self.repository.get_docs_manifest(source)? {
            Cached::Ready(manifest) => manifest,
            Cached::Queued => return Ok(Cached::Queued),
        };

        let module_dir = manifest
            .get(&source.module)
            .ok_or_else(|| ServiceError::ModuleNotFound(source.module.clone()))?;

        let content_type = content_type_for(&source.file)
            .ok_or_else(|| ServiceError::UnrecognizedFileExtension(source.file.clone()))?;

        let file = File::open(module_dir.join(&source.file))?;
        Ok(Cached::Ready(Resource { file, content_type }))
    }
}

/// Content type for an artifact file, by extension.
#[must_use]
pub fn content_type_for(file: &str) -> Option<&'static str> {
    let extension = std::path::Path::new(file).extension()?.to_str()?;
    match extension {
        "html" => Some("text/html"),
        "md" => Some("text/markdown"),
        "wasm" => Some("application/wasm"),
        "js" => Some("application/javascript"),
        "css" => Some("text/css"),
        "tar" => Some("application/x-tar"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::Path;
    use std::sync::Arc;
    use tempfile::tempdir;

    use crate::builder::DocBuilder;
    use crate::git::{GitError, Tag, VcsClient};
    use crate::manifest::Manifest;
    use crate::pool::WorkerPool;
    use crate::store::{ArtifactStore, LocalDirStore};

    /// Capabilities that must not be reached by warm-cache reads.
    struct UnreachableVcs;

    #[async_trait::async_trait]
    impl VcsClient for UnreachableVcs {
        async fn clone_repo(
            &self,
            _url: &str,
            _reference: &str,
            _dest: &Path,
        ) -> crate::git::Result<()> {
            Err(GitError::RefNotFound)
        }

        async fn latest_tag(&self, _url: &str) -> crate::git::Result<Tag> {
            Err(GitError::RefNotFound)
        }

        async fn default_branch(&self, _url: &str) -> crate::git::Result<Tag> {
            Err(GitError::RefNotFound)
        }
    }

    struct UnreachableBuilder;

    #[async_trait::async_trait]
    impl DocBuilder for UnreachableBuilder {
        fn has_build_script(&self, _worktree: &Path) -> bool {
            false
        }

        async fn build(&self, _worktree: &Path) -> crate::builder::Result<Manifest> {
            Err(crate::builder::BuildError::ZigNotInstalled)
        }
    }

    /// A service over a store pre-populated with one built artifact.
    fn warm_service(root: &Path) -> DocsService {
        let store = LocalDirStore::new(root).unwrap();

        let build = tempdir().unwrap();
        let module_dir = build.path().join("core");
        std::fs::create_dir_all(&module_dir).unwrap();
        std::fs::write(module_dir.join("index.html"), "<html>docs</html>").unwrap();
        std::fs::write(module_dir.join("main.js"), "console.log(1)").unwrap();
        std::fs::write(module_dir.join("notes.zzz"), "???").unwrap();
        let mut manifest = Manifest::new();
        manifest.insert("core", module_dir);

        let source = RemoteSource::parse("github.com/a/b@v1.0.0").unwrap();
        store.write_manifest(&source, &manifest).unwrap();

        let repository = DocsRepository::new(
            Arc::new(store),
            Arc::new(UnreachableVcs),
            Arc::new(UnreachableBuilder),
            WorkerPool::new(),
        );
        DocsService::new(repository)
    }

    #[test]
    fn test_content_type_mapping() {
        assert_eq!(content_type_for("index.html"), Some("text/html"));
        assert_eq!(content_type_for("README.md"), Some("text/markdown"));
        assert_eq!(content_type_for("main.wasm"), Some("application/wasm"));
        assert_eq!(content_type_for("main.js"), Some("application/javascript"));
        assert_eq!(content_type_for("style.css"), Some("text/css"));
        assert_eq!(content_type_for("sources.tar"), Some("application/x-tar"));
        assert_eq!(content_type_for("file.zzz"), None);
        assert_eq!(content_type_for("no_extension"), None);
    }

    #[tokio::test]
    async fn test_modules_warm_hit() {
        let dir = tempdir().unwrap();
        let service = warm_service(dir.path());

        let source = RemoteSource::parse("github.com/a/b@v1.0.0").unwrap();
        match service.modules(&source).unwrap() {
            Cached::Ready(names) => assert_eq!(names, vec!["core".to_string()]),
            Cached::Queued => panic!("expected a warm hit"),
        }
    }

    #[tokio::test]
    async fn test_resource_warm_hit_with_content_type() {
        let dir = tempdir().unwrap();
        let service = warm_service(dir.path());

        let source = RemoteSource::parse("github.com/a/b@v1.0.0/core/index.html").unwrap();
        match service.resource(&source).unwrap() {
            Cached::Ready(mut resource) => {
                assert_eq!(resource.content_type, "text/html");
                let mut bytes = String::new();
                resource.file.read_to_string(&mut bytes).unwrap();
                assert_eq!(bytes, "<html>docs</html>");
            }
            Cached::Queued => panic!("expected a warm hit"),
        }
    }

    #[tokio::test]
    async fn test_resource_unknown_extension() {
        let dir = tempdir().unwrap();
        let service = warm_service(dir.path());

        let source = RemoteSource::parse("github.com/a/b@v1.0.0/core/notes.zzz").unwrap();
        let err = service.resource(&source).unwrap_err();
        assert!(matches!(err, ServiceError::UnrecognizedFileExtension(_)));
    }

    #[tokio::test]
    async fn test_resource_module_not_found() {
        let dir = tempdir().unwrap();
        let service = warm_service(dir.path());

        let source = RemoteSource::parse("github.com/a/b@v1.0.0/missing/index.html").unwrap();
        let err = service.resource(&source).unwrap_err();
        assert!(matches!(err, ServiceError::ModuleNotFound(_)));
    }

    #[tokio::test]
    async fn test_resource_missing_file_is_io_error() {
        let dir = tempdir().unwrap();
        let service = warm_service(dir.path());

        let source = RemoteSource::parse("github.com/a/b@v1.0.0/core/other.html").unwrap();
        let err = service.resource(&source).unwrap_err();
        assert!(matches!(err, ServiceError::Io(_)));
    }

    #[tokio::test]
    async fn test_cold_miss_returns_queued() {
        let dir = tempdir().unwrap();
        let service = warm_service(dir.path());

        let source = RemoteSource::parse("github.com/a/b@v9.9.9/core/index.html").unwrap();
        assert!(matches!(service.modules(&source).unwrap(), Cached::Queued));
        assert!(matches!(service.resource(&source).unwrap(), Cached::Queued));
    }
}
