//! Local filesystem store.

use std::fs;
use std::os::unix::fs::symlink;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::manifest::Manifest;
use crate::source::{RemoteSource, LATEST};

use super::{ArtifactStore, Result, StoreError};

/// Filesystem-backed artifact store.
///
/// Artifacts live under `<root>/<repository>/<version>/<module>/…` with a
/// relative symlink `<root>/<repository>/latest` naming a sibling version
/// directory. The process is assumed to be the sole owner of `root`; no
/// file locking is performed.
pub struct LocalDirStore {
    root: PathBuf,
}

impl LocalDirStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// The store root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn repository_dir(&self, source: &RemoteSource) -> PathBuf {
        self.root.join(&source.repository)
    }

    fn version_dir(&self, source: &RemoteSource) -> Result<PathBuf> {
        check_segment(&source.version)?;
        Ok(self.repository_dir(source).join(&source.version))
    }

    fn stage_modules(&self, staging: &Path, manifest: &Manifest) -> Result<()> {
        for module in manifest.iter() {
            check_segment(&module.name)?;
            let dest = staging.join(&module.name);
            fs::create_dir_all(&dest).map_err(StoreError::WriteFailed)?;
            copy_tree(&module.path, &dest)?;
        }
        Ok(())
    }
}

impl ArtifactStore for LocalDirStore {
    fn open_manifest(&self, source: &RemoteSource) -> Result<Manifest> {
        let dir = self.version_dir(source)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound)
            }
            Err(e) => return Err(StoreError::ReadFailed(e)),
        };

        let mut manifest = Manifest::new();
        for entry in entries {
            let entry = entry.map_err(StoreError::ReadFailed)?;
            let file_type = entry.file_type().map_err(StoreError::ReadFailed)?;
            if !file_type.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            manifest.insert(name, entry.path());
        }

        // An empty version directory reads as a miss so a dangling or
        // half-populated `latest` target is re-queued rather than served.
        if manifest.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(manifest)
    }

    fn write_manifest(&self, source: &RemoteSource, manifest: &Manifest) -> Result<()> {
        let repo_dir = self.repository_dir(source);
        fs::create_dir_all(&repo_dir).map_err(StoreError::WriteFailed)?;

        check_segment(&source.version)?;
        let staging = repo_dir.join(format!(".tmp-{}", source.version));
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(StoreError::WriteFailed)?;
        }
        fs::create_dir_all(&staging).map_err(StoreError::WriteFailed)?;

        if let Err(e) = self.stage_modules(&staging, manifest) {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        // Publish with a single rename so readers never observe a partial
        // artifact.
        let target = repo_dir.join(&source.version);
        if target.exists() {
            fs::remove_dir_all(&target).map_err(StoreError::WriteFailed)?;
        }
        fs::rename(&staging, &target).map_err(StoreError::WriteFailed)?;

        debug!(source = %source, modules = manifest.len(), "published artifact");
        Ok(())
    }

    fn link_latest(&self, source: &RemoteSource) -> Result<()> {
        if source.version == LATEST {
            return Err(StoreError::InvalidPath(
                "cannot link latest to itself".to_string(),
            ));
        }

        let dir = self.version_dir(source)?;
        fs::create_dir_all(&dir).map_err(StoreError::WriteFailed)?;

        let link = self.repository_dir(source).join(LATEST);
        if fs::symlink_metadata(&link).is_ok() {
            fs::remove_file(&link).map_err(StoreError::WriteFailed)?;
        }
        symlink(&source.version, &link).map_err(StoreError::WriteFailed)?;

        debug!(repository = %source.repository, version = %source.version, "linked latest");
        Ok(())
    }
}

/// Reject names that would escape the store or span path segments.
fn check_segment(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(StoreError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// Copy every regular file under `src` into `dest` by its basename,
/// flattening whatever nesting the generator produced.
fn copy_tree(src: &Path, dest: &Path) -> Result<()> {
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            StoreError::WriteFailed(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk failed")
            }))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let target = dest.join(entry.file_name());
        fs::copy(entry.path(), &target).map_err(StoreError::WriteFailed)?;
    }
    Ok(())
}
