//! Thin capability over the external `git` executable.
//!
//! Nothing here speaks the git protocol in-process: cloning, tag
//! enumeration, and default-branch resolution all shell out to the
//! configured binary and parse its plain-text output.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

/// Result type alias for VCS operations.
pub type Result<T> = std::result::Result<T, GitError>;

/// Exit code git uses for missing remotes and unknown refs.
const GIT_EXIT_NOT_FOUND: i32 = 128;

/// Error type for VCS operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// The configured git executable could not be spawned.
    #[error("git executable not installed or not on PATH")]
    GitNotInstalled,

    /// The remote or the requested ref does not exist (exit code 128).
    #[error("remote repository or ref not found")]
    RefNotFound,

    /// git exited with an unexpected non-zero status.
    #[error("git exited with status {code}: {stderr}")]
    AbnormalExit {
        /// Process exit code, `-1` when terminated by a signal.
        code: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// `ls-remote --symref` produced output of an unexpected shape.
    #[error("unexpected symbolic reference output from remote")]
    AbnormalReference,

    /// Other I/O failure while talking to the child process.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A remote ref paired with the object it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    /// Human ref name: a tag like `v1.2.0`, or a branch name when resolution
    /// fell back to the default branch.
    pub name: String,
    /// Hex object id.
    pub commit: String,
}

/// Capability interface over the version control system.
#[async_trait]
pub trait VcsClient: Send + Sync {
    /// Shallow-clone `url` at `reference` into `dest`.
    async fn clone_repo(&self, url: &str, reference: &str, dest: &Path) -> Result<()>;

    /// Resolve the highest version-sorted tag of `url`, falling back to the
    /// default branch when the remote has no version-shaped tags.
    async fn latest_tag(&self, url: &str) -> Result<Tag>;

    /// Resolve the default branch of `url`.
    async fn default_branch(&self, url: &str) -> Result<Tag>;
}

/// [`VcsClient`] backed by the external `git` binary.
pub struct GitClient {
    executable: PathBuf,
}

impl GitClient {
    /// Create a client invoking the given executable.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output> {
        debug!(git = %self.executable.display(), ?args, "running git");
        let output = Command::new(&self.executable)
            .args(args)
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => GitError::GitNotInstalled,
                _ => GitError::Io(e),
            })?;
        Ok(output)
    }
}

#[async_trait]
impl VcsClient for GitClient {
    async fn clone_repo(&self, url: &str, reference: &str, dest: &Path) -> Result<()> {
        let dest = dest.to_string_lossy();
        let output = self
            .run(&["clone", "--depth=1", "--branch", reference, url, &dest])
            .await?;
        check_status(&output)
    }

    async fn latest_tag(&self, url: &str) -> Result<Tag> {
        let output = self
            .run(&[
                "-c",
                "versionsort.suffix=-",
                "ls-remote",
                "--tags",
                "--sort=-v:refname",
                url,
            ])
            .await?;
        check_status(&output)?;

        match parse_latest_tag(&String::from_utf8_lossy(&output.stdout)) {
            Some(tag) => Ok(tag),
            None => self.default_branch(url).await,
        }
    }

    async fn default_branch(&self, url: &str) -> Result<Tag> {
        let output = self.run(&["ls-remote", "--symref", url, "HEAD"]).await?;
        check_status(&output)?;
        parse_symref(&String::from_utf8_lossy(&output.stdout)).ok_or(GitError::AbnormalReference)
    }
}

fn check_status(output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    match output.status.code() {
        Some(GIT_EXIT_NOT_FOUND) => Err(GitError::RefNotFound),
        code => Err(GitError::AbnormalExit {
            code: code.unwrap_or(-1),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }),
    }
}

/// Pick the first version-shaped tag out of `ls-remote --tags` output.
///
/// Lines are `<commit>\t<ref>`; the `refs/tags/` prefix is stripped as a
/// literal prefix, and a tag qualifies when its first character is `v` or a
/// decimal digit. ls-remote lists peeled tag objects with a `^{}` suffix.
fn parse_latest_tag(output: &str) -> Option<Tag> {
    for line in output.lines() {
        let Some((commit, refname)) = line.split_once('\t') else {
            continue;
        };
        let Some(tag) = refname.strip_prefix("refs/tags/") else {
            continue;
        };
        let tag = tag.strip_suffix("^{}").unwrap_or(tag);
        match tag.chars().next() {
            Some(c) if c == 'v' || c.is_ascii_digit() => {
                return Some(Tag {
                    name: tag.to_string(),
                    commit: commit.to_string(),
                })
            }
            _ => continue,
        }
    }
    None
}

/// Parse `ls-remote --symref <url> HEAD` output into the default branch.
///
/// The first line is `ref: refs/heads/<branch>\tHEAD`; the second carries the
/// commit the branch points at.
fn parse_symref(output: &str) -> Option<Tag> {
    let mut lines = output.lines();
    let branch = lines
        .next()?
        .strip_prefix("ref: refs/heads/")?
        .strip_suffix("\tHEAD")?;
    if branch.is_empty() {
        return None;
    }
    let (commit, _) = lines.next()?.split_once('\t')?;
    Some(Tag {
        name: branch.to_string(),
        commit: commit.to_string(),
    })
}
