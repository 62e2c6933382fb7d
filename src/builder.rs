//! Thin capability over the external documentation generator.
//!
//! Given a checked-out working tree, the builder fetches the tree's declared
//! dependencies, drops an embedded build script alongside the project's own,
//! and runs the generator's `zigdocs` step. Each immediate subdirectory of
//! the generator's output becomes one module in the returned manifest.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::manifest::Manifest;

/// Result type alias for documentation builds.
pub type Result<T> = std::result::Result<T, BuildError>;

/// The project's own build script; its presence gates a build attempt.
pub const BUILD_SCRIPT: &str = "build.zig";

/// The project's dependency manifest.
const ZON_MANIFEST: &str = "build.zig.zon";

/// Name the embedded documentation build script is written under.
const DOCS_BUILD_FILE: &str = "zigdocs.build.zig";

/// Where the generator leaves its per-module output trees.
const DOCS_OUTPUT_DIR: &str = "zig-out/zigdocs";

/// The build script handed to the generator. It autodoc-renders every module
/// the working tree's own manifest declares into `zig-out/zigdocs/<module>/`.
const DOCS_BUILD_SCRIPT: &str = r#"const std = @import("std");

pub fn build(b: *std.Build) void {
    const target = b.standardTargetOptions(.{});
    const optimize = b.standardOptimizeOption(.{});

    const docs_step = b.step("zigdocs", "Render module documentation");

    const root = b.addModule("root", .{
        .root_source_file = b.path("src/root.zig"),
    });

    const lib = b.addStaticLibrary(.{
        .name = "root",
        .root_module = root,
        .target = target,
        .optimize = optimize,
    });

    const docs = b.addInstallDirectory(.{
        .source_dir = lib.getEmittedDocs(),
        .install_dir = .prefix,
        .install_subdir = "zigdocs/root",
    });
    docs_step.dependOn(&docs.step);
}
"#;

/// Error type for documentation builds.
#[derive(Error, Debug)]
pub enum BuildError {
    /// The configured generator executable could not be spawned.
    #[error("zig executable not installed or not on PATH")]
    ZigNotInstalled,

    /// The generator exited with a non-zero status.
    #[error("documentation build exited with status {code}: {stderr}")]
    AbnormalExit {
        /// Process exit code, `-1` when terminated by a signal.
        code: i32,
        /// Captured standard error, trimmed.
        stderr: String,
    },

    /// The dependency manifest could not be parsed.
    #[error("invalid dependency manifest: {0}")]
    InvalidZonFile(String),

    /// Filesystem failure while preparing or collecting the build.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

/// Capability interface over the documentation generator.
#[async_trait]
pub trait DocBuilder: Send + Sync {
    /// Whether the working tree carries a build script at its root.
    fn has_build_script(&self, worktree: &Path) -> bool;

    /// Produce documentation for every module of the working tree.
    async fn build(&self, worktree: &Path) -> Result<Manifest>;
}

/// [`DocBuilder`] backed by the external `zig` binary.
pub struct ZigDocBuilder {
    executable: PathBuf,
    cache_dir: Option<PathBuf>,
}

impl ZigDocBuilder {
    /// Create a builder invoking the given executable. When `cache_dir` is
    /// set it populates `ZIG_GLOBAL_CACHE_DIR` and `ZIG_CACHE_DIR` in every
    /// child environment.
    #[must_use]
    pub fn new(executable: impl Into<PathBuf>, cache_dir: Option<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            cache_dir,
        }
    }

    fn command(&self, worktree: &Path) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.current_dir(worktree);
        if let Some(cache) = &self.cache_dir {
            cmd.env("ZIG_GLOBAL_CACHE_DIR", cache);
            cmd.env("ZIG_CACHE_DIR", cache);
        }
        cmd
    }

    /// Run `zig fetch` for every dependency URL the manifest declares.
    ///
    /// Non-fatal: any failure is logged and the build proceeds without the
    /// prefetch.
    async fn fetch_dependencies(&self, worktree: &Path) {
        let manifest = worktree.join(ZON_MANIFEST);
        let content = match tokio::fs::read_to_string(&manifest).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
            Err(e) => {
                warn!(manifest = %manifest.display(), error = %e, "could not read dependency manifest");
                return;
            }
        };

        let urls = match parse_zon_dependency_urls(&content) {
            Ok(urls) => urls,
            Err(e) => {
                warn!(manifest = %manifest.display(), error = %e, "skipping dependency fetch");
                return;
            }
        };

        for url in urls {
            debug!(%url, "fetching dependency");
            let fetched = self
                .command(worktree)
                .args(["fetch", &url])
                .output()
                .await;
            match fetched {
                Ok(output) if output.status.success() => {}
                Ok(output) => warn!(
                    %url,
                    stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                    "dependency fetch failed"
                ),
                Err(e) => warn!(%url, error = %e, "dependency fetch failed"),
            }
        }
    }
}

#[async_trait]
impl DocBuilder for ZigDocBuilder {
    fn has_build_script(&self, worktree: &Path) -> bool {
        worktree.join(BUILD_SCRIPT).is_file()
    }

    async fn build(&self, worktree: &Path) -> Result<Manifest> {
        self.fetch_dependencies(worktree).await;

        tokio::fs::write(worktree.join(DOCS_BUILD_FILE), DOCS_BUILD_SCRIPT).await?;

        info!(worktree = %worktree.display(), "running documentation build");
        let output = self
            .command(worktree)
            .args(["build", "--build-file", DOCS_BUILD_FILE, "zigdocs"])
            .output()
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => BuildError::ZigNotInstalled,
                _ => BuildError::Io(e),
            })?;

        if !output.status.success() {
            return Err(BuildError::AbnormalExit {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        collect_modules(&worktree.join(DOCS_OUTPUT_DIR))
    }
}

/// Assemble a manifest from the generator's output directory: each immediate
/// subdirectory is one module.
fn collect_modules(output_dir: &Path) -> Result<Manifest> {
    let mut manifest = Manifest::new();
    for entry in std::fs::read_dir(output_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        manifest.insert(name, entry.path());
    }
    Ok(manifest)
}

/// Extract dependency URLs from a `.zon` manifest, with any `#fragment`
/// stripped.
fn parse_zon_dependency_urls(content: &str) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    let mut rest = content;
    while let Some(idx) = rest.find(".url") {
        rest = &rest[idx + ".url".len()..];
        let after_eq = match rest.trim_start().strip_prefix('=') {
            Some(after) => after.trim_start(),
            None => {
                return Err(BuildError::InvalidZonFile(
                    "expected `=` after .url".to_string(),
                ))
            }
        };
        let Some(quoted) = after_eq.strip_prefix('"') else {
            return Err(BuildError::InvalidZonFile(
                "expected a quoted url".to_string(),
            ));
        };
        let Some(end) = quoted.find('"') else {
            return Err(BuildError::InvalidZonFile(
                "unterminated url string".to_string(),
            ));
        };
        let url = &quoted[..end];
        let url = url.split('#').next().unwrap_or(url);
        urls.push(url.to_string());
        rest = &quoted[end + 1..];
    }
    Ok(urls)
}
