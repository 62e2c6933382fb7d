//! Remote source identity parsed from a request path.

use thiserror::Error;

/// Result type alias for source parsing.
pub type Result<T> = std::result::Result<T, ParseError>;

/// The sentinel version used when a request names no concrete ref.
pub const LATEST: &str = "latest";

/// The file served when a request names no concrete file.
pub const DEFAULT_FILE: &str = "index.html";

/// Hosts the service is willing to clone from.
pub const SUPPORTED_HOSTS: [&str; 2] = ["github.com", "gitlab.com"];

/// Error type for request-path parsing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The path is malformed, too short, or contains a `..` segment.
    #[error("The repository path provided is invalid")]
    InvalidPath,

    /// The host is not one of the supported forges.
    #[error("The host of the remote repository is not supported")]
    UnsupportedHost(String),
}

/// The addressable identity of one documentation artifact.
///
/// Parsed from a URL path of the form
/// `host/org/repo[@version][/module[/file]]`. All fields are owned; handing
/// a `RemoteSource` to a background job is a plain [`Clone`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSource {
    /// Canonical repository identity, `host/org/name` with no scheme.
    pub repository: String,
    /// Git ref, or [`LATEST`] when the request named none.
    pub version: String,
    /// Module name; empty when the request addresses the repository itself.
    pub module: String,
    /// File within the module tree; never empty, defaults to [`DEFAULT_FILE`].
    pub file: String,
}

impl RemoteSource {
    /// Parse a request path into a source identity.
    ///
    /// Leading and trailing slashes are ignored. Any occurrence of the
    /// substring `..` anywhere in the path is rejected before the path is
    /// ever joined onto the filesystem.
    pub fn parse(path: &str) -> Result<Self> {
        if path.contains("..") {
            return Err(ParseError::InvalidPath);
        }

        let trimmed = path.trim_matches('/');
        let segments: Vec<&str> = trimmed.split('/').filter(|s| !s.is_empty()).collect();
        if segments.len() < 3 {
            return Err(ParseError::InvalidPath);
        }

        let host = segments[0];
        if !SUPPORTED_HOSTS.contains(&host) {
            return Err(ParseError::UnsupportedHost(host.to_string()));
        }

        let (name, version) = match segments[2].split_once('@') {
            Some((_, "")) | Some(("", _)) => return Err(ParseError::InvalidPath),
            Some((name, version)) => (name, version),
            None => (segments[2], LATEST),
        };

        let module = segments.get(3).copied().unwrap_or("");
        let file = if segments.len() > 4 {
            segments[4..].join("/")
        } else {
            DEFAULT_FILE.to_string()
        };

        Ok(Self {
            repository: format!("{host}/{}/{name}", segments[1]),
            version: version.to_string(),
            module: module.to_string(),
            file,
        })
    }

    /// Clone this source with `version` re-bound to a concrete ref.
    #[must_use]
    pub fn with_version(&self, version: &str) -> Self {
        Self {
            version: version.to_string(),
            ..self.clone()
        }
    }

    /// Whether the version is the [`LATEST`] sentinel.
    #[must_use]
    pub fn is_latest(&self) -> bool {
        self.version == LATEST
    }

    /// The HTTPS clone URL for this repository.
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}", self.repository)
    }
}

impl std::fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.repository, self.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_only() {
        let source = RemoteSource::parse("github.com/org/repo").unwrap();
        assert_eq!(source.repository, "github.com/org/repo");
        assert_eq!(source.version, "latest");
        assert_eq!(source.module, "");
        assert_eq!(source.file, "index.html");
    }

    #[test]
    fn test_parse_with_module() {
        let source = RemoteSource::parse("github.com/org/repo/mod").unwrap();
        assert_eq!(source.version, "latest");
        assert_eq!(source.module, "mod");
        assert_eq!(source.file, "index.html");
    }

    #[test]
    fn test_parse_with_file() {
        let source = RemoteSource::parse("github.com/org/repo/mod/main.js").unwrap();
        assert_eq!(source.module, "mod");
        assert_eq!(source.file, "main.js");
    }

    #[test]
    fn test_parse_with_version() {
        let source = RemoteSource::parse("github.com/org/repo@v1.0.0/mod/main.js").unwrap();
        assert_eq!(source.repository, "github.com/org/repo");
        assert_eq!(source.version, "v1.0.0");
        assert_eq!(source.module, "mod");
        assert_eq!(source.file, "main.js");
    }

    #[test]
    fn test_parse_nested_file_path() {
        let source = RemoteSource::parse("gitlab.com/org/repo/mod/assets/app.css").unwrap();
        assert_eq!(source.file, "assets/app.css");
    }

    #[test]
    fn test_parse_unsupported_host() {
        let err = RemoteSource::parse("invalid.com/org/repo").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedHost(_)));
    }

    #[test]
    fn test_parse_too_short() {
        assert_eq!(
            RemoteSource::parse("github.com/org").unwrap_err(),
            ParseError::InvalidPath
        );
    }

    #[test]
    fn test_parse_rejects_dotdot() {
        assert_eq!(
            RemoteSource::parse("github.com/org/repo/../").unwrap_err(),
            ParseError::InvalidPath
        );
        assert_eq!(
            RemoteSource::parse("github.com/org/repo/mod/..%2fescape").unwrap_err(),
            ParseError::InvalidPath
        );
    }

    #[test]
    fn test_parse_rejects_empty_version() {
        assert_eq!(
            RemoteSource::parse("github.com/org/repo@/mod").unwrap_err(),
            ParseError::InvalidPath
        );
    }

    #[test]
    fn test_parse_trailing_slash_defaults_file() {
        let source = RemoteSource::parse("/github.com/org/repo/mod/").unwrap();
        assert_eq!(source.module, "mod");
        assert_eq!(source.file, "index.html");
    }

    #[test]
    fn test_repository_shape_invariant() {
        let source = RemoteSource::parse("github.com/org/repo@v2/mod/a/b.js").unwrap();
        assert_eq!(source.repository.matches('/').count(), 2);
        assert!(!source.repository.contains(".."));
        assert!(!source.file.is_empty());
        assert!(!source.version.is_empty());
    }

    #[test]
    fn test_with_version_rebinds_only_version() {
        let source = RemoteSource::parse("github.com/org/repo/mod/main.js").unwrap();
        let pinned = source.with_version("v2.1");
        assert_eq!(pinned.version, "v2.1");
        assert_eq!(pinned.repository, source.repository);
        assert_eq!(pinned.module, source.module);
        assert_eq!(pinned.file, source.file);
        assert!(source.is_latest());
        assert!(!pinned.is_latest());
    }

    #[test]
    fn test_clone_url() {
        let source = RemoteSource::parse("github.com/org/repo").unwrap();
        assert_eq!(source.url(), "https://github.com/org/repo");
    }

    #[test]
    fn test_display() {
        let source = RemoteSource::parse("github.com/org/repo@v1").unwrap();
        assert_eq!(source.to_string(), "github.com/org/repo@v1");
    }
}
