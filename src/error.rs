//! Crate-level error type.

use thiserror::Error;

/// Result type alias for crate-level operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Aggregate error wrapping each subsystem's failures.
#[derive(Error, Debug)]
pub enum Error {
    /// Request-path parsing failed.
    #[error(transparent)]
    Parse(#[from] crate::source::ParseError),

    /// Artifact store failure.
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),

    /// VCS failure.
    #[error(transparent)]
    Git(#[from] crate::git::GitError),

    /// Documentation build failure.
    #[error(transparent)]
    Build(#[from] crate::builder::BuildError),

    /// Job admission failure.
    #[error(transparent)]
    Pool(#[from] crate::pool::PoolError),

    /// Read-side failure.
    #[error(transparent)]
    Service(#[from] crate::service::ServiceError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wraps_parse_error() {
        let err: Error = crate::source::ParseError::InvalidPath.into();
        assert_eq!(err.to_string(), "The repository path provided is invalid");
    }

    #[test]
    fn test_wraps_pool_error() {
        let err: Error = crate::pool::PoolError::JobExists.into();
        assert!(matches!(err, Error::Pool(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("missing data_dir".to_string());
        assert_eq!(err.to_string(), "configuration error: missing data_dir");
    }
}
