//! Configuration management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// HTTP worker thread count; sizes the runtime.
    pub http_workers: usize,
    /// Artifact store root.
    pub data_dir: PathBuf,
    /// Path to the VCS binary.
    pub git_executable: PathBuf,
    /// Path to the documentation-generator binary.
    pub zig_executable: PathBuf,
    /// When set, populates `ZIG_GLOBAL_CACHE_DIR` and `ZIG_CACHE_DIR` in
    /// child environments.
    pub zig_cache_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "::".to_string(),
            port: 8080,
            http_workers: 4,
            data_dir: PathBuf::from("data"),
            git_executable: PathBuf::from("git"),
            zig_executable: PathBuf::from("zig"),
            zig_cache_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("DOCHARBOR_HOST") {
            config.host = val;
        }
        if let Ok(val) = std::env::var("DOCHARBOR_PORT") {
            if let Ok(port) = val.parse() {
                config.port = port;
            }
        }
        if let Ok(val) = std::env::var("DOCHARBOR_HTTP_WORKERS") {
            if let Ok(workers) = val.parse() {
                config.http_workers = workers;
            }
        }
        if let Ok(val) = std::env::var("DOCHARBOR_DATA_DIR") {
            config.data_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DOCHARBOR_GIT_EXECUTABLE") {
            config.git_executable = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DOCHARBOR_ZIG_EXECUTABLE") {
            config.zig_executable = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("DOCHARBOR_ZIG_CACHE_DIR") {
            if !val.is_empty() {
                config.zig_cache_dir = Some(PathBuf::from(val));
            }
        }

        config
    }

    /// Load configuration from a file.
    pub fn from_file(path: &PathBuf) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;

        if path
            .extension()
            .map(|e| e == "yaml" || e == "yml")
            .unwrap_or(false)
        {
            serde_yaml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))
        } else {
            serde_json::from_str(&content).map_err(crate::Error::Json)
        }
    }
}
