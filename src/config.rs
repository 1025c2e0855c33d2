//! Log configuration
//!
//! Loaded from a JSON file:
//!
//! ```json
//! { "data_dir": "/var/lib/aerolog", "wal_size": 67108864 }
//! ```
//!
//! Segments live in `<data_dir>/wals/<id>`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Static log configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalConfig {
    /// Data directory (required)
    pub data_dir: PathBuf,

    /// Rotation threshold in bytes: once the current segment reaches this
    /// size the next write starts a new segment (default 64MB)
    #[serde(default = "default_wal_size")]
    pub wal_size: u64,

    /// Whether a superseded segment is fsynced when rotation closes it
    #[serde(default = "default_sync_on_rotate")]
    pub wal_sync_on_rotate: bool,
}

fn default_wal_size() -> u64 {
    67108864
} // 64MB
fn default_sync_on_rotate() -> bool {
    true
}

impl WalConfig {
    /// Configuration with defaults for the given data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            wal_size: default_wal_size(),
            wal_sync_on_rotate: default_sync_on_rotate(),
        }
    }

    /// Sets the rotation threshold
    pub fn with_wal_size(mut self, wal_size: u64) -> Self {
        self.wal_size = wal_size;
        self
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: WalConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.wal_size == 0 {
            return Err(ConfigError::Invalid("wal_size must be > 0".into()));
        }
        Ok(())
    }

    pub fn directory(&self) -> &Path {
        &self.data_dir
    }

    /// `<data_dir>/wals`
    pub fn wal_dir(&self) -> PathBuf {
        self.data_dir.join("wals")
    }

    pub fn rotation_size_threshold(&self) -> u64 {
        self.wal_size
    }
}
