//! Node Configuration.
//!
//! Configuration for the `ssusd` binary: where the module store lives, which
//! genesis to start from and how verbose logging is. Values come from a JSON
//! file and may be overridden by `SSUSD_*` environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// NODE CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Environment variable overriding the data directory
pub const ENV_DATA_DIR: &str = "SSUSD_DATA_DIR";
/// Environment variable overriding the log filter
pub const ENV_LOG_FILTER: &str = "SSUSD_LOG";
/// Environment variable overriding the genesis file
pub const ENV_GENESIS: &str = "SSUSD_GENESIS";

/// Node configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Directory of the persistent module store; in-memory when absent
    pub data_dir: Option<PathBuf>,
    /// `tracing` filter directive (e.g. `info`, `ssusd=debug`)
    pub log_filter: String,
    /// Genesis file; the default genesis when absent
    pub genesis_path: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            log_filter: "info".into(),
            genesis_path: None,
        }
    }
}

impl NodeConfig {
    /// Load from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Load from `path` when given, otherwise defaults, then apply environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SSUSD_*` environment variables
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            self.data_dir = Some(PathBuf::from(dir));
        }
        if let Ok(filter) = std::env::var(ENV_LOG_FILTER) {
            self.log_filter = filter;
        }
        if let Ok(genesis) = std::env::var(ENV_GENESIS) {
            self.genesis_path = Some(PathBuf::from(genesis));
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::Validation("log filter cannot be empty".into()));
        }
        if let Some(dir) = &self.data_dir {
            if dir.as_os_str().is_empty() {
                return Err(ConfigError::Validation("data dir cannot be empty".into()));
            }
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONFIG ERROR
// ═══════════════════════════════════════════════════════════════════════════════

/// Configuration error
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Parse or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),
}
