//! Configuration loading and management
//!
//! Handles parsing of the optional `.tlog/config.toml` file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lock::DEFAULT_LOCK_TIMEOUT_MS;

/// Config file name inside the `.tlog/` directory
pub const CONFIG_FILE: &str = "config.toml";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Event log storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Task identifier configuration
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Defaults for `tlog prune`
    #[serde(default)]
    pub prune: PruneConfig,
}

/// Event log storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// How long an append waits for the directory lock
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_lock_timeout_ms() -> u64 {
    DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

/// Task identifier configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Prefix for generated task ids (`<prefix>-<hex>`)
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    /// Number of hex characters after the prefix
    #[serde(default = "default_id_len")]
    pub id_len: usize,
}

fn default_id_prefix() -> String {
    "tl".to_string()
}

fn default_id_len() -> usize {
    8
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            id_prefix: default_id_prefix(),
            id_len: default_id_len(),
        }
    }
}

/// Defaults applied when `tlog prune` flags are omitted
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PruneConfig {
    /// Keep done tasks updated within the last N days (0 = prune every done task)
    #[serde(default)]
    pub save_days: u32,

    /// Only compact; never drop done tasks
    #[serde(default)]
    pub keep_all: bool,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `config.toml` from a `.tlog` root, or return defaults when absent.
    ///
    /// A present but invalid file is an error rather than a silent fallback.
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.storage.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "storage.lock_timeout_ms must be > 0".to_string(),
            ));
        }

        let prefix = self.tasks.id_prefix.trim();
        if prefix.is_empty() {
            return Err(Error::InvalidConfig(
                "tasks.id_prefix cannot be empty".to_string(),
            ));
        }
        if !prefix.chars().all(|ch| ch.is_ascii_alphanumeric()) {
            return Err(Error::InvalidConfig(
                "tasks.id_prefix must be alphanumeric".to_string(),
            ));
        }
        if !(4..=64).contains(&self.tasks.id_len) {
            return Err(Error::InvalidConfig(
                "tasks.id_len must be between 4 and 64".to_string(),
            ));
        }

        Ok(())
    }
}
