//! Bridge configuration
//!
//! Loaded from a RON file; every field is optional and falls back to its
//! default.
//!
//! ```ron
//! (
//!     log_level: "debug",
//!     log_host_errors: false,
//!     computer_id: 3,
//!     max_pending_tasks: 100,
//! )
//! ```
//!
//! # Usage
//!
//! ```rust
//! use periphery::util::config::BridgeConfig;
//!
//! let config = BridgeConfig::from_ron_str("(computer_id: 7)").unwrap();
//! assert_eq!(config.computer_id, 7);
//! assert!(config.log_host_errors);
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::logger::LogLevel;

/// Runtime configuration for the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Minimum level printed by the logger
    #[serde(default = "default_log_level")]
    pub log_level: LogLevel,
    /// Log host faults caught while running host methods
    #[serde(default = "default_log_host_errors")]
    pub log_host_errors: bool,
    /// Identifier reported to peripherals
    #[serde(default)]
    pub computer_id: u32,
    /// Bound on queued main thread tasks
    #[serde(default = "default_max_pending_tasks")]
    pub max_pending_tasks: usize,
    /// Main thread tasks run per tick
    #[serde(default = "default_max_tasks_per_tick")]
    pub max_tasks_per_tick: usize,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_host_errors() -> bool {
    true
}

fn default_max_pending_tasks() -> usize {
    5000
}

fn default_max_tasks_per_tick() -> usize {
    256
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_host_errors: default_log_host_errors(),
            computer_id: 0,
            max_pending_tasks: default_max_pending_tasks(),
            max_tasks_per_tick: default_max_tasks_per_tick(),
        }
    }
}

impl BridgeConfig {
    /// Parse a RON document
    pub fn from_ron_str(content: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(content)?)
    }

    /// Load from a file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_ron_str(&content)
    }

    /// Load from a file, or the defaults if it does not exist
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(path)
    }

    /// Write as pretty RON
    pub fn save(
        &self,
        path: impl AsRef<Path>,
    ) -> Result<(), ConfigError> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?;
        fs::write(path, content)?;
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("Config serialize error: {0}")]
    Serialize(#[from] ron::Error),
}
