//! Configuration types for the engine.
//!
//! [`EngineConfig`] stores the tuning knobs for the snapshot lifecycle and the
//! location of durable state. Configuration is persisted as TOML (typically at
//! `~/.config/coauthor/engine.toml` on Unix systems).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Default minimum age of the newest snapshot before a store event creates
/// another one, in seconds.
pub const DEFAULT_SNAPSHOT_INTERVAL_SECS: u64 = 300;

/// Default number of snapshots retained per document.
pub const DEFAULT_MAX_SNAPSHOTS: usize = 50;

/// Engine configuration the host can override.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Minimum age (seconds) of the newest snapshot before a store event
    /// creates a new one. Forced snapshots (overwrite, restore) ignore this.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_secs: u64,

    /// Per-document snapshot retention bound. Oldest snapshots are pruned
    /// first when the bound is exceeded.
    #[serde(default = "default_max_snapshots")]
    pub max_snapshots: usize,

    /// Directory for durable state (SQLite database). Not used by the
    /// in-memory store.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

fn default_snapshot_interval() -> u64 {
    DEFAULT_SNAPSHOT_INTERVAL_SECS
}

fn default_max_snapshots() -> usize {
    DEFAULT_MAX_SNAPSHOTS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_interval_secs: DEFAULT_SNAPSHOT_INTERVAL_SECS,
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            data_dir: None,
        }
    }
}

impl EngineConfig {
    /// Parse a config from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Serialize the config to TOML text.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load a config from the default location, falling back to defaults if
    /// the file does not exist.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn load() -> Result<Self> {
        let path = Self::default_path()?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Self::from_toml(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write the config to the default location.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, self.to_toml()?)?;
        Ok(())
    }

    /// Default config file path: `<config_dir>/coauthor/engine.toml`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or(crate::error::EngineError::NoConfigDir)?;
        Ok(dir.join("coauthor").join("engine.toml"))
    }

    /// Snapshot interval in milliseconds.
    pub fn snapshot_interval_ms(&self) -> i64 {
        self.snapshot_interval_secs as i64 * 1000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.snapshot_interval_secs, 300);
        assert_eq!(config.max_snapshots, 50);
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml("max_snapshots = 10").unwrap();
        assert_eq!(config.max_snapshots, 10);
        assert_eq!(config.snapshot_interval_secs, 300);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = EngineConfig::default();
        config.snapshot_interval_secs = 60;
        config.data_dir = Some(PathBuf::from("/tmp/coauthor"));

        let text = config.to_toml().unwrap();
        let parsed = EngineConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.snapshot_interval_secs, 60);
        assert_eq!(parsed.data_dir, Some(PathBuf::from("/tmp/coauthor")));
    }
}
