//! Watcher configuration with TOML file support.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use tally_types::GovernanceParams;

use crate::logging::LogFormat;
use crate::WatcherError;

/// Configuration for a round watcher.
///
/// Can be loaded from a TOML file via [`WatcherConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// JSON ledger dump to read from.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: PathBuf,

    /// Seconds between proposal-list refreshes.
    #[serde(default = "default_round_poll_secs")]
    pub round_poll_secs: u64,

    /// Seconds between full refreshes (headcounts, votes, holders).
    #[serde(default = "default_headcount_poll_secs")]
    pub headcount_poll_secs: u64,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether to collect Prometheus metrics.
    #[serde(default)]
    pub enable_metrics: bool,

    #[serde(default)]
    pub governance: GovernanceParams,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_snapshot_path() -> PathBuf {
    PathBuf::from("./ledger.json")
}

fn default_round_poll_secs() -> u64 {
    5
}

fn default_headcount_poll_secs() -> u64 {
    20
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WatcherConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, WatcherError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, WatcherError> {
        let config: Self = toml::from_str(s).map_err(|e| WatcherError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, WatcherError> {
        toml::to_string_pretty(self).map_err(|e| WatcherError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), WatcherError> {
        if self.round_poll_secs == 0 || self.headcount_poll_secs == 0 {
            return Err(WatcherError::Config("poll intervals must be positive".into()));
        }
        self.log_format.parse::<LogFormat>()?;
        self.governance
            .validate()
            .map_err(|e| WatcherError::Config(e.to_string()))
    }

    pub fn round_poll_interval(&self) -> Duration {
        Duration::from_secs(self.round_poll_secs)
    }

    pub fn headcount_poll_interval(&self) -> Duration {
        Duration::from_secs(self.headcount_poll_secs)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
            round_poll_secs: default_round_poll_secs(),
            headcount_poll_secs: default_headcount_poll_secs(),
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
            governance: GovernanceParams::default(),
        }
    }
}
