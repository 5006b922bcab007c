//! Engine configuration.
//!
//! # Responsibility
//! - Hold retention, alerting and scheduling knobs with their defaults.
//! - Load overrides from an optional TOML file.
//!
//! # Invariants
//! - A missing file yields `EngineConfig::default()`.
//! - A loaded config is validated before use.

use crate::clock::DAY_MS;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;

/// Knobs shared by the trash and notification engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Days a trash entry stays restorable.
    pub retention_days: u32,
    /// Trash listings flag entries with this many days or fewer left.
    pub expiring_soon_days: u32,
    /// Contracts ending within this many days raise an alert.
    pub lookahead_days: u32,
    /// Seconds between retention sweeps.
    pub sweep_interval_secs: u64,
    /// Seconds between alert scans.
    pub scan_interval_secs: u64,
    pub contracts_collection: String,
    pub companies_collection: String,
    /// Contract `status` values treated as active (case-insensitive).
    pub active_statuses: Vec<String>,
    /// Drop notifications missing from a scan as part of reconcile.
    pub retire_stale_on_reconcile: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            retention_days: 30,
            expiring_soon_days: 7,
            lookahead_days: 120,
            sweep_interval_secs: 24 * 60 * 60,
            scan_interval_secs: 5 * 60,
            contracts_collection: "contracts".to_string(),
            companies_collection: "companies".to_string(),
            active_statuses: vec!["active".to_string()],
            retire_stale_on_reconcile: false,
        }
    }
}

impl EngineConfig {
    /// Loads config from `path`, or defaults when the file does not exist.
    ///
    /// # Errors
    /// - `ConfigError::Io` when the file exists but cannot be read.
    /// - `ConfigError::Parse` on malformed TOML or wrong value types.
    /// - `ConfigError::Invalid` when a value fails `validate`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "event=config_load module=config status=ok source=defaults path={}",
                path.display()
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(
            "event=config_load module=config status=ok source=file path={}",
            path.display()
        );
        Ok(config)
    }

    /// Parses and validates config from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks value ranges that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retention_days == 0 {
            return Err(ConfigError::Invalid(
                "retention_days must be at least 1".to_string(),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "sweep_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "scan_interval_secs must be at least 1".to_string(),
            ));
        }
        for (key, value) in [
            ("contracts_collection", &self.contracts_collection),
            ("companies_collection", &self.companies_collection),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{key} must not be blank")));
            }
        }
        Ok(())
    }

    /// Retention window in milliseconds.
    pub fn retention_ms(&self) -> i64 {
        i64::from(self.retention_days) * DAY_MS
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    /// Returns whether a contract status counts as active.
    pub fn is_active_status(&self, status: &str) -> bool {
        let status = status.trim();
        self.active_statuses
            .iter()
            .any(|active| active.trim().eq_ignore_ascii_case(status))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}
