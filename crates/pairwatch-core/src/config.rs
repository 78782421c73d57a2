//! Monitor configuration.
//!
//! Every field has a default, so an empty TOML document (or no file at
//! all) yields a working monitor.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Tunables for sampling, scheduling, and failover timing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Case-insensitive substring that marks a log line as an error.
    pub error_marker: String,
    /// Fail over when more than this many errors are sampled.
    pub error_threshold: u32,
    /// Lines inspected per sampler run.
    pub log_line_limit: u32,
    /// Scheduler period (e.g., "60s").
    pub tick_interval: String,
    /// Upper bound on one sampler run (e.g., "180s").
    pub sample_timeout: String,
    /// Delay between a positive verdict and stopping the active process.
    pub cooldown: String,
    /// Delay between stopping the active and restarting the standby.
    pub settle: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            error_marker: "error".to_string(),
            error_threshold: 5,
            log_line_limit: 50,
            tick_interval: "60s".to_string(),
            sample_timeout: "180s".to_string(),
            cooldown: "10s".to_string(),
            settle: "10s".to_string(),
        }
    }
}

impl MonitorConfig {
    /// Load and validate a TOML config file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: MonitorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the monitor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.error_marker.trim().is_empty() {
            return Err(ConfigError::Invalid("error_marker must not be empty".into()));
        }
        if self.log_line_limit == 0 {
            return Err(ConfigError::Invalid("log_line_limit must be at least 1".into()));
        }
        for (key, value) in [
            ("tick_interval", &self.tick_interval),
            ("sample_timeout", &self.sample_timeout),
            ("cooldown", &self.cooldown),
            ("settle", &self.settle),
        ] {
            if parse_duration(value).is_none() {
                return Err(ConfigError::Invalid(format!("{key}: bad duration {value:?}")));
            }
        }
        if self.tick_interval() == Duration::ZERO {
            return Err(ConfigError::Invalid("tick_interval must be non-zero".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        parse_duration(&self.tick_interval).unwrap_or(Duration::from_secs(60))
    }

    pub fn sample_timeout(&self) -> Duration {
        parse_duration(&self.sample_timeout).unwrap_or(Duration::from_secs(180))
    }

    pub fn cooldown(&self) -> Duration {
        parse_duration(&self.cooldown).unwrap_or(Duration::from_secs(10))
    }

    pub fn settle(&self) -> Duration {
        parse_duration(&self.settle).unwrap_or(Duration::from_secs(10))
    }
}

/// Parse a duration string like "5s", "500ms", "3m", or "10".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(secs) = s.strip_suffix('s') {
        if let Some(ms) = secs.strip_suffix('m') {
            ms.parse::<u64>().ok().map(Duration::from_millis)
        } else {
            secs.parse::<u64>().ok().map(Duration::from_secs)
        }
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}
