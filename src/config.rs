//! Pipeline configuration
//!
//! Operational constants the pipeline accepts from its host rather than
//! hard-coding: upload size bounds, session time-to-live, and the cleanup
//! sweep interval. Values come from a TOML file when the host provides one
//! and fall back to defaults otherwise.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Operational settings accepted by the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Smallest accepted upload in bytes (default: 1 KiB)
    pub min_upload_bytes: u64,

    /// Largest accepted upload in bytes (default: 100 MiB)
    pub max_upload_bytes: u64,

    /// Seconds a terminal session is kept before the sweeper expires it
    /// (default: 24 hours)
    pub session_ttl_secs: u64,

    /// Seconds between cleanup sweeps (default: 1 hour)
    pub sweep_interval_secs: u64,

    /// Event bus channel capacity (default: 256)
    pub event_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_upload_bytes: 1024,
            max_upload_bytes: 100 * 1024 * 1024,
            session_ttl_secs: 24 * 60 * 60,
            sweep_interval_secs: 60 * 60,
            event_capacity: 256,
        }
    }
}

impl PipelineConfig {
    /// Parse configuration from a TOML string. Missing keys take defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Validate settings. Called by the session manager at construction so
    /// a bad value fails fast instead of surfacing mid-pipeline.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_upload_bytes == 0 {
            return Err(ConfigError::invalid(
                "pipeline config",
                "max_upload_bytes must be greater than zero",
            ));
        }
        if self.min_upload_bytes > self.max_upload_bytes {
            return Err(ConfigError::invalid(
                "pipeline config",
                format!(
                    "min_upload_bytes ({}) exceeds max_upload_bytes ({})",
                    self.min_upload_bytes, self.max_upload_bytes
                ),
            ));
        }
        if self.sweep_interval_secs == 0 {
            return Err(ConfigError::invalid(
                "pipeline config",
                "sweep_interval_secs must be greater than zero",
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::invalid(
                "pipeline config",
                "event_capacity must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Session time-to-live as a chrono duration
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl_secs as i64)
    }
}
