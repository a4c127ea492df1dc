//! Client-side channel settings.

use crate::{DEFAULT_RECONNECT_DELAY_SECS, DEFAULT_URL};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("reconnect delay must be a finite, non-negative number of seconds (got {0})")]
    InvalidDelay(f32),
}

/// Settings for the command channel client.
///
/// Every field has a default, so a JSON document only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChannelConfig {
    /// Relay address, e.g. `ws://localhost:8080`
    pub url: String,
    /// Connect as soon as the channel starts, and again on resume
    pub autoconnect: bool,
    /// Fixed delay before each reconnect attempt
    pub reconnect_delay_secs: f32,
    /// Informational channel logging; errors are always logged
    pub enable_logging: bool,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            autoconnect: true,
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            enable_logging: true,
        }
    }
}

impl ChannelConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: ChannelConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Duration::try_from_secs_f32(self.reconnect_delay_secs)
            .map(|_| ())
            .map_err(|_| ConfigError::InvalidDelay(self.reconnect_delay_secs))
    }

    /// Reconnect delay as a [`Duration`]; invalid values fall back to the default.
    pub fn reconnect_delay(&self) -> Duration {
        Duration::try_from_secs_f32(self.reconnect_delay_secs)
            .unwrap_or_else(|_| Duration::from_secs_f32(DEFAULT_RECONNECT_DELAY_SECS))
    }

    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_secs = delay.as_secs_f32();
        self
    }
}
