//! Configuration module for loading and parsing TOML configuration files.

use pylon_client::{ClientConfig, DEFAULT_BASE_URL, LogStreamConfig};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse TOML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    /// Invalid configuration value.
    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Pylon API configuration.
    pub api: ApiConfig,
    /// Workbench log stream configuration.
    pub log_stream: LogStreamSection,
}

/// Pylon API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// API token. Usually supplied through `PYLON_TOKEN` instead.
    pub token: String,
    /// Default deployment ID.
    pub deployment_id: Option<String>,
    /// Base URL of the API.
    pub base_url: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            deployment_id: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

/// Workbench log stream configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogStreamSection {
    /// Delay before reconnecting a dropped socket, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Events buffered per subscriber.
    pub event_capacity: usize,
}

impl Default for LogStreamSection {
    fn default() -> Self {
        let defaults = LogStreamConfig::default();
        Self {
            reconnect_delay_ms: defaults.reconnect_delay.as_millis() as u64,
            event_capacity: defaults.event_capacity,
        }
    }
}

impl Config {
    /// Loads configuration from a TOML file.
    ///
    /// # Arguments
    /// * `path` - Path to the configuration file.
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Arguments
    /// * `content` - TOML content as string.
    ///
    /// # Errors
    /// Returns error if content cannot be parsed.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Replaces the token and default deployment with command-line values.
    ///
    /// Empty overrides are ignored.
    #[must_use]
    pub fn with_overrides(mut self, token: Option<String>, deployment_id: Option<String>) -> Self {
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            self.api.token = token;
        }
        if let Some(id) = deployment_id.filter(|id| !id.is_empty()) {
            self.api.deployment_id = Some(id);
        }
        self
    }

    /// Builds the API client configuration.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            token: self.api.token.clone(),
            deployment_id: self.api.deployment_id.clone(),
            base_url: self.api.base_url.clone(),
            timeout: Duration::from_secs(self.api.timeout_secs),
        }
    }

    /// Builds the log stream configuration.
    #[must_use]
    pub fn log_stream_config(&self) -> LogStreamConfig {
        LogStreamConfig {
            reconnect_delay: Duration::from_millis(self.log_stream.reconnect_delay_ms),
            event_capacity: self.log_stream.event_capacity,
        }
    }

    /// Validates the configuration values.
    ///
    /// The token is not checked here since it may still come from the
    /// environment.
    fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::InvalidValue(format!(
                "api base_url {:?} is not a valid URL",
                self.api.base_url
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "api timeout_secs must be positive".to_string(),
            ));
        }
        if self.log_stream.reconnect_delay_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "log_stream reconnect_delay_ms must be positive".to_string(),
            ));
        }
        if self.log_stream.event_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "log_stream event_capacity must be positive".to_string(),
            ));
        }

        Ok(())
    }
}
