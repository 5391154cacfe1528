//! Environment-driven configuration for a scan worker.

use crate::client::ScanClientConfig;
use crate::job::DEFAULT_MAX_RETRIES;
use crate::orchestrator::{BackoffPolicy, OrchestratorConfig};
use crate::queue::QueueConfig;

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable was missing or could not be parsed.
    #[error("failed to read configuration from environment: {0}")]
    Env(#[from] envy::Error),

    /// The values parsed but are not usable together.
    #[error("invalid configuration: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

/// Pipeline settings read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PipelineConfig {
    /// `CLAMAV_ENABLED`
    #[serde(default = "default_enabled")]
    pub clamav_enabled: bool,

    /// `CLAMAV_HOST`
    #[serde(default = "default_host")]
    pub clamav_host: String,

    /// `CLAMAV_PORT`
    #[serde(default = "default_port")]
    pub clamav_port: u16,

    /// `CLAMAV_CONNECTION_TIMEOUT_SECS`
    #[serde(default = "default_connection_timeout_secs")]
    pub clamav_connection_timeout_secs: u64,

    /// `CLAMAV_SCAN_TIMEOUT_SECS`
    #[serde(default = "default_scan_timeout_secs")]
    pub clamav_scan_timeout_secs: u64,

    /// `SCAN_MAX_RETRIES`
    #[serde(default = "default_max_retries")]
    pub scan_max_retries: u32,

    /// `SCAN_BACKOFF_BASE_SECS`
    #[serde(default = "default_backoff_base_secs")]
    pub scan_backoff_base_secs: u64,

    /// `SCAN_BACKOFF_MAX_SECS`
    #[serde(default = "default_backoff_max_secs")]
    pub scan_backoff_max_secs: u64,

    /// `QUEUE_MAX_WORKERS`
    #[serde(default = "default_max_workers")]
    pub queue_max_workers: usize,

    /// `QUEUE_MAX_ATTEMPTS`, derived from `SCAN_MAX_RETRIES` when unset
    #[serde(default)]
    pub queue_max_attempts: Option<u32>,
}

fn default_enabled() -> bool {
    true
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    3310
}

fn default_connection_timeout_secs() -> u64 {
    10
}

fn default_scan_timeout_secs() -> u64 {
    300
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

fn default_backoff_base_secs() -> u64 {
    60
}

fn default_backoff_max_secs() -> u64 {
    900
}

fn default_max_workers() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            clamav_enabled: default_enabled(),
            clamav_host: default_host(),
            clamav_port: default_port(),
            clamav_connection_timeout_secs: default_connection_timeout_secs(),
            clamav_scan_timeout_secs: default_scan_timeout_secs(),
            scan_max_retries: default_max_retries(),
            scan_backoff_base_secs: default_backoff_base_secs(),
            scan_backoff_max_secs: default_backoff_max_secs(),
            queue_max_workers: default_max_workers(),
            queue_max_attempts: None,
        }
    }
}

impl PipelineConfig {
    /// Loads `.env` if present, then reads the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads configuration from explicit key/value pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(vars)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks values that parse but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.clamav_enabled && self.clamav_host.trim().is_empty() {
            return Err(invalid("CLAMAV_HOST must not be empty"));
        }
        if self.clamav_enabled && self.clamav_port == 0 {
            return Err(invalid("CLAMAV_PORT must not be 0"));
        }
        if self.queue_max_workers == 0 {
            return Err(invalid("QUEUE_MAX_WORKERS must be at least 1"));
        }
        if matches!(self.queue_max_attempts, Some(attempts) if attempts <= self.scan_max_retries) {
            return Err(invalid("QUEUE_MAX_ATTEMPTS must exceed SCAN_MAX_RETRIES"));
        }
        if self.scan_backoff_base_secs > self.scan_backoff_max_secs {
            return Err(invalid(
                "SCAN_BACKOFF_BASE_SECS must not exceed SCAN_BACKOFF_MAX_SECS",
            ));
        }
        Ok(())
    }

    /// Scan client settings.
    pub fn scan_client(&self) -> ScanClientConfig {
        ScanClientConfig::new()
            .with_enabled(self.clamav_enabled)
            .with_address(self.clamav_host.clone(), self.clamav_port)
            .with_connection_timeout(Duration::from_secs(self.clamav_connection_timeout_secs))
            .with_scan_timeout(Duration::from_secs(self.clamav_scan_timeout_secs))
    }

    /// Backoff between retries.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy::new()
            .with_base_delay(Duration::from_secs(self.scan_backoff_base_secs))
            .with_max_delay(Duration::from_secs(self.scan_backoff_max_secs))
    }

    /// Orchestrator settings.
    pub fn orchestrator(&self) -> OrchestratorConfig {
        OrchestratorConfig::new().with_backoff(self.backoff())
    }

    /// Queue settings.
    pub fn queue(&self) -> QueueConfig {
        let max_attempts = self
            .queue_max_attempts
            .unwrap_or_else(|| QueueConfig::attempts_for(self.scan_max_retries));
        QueueConfig::new()
            .with_max_workers(self.queue_max_workers)
            .with_max_attempts(max_attempts)
    }

    /// Retry ceiling for new jobs.
    pub fn max_retries(&self) -> u32 {
        self.scan_max_retries
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Invalid {
        message: message.to_string(),
    }
}
