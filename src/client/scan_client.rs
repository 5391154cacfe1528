//! The fail-closed scan client.

use crate::core::{ArcScanner, FileInput, ScanError, ScanVerdict, Scanner};

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Settings injected into a [`ScanClient`] at construction.
#[derive(Debug, Clone)]
pub struct ScanClientConfig {
    /// Whether scanning is performed at all.
    ///
    /// Disabling it is a security-relevant override: every scan is then
    /// reported clean with the `skipped` marker.
    pub enabled: bool,

    /// Scan daemon host.
    pub host: String,

    /// Scan daemon port.
    pub port: u16,

    /// Connection timeout for the daemon.
    pub connection_timeout: Duration,

    /// Timeout for a single scan.
    pub scan_timeout: Duration,
}

impl Default for ScanClientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "localhost".to_string(),
            port: 3310,
            connection_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(300),
        }
    }
}

impl ScanClientConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables scanning.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the daemon address.
    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Sets the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets the scan timeout.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }
}

/// Single-attempt adapter between the orchestrator and a scanning engine.
///
/// The client never returns an error: anything that prevents a definitive
/// verdict (unreachable daemon, failed health check, I/O error, unparseable reply)
/// becomes a `scan_error` verdict. A scan that could not be completed is
/// never reported as clean.
#[derive(Debug, Clone)]
pub struct ScanClient {
    config: ScanClientConfig,
    scanner: ArcScanner,
}

impl ScanClient {
    /// Creates a client over an arbitrary scanner.
    pub fn new<S: Scanner + 'static>(config: ScanClientConfig, scanner: S) -> Self {
        Self::from_arc(config, Arc::new(scanner))
    }

    /// Creates a client over a shared scanner.
    pub fn from_arc(config: ScanClientConfig, scanner: ArcScanner) -> Self {
        Self { config, scanner }
    }

    /// Creates a client talking to clamd at the configured host and port.
    #[cfg(feature = "clamav")]
    pub fn clamav(config: ScanClientConfig) -> Result<Self, crate::core::ScanError> {
        use crate::backends::clamav::{ClamAvConfig, ClamAvScanner};

        let scanner = ClamAvScanner::new(
            ClamAvConfig::new()
                .with_tcp(config.host.clone(), config.port)
                .with_connection_timeout(config.connection_timeout)
                .with_scan_timeout(config.scan_timeout),
        )?;
        Ok(Self::new(config, scanner))
    }

    /// Returns the client configuration.
    pub fn config(&self) -> &ScanClientConfig {
        &self.config
    }

    /// Returns `true` if scanning is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Returns the underlying engine name.
    pub fn engine(&self) -> &str {
        self.scanner.name()
    }

    /// Scans a file by path.
    pub async fn scan_path(&self, path: impl Into<std::path::PathBuf>) -> ScanVerdict {
        self.scan(&FileInput::from_path(path)).await
    }

    /// Scans content pushed from an async reader.
    pub async fn scan_stream(
        &self,
        reader: impl futures::io::AsyncRead + Send + Unpin + 'static,
    ) -> ScanVerdict {
        self.scan(&FileInput::from_stream(reader)).await
    }

    /// Probes the engine, then scans `input`.
    pub async fn scan(&self, input: &FileInput) -> ScanVerdict {
        if !self.config.enabled {
            tracing::warn!(
                input = %input.describe(),
                "Scanning disabled, reporting skipped"
            );
            return ScanVerdict::skipped();
        }

        let engine = self.scanner.name();
        let start = Instant::now();

        if let Err(e) = self.scanner.health_check().await {
            tracing::error!(
                engine = %engine,
                input = %input.describe(),
                error = %e,
                "Scan engine failed health check"
            );
            return ScanVerdict::scan_error(engine, format!("engine unreachable: {e}"))
                .with_duration(start.elapsed());
        }

        match self.scanner.scan(input).await {
            Ok(verdict) => {
                if verdict.is_infected() {
                    tracing::warn!(
                        engine = %engine,
                        input = %input.describe(),
                        signature = ?verdict.signature,
                        "Threat found"
                    );
                } else {
                    tracing::info!(engine = %engine, input = %input.describe(), "File is clean");
                }
                verdict
            }
            Err(e) => {
                tracing::error!(
                    engine = %engine,
                    input = %input.describe(),
                    error = %e,
                    recoverable = e.is_recoverable(),
                    "Scan failed"
                );
                ScanVerdict::scan_error(engine, error_detail(&e)).with_duration(start.elapsed())
            }
        }
    }
}

/// Classifies a scan failure for the recorded `last_result` detail.
fn error_detail(error: &ScanError) -> String {
    if error.indicates_unhealthy_engine() {
        format!("engine unreachable: {error}")
    } else if !error.is_recoverable() {
        format!("engine misconfigured: {error}")
    } else {
        error.to_string()
    }
}
