//! ClamAV scanning backend.
//!
//! Talks to the ClamAV daemon (clamd) over TCP using its null-terminated
//! `z`-prefixed command protocol.
//!
//! # Protocol
//!
//! - `zPING\0` answers `PONG`; used as the liveness check.
//! - `zSCAN <path>\0` scans a path visible to the daemon.
//! - `zINSTREAM\0` followed by `<u32 big-endian length><bytes>` chunks and a
//!   zero-length terminator scans pushed content.
//!
//! Both scan commands answer `<name>: OK`, `<name>: <signature> FOUND` or
//! `<name>: <message> ERROR`, and share one reply classifier.

use crate::core::{FileInput, ScanError, ScanVerdict, Scanner};

use async_trait::async_trait;
use futures::io::AsyncReadExt as _;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const ENGINE: &str = "clamav";

/// ClamAV scanner configuration.
#[derive(Debug, Clone)]
pub struct ClamAvConfig {
    /// Daemon host name or address.
    pub host: String,

    /// Daemon TCP port.
    pub port: u16,

    /// Connection timeout.
    pub connection_timeout: Duration,

    /// Timeout for a whole command exchange, including the reply.
    pub scan_timeout: Duration,

    /// Size of each INSTREAM chunk.
    pub chunk_size: usize,
}

impl Default for ClamAvConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3310,
            connection_timeout: Duration::from_secs(10),
            scan_timeout: Duration::from_secs(300),
            chunk_size: 2048,
        }
    }
}

impl ClamAvConfig {
    /// Creates a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the daemon address.
    pub fn with_tcp(mut self, host: impl Into<String>, port: u16) -> Self {
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

    /// Sets the INSTREAM chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Returns the `host:port` address of the daemon.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// ClamAV scanner implementation.
///
/// # Example
///
/// ```rust,ignore
/// use scanflow::backends::clamav::{ClamAvConfig, ClamAvScanner};
///
/// let config = ClamAvConfig::new().with_tcp("clamav", 3310);
/// let scanner = ClamAvScanner::new(config)?;
/// ```
#[derive(Debug)]
pub struct ClamAvScanner {
    config: ClamAvConfig,
}

impl ClamAvScanner {
    /// Creates a new ClamAV scanner with the given configuration.
    pub fn new(config: ClamAvConfig) -> Result<Self, ScanError> {
        if config.host.trim().is_empty() {
            return Err(ScanError::configuration("clamd host must not be empty"));
        }
        if config.port == 0 {
            return Err(ScanError::configuration("clamd port must not be zero"));
        }

        Ok(Self { config })
    }

    /// Creates a ClamAV scanner with default configuration.
    pub fn with_defaults() -> Result<Self, ScanError> {
        Self::new(ClamAvConfig::default())
    }

    /// Returns the scanner configuration.
    pub fn config(&self) -> &ClamAvConfig {
        &self.config
    }

    /// Classifies a clamd scan reply.
    fn parse_reply(reply: &str) -> Result<ScanVerdict, ScanError> {
        let reply = reply.trim_end_matches('\0').trim();

        if let Some(body) = reply.strip_suffix(" FOUND") {
            // "stream: Eicar-Test-Signature FOUND"
            let signature = body
                .rsplit_once(": ")
                .map(|(_, sig)| sig)
                .unwrap_or(body)
                .trim();
            let signature = if signature.is_empty() {
                "Unknown"
            } else {
                signature
            };
            Ok(ScanVerdict::infected(ENGINE, signature))
        } else if reply.ends_with(": OK") || reply == "OK" {
            Ok(ScanVerdict::clean(ENGINE))
        } else if let Some(message) = reply.strip_suffix(" ERROR") {
            Err(ScanError::EngineError {
                engine: ENGINE.to_string(),
                message: message.to_string(),
            })
        } else {
            Err(ScanError::AmbiguousResponse {
                engine: ENGINE.to_string(),
                details: format!("unexpected reply: {reply:?}"),
            })
        }
    }

    async fn connect(&self) -> Result<TcpStream, ScanError> {
        let address = self.config.address();
        match tokio::time::timeout(self.config.connection_timeout, TcpStream::connect(&address))
            .await
        {
            Ok(Ok(stream)) => Ok(stream),
            Ok(Err(e)) => Err(ScanError::connection_failed(
                ENGINE,
                format!("{address}: {e}"),
            )),
            Err(_) => Err(ScanError::timeout(ENGINE, self.config.connection_timeout)),
        }
    }

    /// Runs `exchange` against a fresh connection under the scan timeout.
    async fn with_timeout<F, T>(&self, exchange: F) -> Result<T, ScanError>
    where
        F: std::future::Future<Output = Result<T, ScanError>>,
    {
        match tokio::time::timeout(self.config.scan_timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(ScanError::timeout(ENGINE, self.config.scan_timeout)),
        }
    }

    async fn read_reply(stream: &mut TcpStream) -> Result<String, ScanError> {
        let mut raw = Vec::new();
        stream
            .read_to_end(&mut raw)
            .await
            .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))?;
        Ok(String::from_utf8_lossy(&raw)
            .trim_end_matches('\0')
            .trim()
            .to_string())
    }

    async fn write(stream: &mut TcpStream, bytes: &[u8]) -> Result<(), ScanError> {
        stream
            .write_all(bytes)
            .await
            .map_err(|e| ScanError::connection_failed(ENGINE, e.to_string()))
    }

    async fn write_chunk(stream: &mut TcpStream, chunk: &[u8]) -> Result<(), ScanError> {
        let len = u32::try_from(chunk.len())
            .map_err(|_| ScanError::internal("INSTREAM chunk exceeds u32 length"))?;
        Self::write(stream, &len.to_be_bytes()).await?;
        Self::write(stream, chunk).await
    }

    async fn scan_path(&self, path: &std::path::Path) -> Result<String, ScanError> {
        let path = path.to_str().ok_or_else(|| ScanError::FileNotFound {
            path: path.display().to_string(),
        })?;
        if path.contains('\0') || path.contains('\n') {
            return Err(ScanError::FileNotFound {
                path: path.escape_debug().to_string(),
            });
        }

        let mut stream = self.connect().await?;
        Self::write(&mut stream, format!("zSCAN {path}\0").as_bytes()).await?;
        Self::read_reply(&mut stream).await
    }

    async fn scan_stream(&self, input: &FileInput) -> Result<String, ScanError> {
        let mut stream = self.connect().await?;
        Self::write(&mut stream, b"zINSTREAM\0").await?;

        match input {
            FileInput::Bytes { data, .. } => {
                for chunk in data.chunks(self.config.chunk_size) {
                    Self::write_chunk(&mut stream, chunk).await?;
                }
            }
            FileInput::Stream { reader, .. } => {
                let mut reader = reader.lock().await;
                let mut buffer = vec![0u8; self.config.chunk_size];
                loop {
                    let read = reader.read(&mut buffer).await?;
                    if read == 0 {
                        break;
                    }
                    Self::write_chunk(&mut stream, &buffer[..read]).await?;
                }
            }
            FileInput::Path(_) => {
                return Err(ScanError::internal("path input must use SCAN, not INSTREAM"));
            }
        }

        Self::write(&mut stream, &0u32.to_be_bytes()).await?;
        Self::read_reply(&mut stream).await
    }
}

#[async_trait]
impl Scanner for ClamAvScanner {
    fn name(&self) -> &str {
        ENGINE
    }

    async fn scan(&self, input: &FileInput) -> Result<ScanVerdict, ScanError> {
        let start = Instant::now();

        let reply = match input {
            FileInput::Path(path) => self.with_timeout(self.scan_path(path)).await?,
            _ => self.with_timeout(self.scan_stream(input)).await?,
        };

        tracing::debug!(input = %input.describe(), reply = %reply, "clamd replied");

        Ok(Self::parse_reply(&reply)?.with_duration(start.elapsed()))
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        let reply = self
            .with_timeout(async {
                let mut stream = self.connect().await?;
                Self::write(&mut stream, b"zPING\0").await?;
                Self::read_reply(&mut stream).await
            })
            .await?;

        if reply == "PONG" {
            Ok(())
        } else {
            Err(ScanError::engine_unavailable(
                ENGINE,
                format!("unexpected PING reply: {reply:?}"),
            ))
        }
    }
}
