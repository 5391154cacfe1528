//! Error types for the scanflow crate.
//!
//! Every fallible operation returns one of these typed errors. The
//! orchestrator turns them into job bookkeeping; none of them escape to the
//! job queue as anything other than a retry request.

use std::time::Duration;
use thiserror::Error;

/// Errors raised while talking to a scanning engine.
///
/// The scan client never surfaces these to its callers as a clean result;
/// every variant maps to a `scan_error` classification.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scanning engine is unavailable or not responding.
    #[error("engine '{engine}' is unavailable: {reason}")]
    EngineUnavailable {
        /// Name of the engine that is unavailable.
        engine: String,
        /// Human-readable reason for unavailability.
        reason: String,
    },

    /// The scan operation timed out.
    #[error("scan timed out after {elapsed:?} on engine '{engine}'")]
    Timeout {
        /// Name of the engine that timed out.
        engine: String,
        /// How long the operation ran before timing out.
        elapsed: Duration,
    },

    /// Failed to connect to the scanning engine.
    #[error("connection to engine '{engine}' failed: {message}")]
    ConnectionFailed {
        /// Name of the engine.
        engine: String,
        /// Error message describing the failure.
        message: String,
    },

    /// An I/O error occurred while reading the input.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File not found at the specified path.
    #[error("file not found: {path}")]
    FileNotFound {
        /// Path that was not found.
        path: String,
    },

    /// The engine returned a reply that is neither clean, infected nor error.
    #[error("ambiguous response from engine '{engine}': {details}")]
    AmbiguousResponse {
        /// Name of the engine.
        engine: String,
        /// Details about the ambiguity.
        details: String,
    },

    /// The engine reported an error while scanning.
    #[error("engine '{engine}' reported an error: {message}")]
    EngineError {
        /// Name of the engine.
        engine: String,
        /// Error text returned by the engine.
        message: String,
    },

    /// An internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },

    /// Configuration error.
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the configuration error.
        message: String,
    },
}

impl ScanError {
    /// Returns `true` if a later attempt may succeed.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }

    /// Returns `true` if this error indicates the engine is unhealthy.
    pub fn indicates_unhealthy_engine(&self) -> bool {
        matches!(
            self,
            Self::EngineUnavailable { .. } | Self::Timeout { .. } | Self::ConnectionFailed { .. }
        )
    }

    /// Creates an `EngineUnavailable` error.
    pub fn engine_unavailable(engine: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EngineUnavailable {
            engine: engine.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(engine: impl Into<String>, elapsed: Duration) -> Self {
        Self::Timeout {
            engine: engine.into(),
            elapsed,
        }
    }

    /// Creates a `ConnectionFailed` error.
    pub fn connection_failed(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Creates an `Internal` error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Creates a `Configuration` error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

/// Errors raised by a [`JobStore`](crate::job::JobStore).
#[derive(Debug, Error)]
pub enum StoreError {
    /// No job exists with the given id.
    #[error("scan job not found: {id}")]
    NotFound {
        /// The missing job id.
        id: String,
    },

    /// A job with the given id already exists.
    #[error("scan job already exists: {id}")]
    AlreadyExists {
        /// The duplicate job id.
        id: String,
    },

    /// The conditional write lost against a concurrent writer.
    #[error("version conflict on scan job {id}: expected {expected}, found {actual}")]
    Conflict {
        /// The contended job id.
        id: String,
        /// Version the writer read.
        expected: u64,
        /// Version currently stored.
        actual: u64,
    },

    /// The backing store failed.
    #[error("job store backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates a `Backend` error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Returns `true` for a lost compare-and-set.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors raised by a [`FileStore`](crate::storage::FileStore).
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// The file reference cannot be mapped to a storage location.
    #[error("invalid file reference '{reference}': {reason}")]
    InvalidReference {
        /// The offending reference.
        reference: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Deleting the file failed.
    #[error("failed to delete '{reference}': {reason}")]
    DeleteFailed {
        /// The file reference.
        reference: String,
        /// Reason for the failure.
        reason: String,
    },

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised by a [`PenaltyLedger`](crate::ledger::PenaltyLedger).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger backend failed.
    #[error("penalty ledger backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

/// Errors raised by a [`JobQueue`](crate::queue::JobQueue).
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue has been shut down and no longer accepts jobs.
    #[error("job queue is closed")]
    Closed,
}

/// A specialized `Result` type for job store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_error_is_recoverable() {
        let timeout = ScanError::timeout("clamav", Duration::from_secs(30));
        assert!(timeout.is_recoverable());

        let config = ScanError::configuration("no host");
        assert!(!config.is_recoverable());
    }

    #[test]
    fn test_scan_error_unhealthy_engine() {
        let err = ScanError::engine_unavailable("clamav", "service not running");
        assert!(err.indicates_unhealthy_engine());

        let io_err = ScanError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "test error",
        ));
        assert!(!io_err.indicates_unhealthy_engine());
    }

    #[test]
    fn test_store_error_display() {
        let err = StoreError::Conflict {
            id: "job-1".into(),
            expected: 3,
            actual: 4,
        };
        assert!(err.is_conflict());
        assert!(err.to_string().contains("expected 3"));
        assert!(err.to_string().contains("found 4"));
    }
}
