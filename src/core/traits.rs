//! The `Scanner` trait implemented by scanning engine adapters.

use crate::core::error::ScanError;
use crate::core::input::FileInput;
use crate::core::types::ScanVerdict;

use async_trait::async_trait;
use std::fmt::Debug;

/// A single malware scanning engine.
///
/// Implementations perform exactly one attempt per call and carry no retry
/// logic. They report a definitive verdict (`clean` or `infected`) as `Ok`
/// and anything they could not complete as `Err`.
///
/// # Implementation Notes
///
/// - Implementations must be `Send + Sync` so one instance can serve the
///   whole worker pool.
/// - `health_check` is the liveness check the scan client runs before every
///   scan; it should not need file data.
/// - Implementations should never panic.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scanflow::core::{FileInput, ScanError, ScanVerdict, Scanner};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct AlwaysClean;
///
/// #[async_trait]
/// impl Scanner for AlwaysClean {
///     fn name(&self) -> &str {
///         "always-clean"
///     }
///
///     async fn scan(&self, _input: &FileInput) -> Result<ScanVerdict, ScanError> {
///         Ok(ScanVerdict::clean(self.name()))
///     }
///
///     async fn health_check(&self) -> Result<(), ScanError> {
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Scanner: Send + Sync + Debug {
    /// Returns the name of this scanner engine, e.g. "clamav".
    fn name(&self) -> &str;

    /// Scans the given input.
    ///
    /// # Errors
    ///
    /// - `EngineUnavailable` / `ConnectionFailed` - the engine is not reachable.
    /// - `Timeout` - the scan took too long.
    /// - `Io` / `FileNotFound` - the input could not be read.
    /// - `AmbiguousResponse` / `EngineError` - the engine did not classify the file.
    async fn scan(&self, input: &FileInput) -> Result<ScanVerdict, ScanError>;

    /// Verifies the engine is reachable and responding.
    async fn health_check(&self) -> Result<(), ScanError>;
}

/// An arc-wrapped scanner for shared ownership.
pub type ArcScanner = std::sync::Arc<dyn Scanner>;
