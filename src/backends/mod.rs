//! Scanning backend implementations.
//!
//! - [`mock`] - A mock scanner for testing
//! - [`clamav`] - ClamAV daemon over TCP (requires `clamav` feature)
//!
//! ## Implementing a Custom Backend
//!
//! Implement the [`Scanner`](crate::core::Scanner) trait. Report definitive
//! verdicts as `Ok` and everything else as `Err`; the scan client turns
//! every error into a fail-closed `scan_error` classification.

pub mod mock;

#[cfg(feature = "clamav")]
pub mod clamav;

pub use mock::{MockBehavior, MockScanner};

#[cfg(feature = "clamav")]
pub use clamav::{ClamAvConfig, ClamAvScanner};
