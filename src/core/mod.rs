//! Core types and traits for the scanflow crate.
//!
//! - [`types`] - Identifiers, job states and scan verdicts
//! - [`traits`] - The `Scanner` trait
//! - [`error`] - Structured error types
//! - [`input`] - File input abstraction

pub mod error;
pub mod input;
pub mod traits;
pub mod types;

pub use error::{FileStoreError, LedgerError, QueueError, ScanError, StoreError, StoreResult};
pub use input::FileInput;
pub use traits::{ArcScanner, Scanner};
pub use types::{AccountId, FileRef, JobId, ScanOutcome, ScanState, ScanVerdict};
