//! Scan client: one fail-closed scan attempt against the configured engine.
//!
//! The client owns the security contract of the pipeline. A disabled client
//! reports `clean` with an explicit skipped marker; an enabled client checks
//! the daemon before submitting content, and every failure maps to
//! `scan_error`.

mod scan_client;

pub use scan_client::{ScanClient, ScanClientConfig};
