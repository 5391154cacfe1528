//! Scan orchestration.
//!
//! This module contains the [`ScanOrchestrator`], which drives each scan job
//! through its lifecycle:
//!
//! ```text
//! pending ──► scanning ──► clean
//!    ▲           │
//!    │           ├──────► infected   (file deleted, owner penalized)
//!    │           │
//!    └───────────┴──────► error      (retry ceiling, file deleted)
//! ```
//!
//! It also provides [`accept_upload`] for creating jobs and the
//! [`BackoffPolicy`] used between retries.

mod backoff;
mod disposition;
mod intake;
mod scan_orchestrator;

pub use backoff::BackoffPolicy;
pub use disposition::Disposition;
pub use intake::{accept_upload, IntakeError};
pub use scan_orchestrator::{OrchestratorConfig, ScanOrchestrator, ScanOrchestratorBuilder};
