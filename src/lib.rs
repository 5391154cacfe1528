//! # Scanflow
//!
//! A retryable malware-scanning pipeline for untrusted uploads.
//!
//! ## Overview
//!
//! Every accepted upload gets a scan job. A queue delivers the job to the
//! [`ScanOrchestrator`], which asks the [`ScanClient`] for a verdict and
//! records the disposition:
//!
//! - **clean**: the file becomes visible
//! - **infected**: the file is deleted and the owner's penalty counter is incremented
//! - **scan error**: the job is retried with exponential backoff until the
//!   retry ceiling, then marked `error` and the file is deleted
//!
//! Scanning fails closed: a daemon that cannot be reached never yields a
//! clean verdict.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scanflow::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig::from_env()?;
//!     let jobs = Arc::new(MemoryJobStore::new());
//!
//!     let orchestrator = ScanOrchestrator::builder()
//!         .with_job_store(jobs.clone())
//!         .with_file_store(Arc::new(LocalFileStore::new("uploads")?))
//!         .with_ledger(Arc::new(MemoryPenaltyLedger::new()))
//!         .with_client(ScanClient::clamav(config.scan_client())?)
//!         .with_config(config.orchestrator())
//!         .build()?;
//!
//!     let queue = MemoryJobQueue::start(config.queue(), Arc::new(orchestrator));
//!     let id = accept_upload(
//!         jobs.as_ref(),
//!         &queue,
//!         FileRef::new("schematics/castle.schem"),
//!         AccountId::new("user-1"),
//!         config.max_retries(),
//!     )
//!     .await?;
//!
//!     queue.wait_idle().await;
//!     println!("{:?}", jobs.get_job(&id).await?);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `default` - Includes the ClamAV backend
//! - `clamav` - ClamAV daemon backend over TCP
//!
//! ## Architecture
//!
//! - **Core**: Identifiers, verdicts, the `Scanner` trait and error types
//! - **Backends**: Scanner implementations (clamd, mock)
//! - **Client**: The fail-closed scan client
//! - **Job**: Job records and the version-checked job store
//! - **Orchestrator**: The job state machine, backoff and intake
//! - **Queue**: The delivery contract and an in-process queue
//! - **Storage / Ledger**: File store and penalty ledger collaborators
//! - **Audit**: Structured logging of dispositions

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod audit;
pub mod backends;
pub mod client;
pub mod config;
pub mod core;
pub mod job;
pub mod ledger;
pub mod orchestrator;
pub mod queue;
pub mod storage;

// Re-export commonly used types at the crate root
pub use crate::client::{ScanClient, ScanClientConfig};
pub use crate::config::{ConfigError, PipelineConfig};
pub use crate::core::{
    AccountId, FileInput, FileRef, JobId, ScanError, ScanOutcome, ScanState, ScanVerdict,
    Scanner, StoreError,
};
pub use crate::job::{JobStore, MemoryJobStore, ScanJob};
pub use crate::ledger::{MemoryPenaltyLedger, PenaltyLedger};
pub use crate::orchestrator::{
    accept_upload, BackoffPolicy, Disposition, ScanOrchestrator, ScanOrchestratorBuilder,
};
pub use crate::queue::{HandlerOutcome, JobHandler, JobQueue, MemoryJobQueue, QueueConfig};
pub use crate::storage::{FileStore, LocalFileStore, MemoryFileStore};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::client::{ScanClient, ScanClientConfig};
    pub use crate::config::PipelineConfig;
    pub use crate::core::{
        AccountId, FileInput, FileRef, JobId, ScanError, ScanOutcome, ScanState, ScanVerdict,
        Scanner,
    };
    pub use crate::job::{JobStore, MemoryJobStore, ScanJob};
    pub use crate::ledger::{MemoryPenaltyLedger, PenaltyLedger};
    pub use crate::orchestrator::{accept_upload, Disposition, ScanOrchestrator};
    pub use crate::queue::{JobQueue, MemoryJobQueue, QueueConfig};
    pub use crate::storage::{FileStore, LocalFileStore, MemoryFileStore};
}
