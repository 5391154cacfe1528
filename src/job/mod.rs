//! Scan job records and their storage.
//!
//! A [`ScanJob`] is the durable state machine record for one uploaded file.
//! The [`JobStore`] trait is the metadata collaborator; [`MemoryJobStore`]
//! is a process-local implementation.

mod memory;
mod record;
mod store;

pub use memory::MemoryJobStore;
pub use record::{
    JobUpdate, LastResult, ScanJob, DEFAULT_MAX_RETRIES, MAX_RETRIES_DETAIL,
};
pub use store::JobStore;
