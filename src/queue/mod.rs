//! Job queue used to deliver scan jobs to the orchestrator.
//!
//! The queue gives at-least-once delivery: a job may reach its handler more
//! than once, possibly concurrently, so handlers must be idempotent.

mod memory;
mod traits;

pub use memory::{MemoryJobQueue, QueueConfig, QueueStats};
pub use traits::{Delivery, HandlerOutcome, JobHandler, JobQueue};
