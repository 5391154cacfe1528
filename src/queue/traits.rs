//! Job queue contract consumed by the orchestrator.

use crate::core::{JobId, QueueError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::time::Duration;

/// One delivery of a job to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// The job to process.
    pub job_id: JobId,
    /// 1-based delivery attempt for this job.
    pub attempt: u32,
    /// When this delivery was scheduled.
    pub scheduled_at: DateTime<Utc>,
}

impl Delivery {
    /// Creates the first delivery of a job.
    pub fn first(job_id: JobId) -> Self {
        Self {
            job_id,
            attempt: 1,
            scheduled_at: Utc::now(),
        }
    }

    /// Creates the next delivery of the same job.
    pub fn next(&self) -> Self {
        Self {
            job_id: self.job_id.clone(),
            attempt: self.attempt.saturating_add(1),
            scheduled_at: Utc::now(),
        }
    }
}

/// What a handler tells the queue after processing a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Done; do not deliver again.
    Completed,
    /// Deliver again after the given delay.
    RetryAfter(Duration),
    /// Permanently failed; do not deliver again.
    FailedTerminal {
        /// Why the job failed.
        reason: String,
    },
}

impl HandlerOutcome {
    /// Returns the redelivery delay, if a retry was requested.
    pub fn retry_delay(&self) -> Option<Duration> {
        match self {
            Self::RetryAfter(delay) => Some(*delay),
            _ => None,
        }
    }
}

/// A job handler invoked once per delivery.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Processes one delivery.
    async fn handle(&self, delivery: &Delivery) -> HandlerOutcome;
}

/// At-least-once job queue with delayed delivery.
#[async_trait]
pub trait JobQueue: Send + Sync + Debug {
    /// Schedules a job for immediate delivery.
    async fn enqueue(&self, job_id: JobId) -> Result<(), QueueError>;

    /// Schedules a job for delivery after `delay`.
    async fn enqueue_after(&self, job_id: JobId, delay: Duration) -> Result<(), QueueError>;
}
