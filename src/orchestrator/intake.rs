//! Upload intake: creates the job and schedules its first delivery.

use crate::core::{AccountId, FileRef, JobId, QueueError, StoreError};
use crate::job::{JobStore, ScanJob};
use crate::queue::JobQueue;

use thiserror::Error;

/// Errors raised while accepting an upload.
#[derive(Debug, Error)]
pub enum IntakeError {
    /// The job could not be stored.
    #[error("failed to record scan job: {0}")]
    Store(#[from] StoreError),

    /// The job was stored but could not be scheduled.
    #[error("failed to schedule scan job {id}: {source}")]
    Queue {
        /// The stored job.
        id: JobId,
        /// The queue failure.
        #[source]
        source: QueueError,
    },
}

/// Records a pending scan job for an accepted upload and enqueues it.
///
/// If enqueueing fails the job stays `pending` in the store so a sweeper can
/// schedule it later; the error carries its id.
pub async fn accept_upload(
    jobs: &dyn JobStore,
    queue: &dyn JobQueue,
    file: FileRef,
    owner: AccountId,
    max_retries: u32,
) -> Result<JobId, IntakeError> {
    let job = ScanJob::new(file, owner).with_max_retries(max_retries);
    let id = job.id.clone();

    tracing::info!(
        job_id = %id,
        file = %job.file,
        owner = %job.owner,
        max_retries,
        "Accepting upload for scanning"
    );

    jobs.insert_job(job).await?;
    queue
        .enqueue(id.clone())
        .await
        .map_err(|source| IntakeError::Queue {
            id: id.clone(),
            source,
        })?;

    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ScanState;
    use crate::job::MemoryJobStore;
    use crate::queue::{Delivery, HandlerOutcome, JobHandler, MemoryJobQueue, QueueConfig};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Completing;

    #[async_trait]
    impl JobHandler for Completing {
        async fn handle(&self, _delivery: &Delivery) -> HandlerOutcome {
            HandlerOutcome::Completed
        }
    }

    #[tokio::test]
    async fn test_accept_upload_records_pending_job() {
        let jobs = MemoryJobStore::new();
        let queue = MemoryJobQueue::start(QueueConfig::default(), Arc::new(Completing));

        let id = accept_upload(
            &jobs,
            &queue,
            FileRef::new("schematics/castle.schem"),
            AccountId::new("user-1"),
            3,
        )
        .await
        .unwrap();

        let job = jobs.get_job(&id).await.unwrap().unwrap();
        assert_eq!(job.state, ScanState::Pending);
        assert_eq!(job.retry_count, 0);
        assert_eq!(job.max_retries, 3);

        queue.wait_idle().await;
        assert_eq!(queue.stats().enqueued, 1);
    }

    #[tokio::test]
    async fn test_closed_queue_keeps_job() {
        let jobs = MemoryJobStore::new();
        let queue = MemoryJobQueue::start(QueueConfig::default(), Arc::new(Completing));
        queue.shutdown().await;

        let result = accept_upload(
            &jobs,
            &queue,
            FileRef::new("a.schem"),
            AccountId::new("user-1"),
            5,
        )
        .await;

        match result {
            Err(IntakeError::Queue { id, source }) => {
                assert!(matches!(source, QueueError::Closed));
                assert!(jobs.get_job(&id).await.unwrap().is_some());
            }
            other => panic!("expected queue error, got {other:?}"),
        }
    }
}
