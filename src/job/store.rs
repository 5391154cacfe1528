//! Job store trait definition.

use crate::core::{JobId, StoreResult};
use crate::job::record::{JobUpdate, ScanJob};

use async_trait::async_trait;
use std::fmt::Debug;

/// Durable storage for scan jobs (the metadata store).
///
/// `save_job` is a conditional write: it succeeds only while the stored
/// version equals `expected_version`. This is the only synchronisation the
/// orchestrator relies on; two deliveries of the same job can both read a
/// non-terminal state, but only one of them can win the write that moves it
/// to a terminal state.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use scanflow::job::{JobStore, JobUpdate, ScanJob};
/// use scanflow::core::{JobId, StoreResult};
/// use async_trait::async_trait;
///
/// #[derive(Debug)]
/// struct PgJobStore { /* pool */ }
///
/// #[async_trait]
/// impl JobStore for PgJobStore {
///     async fn get_job(&self, id: &JobId) -> StoreResult<Option<ScanJob>> {
///         // SELECT ... WHERE id = $1
///         todo!()
///     }
///
///     async fn insert_job(&self, job: ScanJob) -> StoreResult<()> {
///         todo!()
///     }
///
///     async fn save_job(
///         &self,
///         id: &JobId,
///         expected_version: u64,
///         update: JobUpdate,
///     ) -> StoreResult<ScanJob> {
///         // UPDATE ... SET ..., version = version + 1
///         // WHERE id = $1 AND version = $2 RETURNING *
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait JobStore: Send + Sync + Debug {
    /// Loads a job, or `None` if it does not exist.
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<ScanJob>>;

    /// Inserts a new job.
    ///
    /// # Errors
    ///
    /// `AlreadyExists` if a job with the same id is stored.
    async fn insert_job(&self, job: ScanJob) -> StoreResult<()>;

    /// Applies `update` if the stored version equals `expected_version`.
    ///
    /// Returns the job as written.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the job no longer exists.
    /// - `Conflict` if another writer saved the job first.
    async fn save_job(
        &self,
        id: &JobId,
        expected_version: u64,
        update: JobUpdate,
    ) -> StoreResult<ScanJob>;
}
