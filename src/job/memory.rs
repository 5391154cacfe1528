//! In-memory job store.

use crate::core::{JobId, StoreError, StoreResult};
use crate::job::record::{JobUpdate, ScanJob};
use crate::job::store::JobStore;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;

/// A process-local [`JobStore`] backed by a locked map.
///
/// The compare-and-set happens under the write lock, so it is atomic with
/// respect to every other writer in the process.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: RwLock<HashMap<JobId, ScanJob>>,
    writes: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryJobStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_job` calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Returns `true` if no jobs are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Simulates a backend outage: while set, writes fail with `Backend`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Removes a job, as the owning metadata record's deletion would.
    pub fn remove(&self, id: &JobId) -> Option<ScanJob> {
        self.jobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(id)
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::backend("job store unavailable"));
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn get_job(&self, id: &JobId) -> StoreResult<Option<ScanJob>> {
        Ok(self
            .jobs
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(id)
            .cloned())
    }

    async fn insert_job(&self, job: ScanJob) -> StoreResult<()> {
        self.check_available()?;

        let mut jobs = self
            .jobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if jobs.contains_key(&job.id) {
            return Err(StoreError::AlreadyExists {
                id: job.id.to_string(),
            });
        }
        jobs.insert(job.id.clone(), job);
        Ok(())
    }

    async fn save_job(
        &self,
        id: &JobId,
        expected_version: u64,
        update: JobUpdate,
    ) -> StoreResult<ScanJob> {
        self.check_available()?;

        let mut jobs = self
            .jobs
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let job = jobs.get_mut(id).ok_or_else(|| StoreError::NotFound {
            id: id.to_string(),
        })?;

        if job.version != expected_version {
            return Err(StoreError::Conflict {
                id: id.to_string(),
                expected: expected_version,
                actual: job.version,
            });
        }

        tracing::trace!(job_id = %id, fields = ?update.fields(), "Saving scan job");
        update.apply(job);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(job.clone())
    }
}
