//! The scan job state machine.

use crate::audit;
use crate::client::ScanClient;
use crate::core::{JobId, ScanError, ScanOutcome, ScanState, ScanVerdict, StoreError, StoreResult};
use crate::job::{JobStore, JobUpdate, LastResult, ScanJob};
use crate::ledger::PenaltyLedger;
use crate::orchestrator::backoff::BackoffPolicy;
use crate::orchestrator::disposition::Disposition;
use crate::queue::{Delivery, HandlerOutcome, JobHandler};
use crate::storage::FileStore;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use tracing::Instrument;

/// Configuration for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Delay schedule for transient failures.
    pub backoff: BackoffPolicy,

    /// Conditional writes attempted before giving up on a contended job.
    pub max_write_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            max_write_attempts: 8,
        }
    }
}

impl OrchestratorConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the conditional write attempt limit.
    pub fn with_max_write_attempts(mut self, attempts: u32) -> Self {
        self.max_write_attempts = attempts.max(1);
        self
    }
}

/// Builder for creating a `ScanOrchestrator`.
#[derive(Debug, Default)]
pub struct ScanOrchestratorBuilder {
    jobs: Option<Arc<dyn JobStore>>,
    files: Option<Arc<dyn FileStore>>,
    ledger: Option<Arc<dyn PenaltyLedger>>,
    client: Option<ScanClient>,
    config: OrchestratorConfig,
}

impl ScanOrchestratorBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the job store.
    pub fn with_job_store(mut self, jobs: Arc<dyn JobStore>) -> Self {
        self.jobs = Some(jobs);
        self
    }

    /// Sets the file store.
    pub fn with_file_store(mut self, files: Arc<dyn FileStore>) -> Self {
        self.files = Some(files);
        self
    }

    /// Sets the penalty ledger.
    pub fn with_ledger(mut self, ledger: Arc<dyn PenaltyLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sets the scan client.
    pub fn with_client(mut self, client: ScanClient) -> Self {
        self.client = Some(client);
        self
    }

    /// Sets the configuration.
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the orchestrator.
    pub fn build(self) -> Result<ScanOrchestrator, ScanError> {
        let jobs = self
            .jobs
            .ok_or_else(|| ScanError::configuration("A job store is required"))?;
        let files = self
            .files
            .ok_or_else(|| ScanError::configuration("A file store is required"))?;
        let ledger = self
            .ledger
            .ok_or_else(|| ScanError::configuration("A penalty ledger is required"))?;
        let client = self
            .client
            .ok_or_else(|| ScanError::configuration("A scan client is required"))?;

        Ok(ScanOrchestrator {
            jobs,
            files,
            ledger,
            client,
            config: self.config,
        })
    }
}

/// Outcome of a conditional write.
enum Commit {
    /// The update was written; holds the job as stored.
    Written(ScanJob),
    /// The job was (or became) terminal, so nothing was written.
    Terminal(ScanJob),
}

/// Drives one scan job per delivery.
///
/// Every state change is a conditional write on the job's version. Side
/// effects on the infected and retries-exhausted paths run only in the
/// delivery whose write moved the job into that terminal state, so
/// concurrent or repeated deliveries of the same job delete the file and
/// penalize the owner at most once.
#[derive(Debug, Clone)]
pub struct ScanOrchestrator {
    jobs: Arc<dyn JobStore>,
    files: Arc<dyn FileStore>,
    ledger: Arc<dyn PenaltyLedger>,
    client: ScanClient,
    config: OrchestratorConfig,
}

impl ScanOrchestrator {
    /// Creates a new builder.
    pub fn builder() -> ScanOrchestratorBuilder {
        ScanOrchestratorBuilder::new()
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Returns the scan client.
    pub fn client(&self) -> &ScanClient {
        &self.client
    }

    /// Processes one delivery of the job `id`.
    ///
    /// Never fails: store errors are folded into a retry disposition.
    pub async fn process(&self, id: &JobId) -> Disposition {
        let job = match self.jobs.get_job(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id = %id, "Scan job not found, dropping delivery");
                return Disposition::NotFound;
            }
            Err(e) => return self.recover(id, &e.to_string()).await,
        };

        match self.advance(job).await {
            Ok(disposition) => disposition,
            Err(e) => self.recover(id, &e.to_string()).await,
        }
    }

    async fn advance(&self, job: ScanJob) -> StoreResult<Disposition> {
        if job.is_terminal() {
            tracing::debug!(
                job_id = %job.id,
                state = %job.state,
                "Scan job already terminal, skipping"
            );
            return Ok(Disposition::AlreadyTerminal(job.state));
        }

        if job.retries_exhausted() {
            tracing::warn!(
                job_id = %job.id,
                retry_count = job.retry_count,
                max_retries = job.max_retries,
                "Scan retry ceiling reached before scanning"
            );
            let update = |_: &ScanJob| {
                JobUpdate::new()
                    .state(ScanState::Error)
                    .last_result(LastResult::max_retries_exceeded())
            };
            return match self.commit(job, update).await? {
                Commit::Written(job) => Ok(self.finish_exhausted(&job).await),
                Commit::Terminal(job) => Ok(Disposition::AlreadyTerminal(job.state)),
            };
        }

        // Persisted before the engine is contacted; a redelivery that finds
        // `scanning` simply scans again.
        let mark_scanning = |_: &ScanJob| JobUpdate::new().state(ScanState::Scanning);
        let job = match self.commit(job, mark_scanning).await? {
            Commit::Written(job) => job,
            Commit::Terminal(job) => return Ok(Disposition::AlreadyTerminal(job.state)),
        };
        audit::emit_scan_started(&job);

        let verdict = match self.files.locate(&job.file).await {
            Ok(input) => self.client.scan(&input).await,
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    file = %job.file,
                    error = %e,
                    "Upload could not be located for scanning"
                );
                ScanVerdict::scan_error(self.client.engine(), format!("upload unavailable: {e}"))
            }
        };

        match verdict.outcome {
            ScanOutcome::Clean => self.settle_clean(job, &verdict).await,
            ScanOutcome::Infected => self.settle_infected(job, &verdict).await,
            ScanOutcome::ScanError => self.settle_error(job, LastResult::from(&verdict)).await,
        }
    }

    async fn settle_clean(&self, job: ScanJob, verdict: &ScanVerdict) -> StoreResult<Disposition> {
        let now = Utc::now();
        let result = LastResult::from(verdict);
        let update = |_: &ScanJob| {
            JobUpdate::new()
                .state(ScanState::Clean)
                .scanned_at(now)
                .last_result(result.clone())
        };

        match self.commit(job, update).await? {
            Commit::Terminal(job) => Ok(Disposition::AlreadyTerminal(job.state)),
            Commit::Written(job) => {
                tracing::info!(
                    job_id = %job.id,
                    engine = %verdict.engine,
                    skipped = verdict.skipped,
                    duration_ms = verdict.duration_ms,
                    "Upload scanned clean"
                );
                let disposition = Disposition::Clean {
                    skipped: verdict.skipped,
                };
                audit::emit_disposition(&job, &disposition);
                Ok(disposition)
            }
        }
    }

    async fn settle_infected(
        &self,
        job: ScanJob,
        verdict: &ScanVerdict,
    ) -> StoreResult<Disposition> {
        let now = Utc::now();
        let result = LastResult::from(verdict);
        let update = |_: &ScanJob| {
            JobUpdate::new()
                .state(ScanState::Infected)
                .scanned_at(now)
                .last_result(result.clone())
        };

        match self.commit(job, update).await? {
            // Another delivery already settled this job and ran the side effects.
            Commit::Terminal(job) => Ok(Disposition::AlreadyTerminal(job.state)),
            Commit::Written(job) => {
                tracing::warn!(
                    job_id = %job.id,
                    owner = %job.owner,
                    signature = ?verdict.signature,
                    engine = %verdict.engine,
                    "Threat detected in upload"
                );

                let file_deleted = self.delete_upload(&job, "infected").await;
                let penalty_recorded = self.penalize(&job).await;

                let disposition = Disposition::Infected {
                    signature: verdict.signature.clone(),
                    file_deleted,
                    penalty_recorded,
                };
                audit::emit_disposition(&job, &disposition);
                Ok(disposition)
            }
        }
    }

    async fn settle_error(&self, job: ScanJob, result: LastResult) -> StoreResult<Disposition> {
        let update = |current: &ScanJob| {
            let retry_count = current
                .retry_count
                .saturating_add(1)
                .min(current.max_retries);
            if retry_count >= current.max_retries {
                JobUpdate::new()
                    .state(ScanState::Error)
                    .retry_count(retry_count)
                    .last_result(LastResult::max_retries_exceeded())
            } else {
                JobUpdate::new()
                    .state(ScanState::Pending)
                    .retry_count(retry_count)
                    .last_result(result.clone())
            }
        };

        match self.commit(job, update).await? {
            Commit::Terminal(job) => Ok(Disposition::AlreadyTerminal(job.state)),
            Commit::Written(job) if job.state == ScanState::Error => {
                tracing::warn!(
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    detail = ?result.detail,
                    "Scan failed and retry ceiling reached"
                );
                Ok(self.finish_exhausted(&job).await)
            }
            Commit::Written(job) => {
                let delay = self.config.backoff.delay_for_retry(job.retry_count);
                tracing::warn!(
                    job_id = %job.id,
                    retry_count = job.retry_count,
                    max_retries = job.max_retries,
                    delay_secs = delay.as_secs(),
                    detail = ?result.detail,
                    "Scan failed, scheduling retry"
                );
                audit::emit_retry_scheduled(&job, delay);
                Ok(Disposition::RetryScheduled {
                    retry_count: job.retry_count,
                    delay,
                })
            }
        }
    }

    async fn finish_exhausted(&self, job: &ScanJob) -> Disposition {
        let file_deleted = self.delete_upload(job, "retries_exhausted").await;
        let disposition = Disposition::RetriesExhausted { file_deleted };
        audit::emit_disposition(job, &disposition);
        disposition
    }

    /// Applies the step-6 bookkeeping after an unexpected failure.
    async fn recover(&self, id: &JobId, reason: &str) -> Disposition {
        tracing::error!(
            job_id = %id,
            error = %reason,
            "Unexpected failure while processing scan job"
        );

        let job = match self.jobs.get_job(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::warn!(job_id = %id, "Scan job disappeared during processing");
                return Disposition::NotFound;
            }
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    error = %e,
                    "Could not reload scan job, leaving redelivery to the queue"
                );
                return Disposition::Unrecorded {
                    delay: self.config.backoff.delay_for_retry(1),
                };
            }
        };

        let delay = self
            .config
            .backoff
            .delay_for_retry(job.retry_count.saturating_add(1));
        match self.settle_error(job, LastResult::error(reason)).await {
            Ok(disposition) => disposition,
            Err(e) => {
                tracing::error!(
                    job_id = %id,
                    error = %e,
                    "Could not record scan failure, leaving redelivery to the queue"
                );
                Disposition::Unrecorded { delay }
            }
        }
    }

    /// Writes `plan(job)` conditionally, reloading and re-planning on conflict.
    async fn commit<F>(&self, mut job: ScanJob, plan: F) -> StoreResult<Commit>
    where
        F: Fn(&ScanJob) -> JobUpdate,
    {
        let mut attempt = 0;
        loop {
            if job.is_terminal() {
                return Ok(Commit::Terminal(job));
            }

            attempt += 1;
            match self.jobs.save_job(&job.id, job.version, plan(&job)).await {
                Ok(saved) => return Ok(Commit::Written(saved)),
                Err(e) if e.is_conflict() && attempt < self.config.max_write_attempts => {
                    tracing::debug!(
                        job_id = %job.id,
                        attempt,
                        error = %e,
                        "Lost scan job write, reloading"
                    );
                    job = self
                        .jobs
                        .get_job(&job.id)
                        .await?
                        .ok_or_else(|| StoreError::NotFound {
                            id: job.id.to_string(),
                        })?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn delete_upload(&self, job: &ScanJob, reason: &'static str) -> bool {
        match self.files.delete(&job.file).await {
            Ok(()) => {
                audit::emit_file_deleted(job, reason);
                true
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    file = %job.file,
                    reason,
                    error = %e,
                    "Failed to delete upload"
                );
                false
            }
        }
    }

    async fn penalize(&self, job: &ScanJob) -> bool {
        match self.ledger.increment_infected_count(&job.owner).await {
            Ok(total) => {
                audit::emit_penalty_applied(job, total);
                true
            }
            Err(e) => {
                tracing::error!(
                    job_id = %job.id,
                    owner = %job.owner,
                    error = %e,
                    "Failed to record infected upload against owner"
                );
                false
            }
        }
    }
}

#[async_trait]
impl JobHandler for ScanOrchestrator {
    async fn handle(&self, delivery: &Delivery) -> HandlerOutcome {
        let span = tracing::info_span!(
            "scan_job",
            job_id = %delivery.job_id,
            attempt = delivery.attempt
        );
        let disposition = self.process(&delivery.job_id).instrument(span).await;
        tracing::debug!(
            job_id = %delivery.job_id,
            attempt = delivery.attempt,
            disposition = %disposition,
            "Delivery processed"
        );
        disposition.handler_outcome()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::MockScanner;
    use crate::client::ScanClientConfig;
    use crate::core::{AccountId, FileRef};
    use crate::job::{MemoryJobStore, MAX_RETRIES_DETAIL};
    use crate::ledger::MemoryPenaltyLedger;
    use crate::storage::MemoryFileStore;
    use std::time::Duration;

    struct Fixture {
        jobs: Arc<MemoryJobStore>,
        files: Arc<MemoryFileStore>,
        ledger: Arc<MemoryPenaltyLedger>,
        scanner: Arc<MockScanner>,
        orchestrator: ScanOrchestrator,
    }

    impl Fixture {
        fn new(scanner: MockScanner) -> Self {
            Self::with_client_config(scanner, ScanClientConfig::default())
        }

        fn with_client_config(scanner: MockScanner, config: ScanClientConfig) -> Self {
            let jobs = Arc::new(MemoryJobStore::new());
            let files = Arc::new(MemoryFileStore::new());
            let ledger = Arc::new(MemoryPenaltyLedger::new());
            let scanner = Arc::new(scanner);

            let orchestrator = ScanOrchestrator::builder()
                .with_job_store(jobs.clone())
                .with_file_store(files.clone())
                .with_ledger(ledger.clone())
                .with_client(ScanClient::from_arc(config, scanner.clone()))
                .build()
                .unwrap();

            Self {
                jobs,
                files,
                ledger,
                scanner,
                orchestrator,
            }
        }

        async fn seed(&self, job: ScanJob) -> JobId {
            self.files.put(job.file.clone(), b"schematic bytes".to_vec());
            let id = job.id.clone();
            self.jobs.insert_job(job).await.unwrap();
            id
        }

        async fn job(&self, id: &JobId) -> ScanJob {
            self.jobs.get_job(id).await.unwrap().unwrap()
        }

        fn owner_count(&self) -> u64 {
            self.ledger.count(&owner())
        }
    }

    fn owner() -> AccountId {
        AccountId::new("user-1")
    }

    fn pending_job() -> ScanJob {
        ScanJob::new(FileRef::new("schematics/castle.schem"), owner())
    }

    #[tokio::test]
    async fn test_clean_scan() {
        let fx = Fixture::new(MockScanner::new_clean());
        let id = fx.seed(pending_job()).await;

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(disposition, Disposition::Clean { skipped: false });

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Clean);
        assert!(job.scanned_at.is_some());
        assert_eq!(
            job.last_result.unwrap().outcome,
            Some(ScanOutcome::Clean)
        );
        assert_eq!(fx.files.delete_count(), 0);
        assert_eq!(fx.owner_count(), 0);
    }

    #[tokio::test]
    async fn test_infected_scan_deletes_and_penalizes() {
        let fx = Fixture::new(MockScanner::new_infected("Eicar-Test-Signature"));
        let id = fx.seed(pending_job()).await;

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(
            disposition,
            Disposition::Infected {
                signature: Some("Eicar-Test-Signature".to_string()),
                file_deleted: true,
                penalty_recorded: true,
            }
        );

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Infected);
        assert!(job.scanned_at.is_some());
        let result = job.last_result.unwrap();
        assert!(result.infected);
        assert_eq!(result.signature.as_deref(), Some("Eicar-Test-Signature"));
        assert!(!fx.files.contains(&job.file));
        assert_eq!(fx.owner_count(), 1);
    }

    #[tokio::test]
    async fn test_unreachable_daemon_schedules_retry() {
        let scanner = MockScanner::new_clean();
        scanner.make_unhealthy();
        let fx = Fixture::new(scanner);
        let id = fx.seed(pending_job()).await;

        let outcome = fx.orchestrator.handle(&Delivery::first(id.clone())).await;
        assert_eq!(outcome, HandlerOutcome::RetryAfter(Duration::from_secs(120)));

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(
            job.last_result.unwrap().outcome,
            Some(ScanOutcome::ScanError)
        );
        assert_eq!(fx.scanner.scan_count(), 0);
        assert_eq!(fx.files.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_failing_engine_never_reports_clean() {
        let fx = Fixture::new(MockScanner::new_failing("connection refused"));
        let id = fx.seed(pending_job()).await;

        let disposition = fx.orchestrator.process(&id).await;
        assert!(matches!(
            disposition,
            Disposition::RetryScheduled { retry_count: 1, .. }
        ));
        assert_ne!(fx.job(&id).await.state, ScanState::Clean);
    }

    #[tokio::test]
    async fn test_ceiling_reached_before_scanning() {
        let fx = Fixture::new(MockScanner::new_clean());
        let id = fx
            .seed(pending_job().with_retry_count(5).with_max_retries(5))
            .await;

        let outcome = fx.orchestrator.handle(&Delivery::first(id.clone())).await;
        assert!(matches!(outcome, HandlerOutcome::FailedTerminal { .. }));

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Error);
        assert_eq!(job.retry_count, 5);
        assert_eq!(
            job.last_result.unwrap().detail.as_deref(),
            Some(MAX_RETRIES_DETAIL)
        );
        assert!(!fx.files.contains(&job.file));
        assert_eq!(fx.scanner.scan_count(), 0);
        assert_eq!(fx.scanner.health_check_count(), 0);
        assert_eq!(fx.owner_count(), 0);
    }

    #[tokio::test]
    async fn test_last_retry_transitions_to_error() {
        let scanner = MockScanner::new_clean();
        scanner.make_unhealthy();
        let fx = Fixture::new(scanner);
        let id = fx.seed(pending_job().with_retry_count(4)).await;

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(
            disposition,
            Disposition::RetriesExhausted { file_deleted: true }
        );

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Error);
        assert_eq!(job.retry_count, 5);
        assert_eq!(fx.files.delete_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_job_completes() {
        let fx = Fixture::new(MockScanner::new_clean());

        let outcome = fx
            .orchestrator
            .handle(&Delivery::first(JobId::from("does-not-exist")))
            .await;
        assert_eq!(outcome, HandlerOutcome::Completed);
        assert_eq!(fx.scanner.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_terminal_redelivery_is_a_no_op() {
        let fx = Fixture::new(MockScanner::new_infected("Eicar-Test-Signature"));
        let id = fx.seed(pending_job()).await;
        fx.orchestrator.process(&id).await;
        let settled = fx.job(&id).await;

        for _ in 0..3 {
            let disposition = fx.orchestrator.process(&id).await;
            assert_eq!(disposition, Disposition::AlreadyTerminal(ScanState::Infected));
        }

        assert_eq!(fx.job(&id).await, settled);
        assert_eq!(fx.files.delete_count(), 1);
        assert_eq!(fx.owner_count(), 1);
        assert_eq!(fx.scanner.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_clean_and_error_terminal_redelivery() {
        let fx = Fixture::new(MockScanner::new_clean());
        let clean = fx.seed(pending_job().with_state(ScanState::Clean)).await;
        let failed = fx
            .seed(
                ScanJob::new(FileRef::new("b.schem"), owner())
                    .with_state(ScanState::Error)
                    .with_retry_count(5),
            )
            .await;

        assert_eq!(
            fx.orchestrator.process(&clean).await,
            Disposition::AlreadyTerminal(ScanState::Clean)
        );
        assert_eq!(
            fx.orchestrator.process(&failed).await,
            Disposition::AlreadyTerminal(ScanState::Error)
        );
        assert_eq!(fx.jobs.write_count(), 0);
        assert_eq!(fx.files.delete_count(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_infected_deliveries_penalize_once() {
        let fx = Fixture::new(
            MockScanner::new_infected("Eicar-Test-Signature").with_latency(Duration::from_millis(20)),
        );
        let id = fx.seed(pending_job()).await;

        let deliveries = (0..8).map(|_| fx.orchestrator.process(&id));
        let dispositions = futures::future::join_all(deliveries).await;

        let winners = dispositions
            .iter()
            .filter(|d| matches!(d, Disposition::Infected { .. }))
            .count();
        assert_eq!(winners, 1);
        assert!(dispositions
            .iter()
            .all(|d| matches!(d, Disposition::Infected { .. } | Disposition::AlreadyTerminal(_))));
        assert_eq!(fx.owner_count(), 1);
        assert_eq!(fx.files.delete_count(), 1);
        assert_eq!(fx.job(&id).await.state, ScanState::Infected);
    }

    #[tokio::test]
    async fn test_side_effect_failures_do_not_block_infected_state() {
        let fx = Fixture::new(MockScanner::new_infected("Eicar-Test-Signature"));
        let id = fx.seed(pending_job()).await;
        fx.files.set_failing(true);
        fx.ledger.set_failing(true);

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(
            disposition,
            Disposition::Infected {
                signature: Some("Eicar-Test-Signature".to_string()),
                file_deleted: false,
                penalty_recorded: false,
            }
        );
        assert_eq!(fx.job(&id).await.state, ScanState::Infected);
    }

    #[tokio::test]
    async fn test_disabled_scanning_is_skipped_clean() {
        let fx = Fixture::with_client_config(
            MockScanner::new_infected("Eicar-Test-Signature"),
            ScanClientConfig::default().with_enabled(false),
        );
        let id = fx.seed(pending_job()).await;

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(disposition, Disposition::Clean { skipped: true });
        assert!(fx.job(&id).await.last_result.unwrap().skipped);
        assert_eq!(fx.scanner.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_scanning_state_is_reentered() {
        let fx = Fixture::new(MockScanner::new_clean());
        let id = fx.seed(pending_job().with_state(ScanState::Scanning)).await;

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(disposition, Disposition::Clean { skipped: false });
        assert_eq!(fx.scanner.scan_count(), 1);
    }

    #[tokio::test]
    async fn test_missing_upload_is_a_scan_error() {
        let fx = Fixture::new(MockScanner::new_clean());
        let job = pending_job();
        let id = job.id.clone();
        fx.jobs.insert_job(job).await.unwrap();

        let disposition = fx.orchestrator.process(&id).await;
        assert!(matches!(disposition, Disposition::RetryScheduled { .. }));
        assert_eq!(fx.scanner.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_store_requests_redelivery() {
        let fx = Fixture::new(MockScanner::new_clean());
        let id = fx.seed(pending_job()).await;
        fx.jobs.set_unavailable(true);

        let disposition = fx.orchestrator.process(&id).await;
        assert_eq!(
            disposition,
            Disposition::Unrecorded {
                delay: Duration::from_secs(120)
            }
        );
        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Pending);
        assert_eq!(job.retry_count, 0);

        fx.jobs.set_unavailable(false);
        assert_eq!(
            fx.orchestrator.process(&id).await,
            Disposition::Clean { skipped: false }
        );
    }

    /// Fails the first conditional write, then defers to the inner store.
    #[derive(Debug)]
    struct FlakyStore {
        inner: Arc<MemoryJobStore>,
        failed_once: std::sync::atomic::AtomicBool,
    }

    #[async_trait::async_trait]
    impl JobStore for FlakyStore {
        async fn get_job(&self, id: &JobId) -> StoreResult<Option<ScanJob>> {
            self.inner.get_job(id).await
        }

        async fn insert_job(&self, job: ScanJob) -> StoreResult<()> {
            self.inner.insert_job(job).await
        }

        async fn save_job(
            &self,
            id: &JobId,
            expected_version: u64,
            update: JobUpdate,
        ) -> StoreResult<ScanJob> {
            if !self
                .failed_once
                .swap(true, std::sync::atomic::Ordering::SeqCst)
            {
                return Err(StoreError::backend("connection dropped mid-write"));
            }
            self.inner.save_job(id, expected_version, update).await
        }
    }

    fn with_flaky_store(fx: &Fixture) -> ScanOrchestrator {
        ScanOrchestrator::builder()
            .with_job_store(Arc::new(FlakyStore {
                inner: fx.jobs.clone(),
                failed_once: std::sync::atomic::AtomicBool::new(false),
            }))
            .with_file_store(fx.files.clone())
            .with_ledger(fx.ledger.clone())
            .with_client(ScanClient::from_arc(
                ScanClientConfig::default(),
                fx.scanner.clone(),
            ))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_failed_write_schedules_retry() {
        let fx = Fixture::new(MockScanner::new_clean());
        let id = fx.seed(pending_job()).await;
        let orchestrator = with_flaky_store(&fx);

        let disposition = orchestrator.process(&id).await;
        assert_eq!(
            disposition,
            Disposition::RetryScheduled {
                retry_count: 1,
                delay: Duration::from_secs(120),
            }
        );

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Pending);
        assert_eq!(job.retry_count, 1);
        assert_eq!(
            job.last_result.unwrap().outcome,
            Some(ScanOutcome::ScanError)
        );
        assert!(fx.files.contains(&job.file));
        assert_eq!(fx.scanner.scan_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_write_at_ceiling_is_terminal() {
        let fx = Fixture::new(MockScanner::new_clean());
        let id = fx.seed(pending_job().with_retry_count(4)).await;
        let orchestrator = with_flaky_store(&fx);

        let disposition = orchestrator.process(&id).await;
        assert_eq!(
            disposition,
            Disposition::RetriesExhausted { file_deleted: true }
        );

        let job = fx.job(&id).await;
        assert_eq!(job.state, ScanState::Error);
        assert_eq!(job.retry_count, 5);
        assert_eq!(
            job.last_result.unwrap().detail.as_deref(),
            Some(MAX_RETRIES_DETAIL)
        );
        assert!(!fx.files.contains(&job.file));
        assert_eq!(fx.owner_count(), 0);
        assert_eq!(fx.scanner.scan_count(), 0);
    }

    #[test]
    fn test_builder_requires_collaborators() {
        let result = ScanOrchestrator::builder()
            .with_client(ScanClient::new(
                ScanClientConfig::default(),
                MockScanner::new_clean(),
            ))
            .build();
        assert!(matches!(result, Err(ScanError::Configuration { .. })));
    }
}
