//! Audit event types and emission functions.

use crate::job::{LastResult, ScanJob};
use crate::orchestrator::Disposition;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Base trait for audit events.
pub trait AuditEvent: Serialize {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns the timestamp of the event.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Serializes the event as a JSON string.
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"serialize_error\":\"{e}\"}}"))
    }
}

/// Audit event for a job reaching a disposition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispositionAuditEvent {
    /// Timestamp of the event.
    pub timestamp: DateTime<Utc>,

    /// Job id.
    pub job_id: String,

    /// Uploaded file reference.
    pub file: String,

    /// Uploading account.
    pub owner: String,

    /// Disposition label.
    pub disposition: String,

    /// Job state after the disposition.
    pub state: String,

    /// Retries consumed.
    pub retry_count: u32,

    /// Job version after the write.
    pub version: u64,

    /// Last recorded result.
    pub last_result: Option<LastResult>,
}

impl DispositionAuditEvent {
    /// Builds the event from the job as written.
    pub fn new(job: &ScanJob, disposition: &Disposition) -> Self {
        Self {
            timestamp: Utc::now(),
            job_id: job.id.to_string(),
            file: job.file.to_string(),
            owner: job.owner.to_string(),
            disposition: disposition.as_str().to_string(),
            state: job.state.to_string(),
            retry_count: job.retry_count,
            version: job.version,
            last_result: job.last_result.clone(),
        }
    }
}

impl AuditEvent for DispositionAuditEvent {
    fn event_type(&self) -> &'static str {
        "scan_disposition"
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Emits an audit event for a scan attempt starting.
pub fn emit_scan_started(job: &ScanJob) {
    tracing::info!(
        target: "scanflow::audit",
        event_type = "scan_started",
        job_id = %job.id,
        file = %job.file,
        owner = %job.owner,
        retry_count = job.retry_count,
        max_retries = job.max_retries,
        "Scan started"
    );
}

/// Emits an audit event for a disposition.
pub fn emit_disposition(job: &ScanJob, disposition: &Disposition) {
    let event = DispositionAuditEvent::new(job, disposition);
    tracing::info!(
        target: "scanflow::audit",
        event_type = event.event_type(),
        job_id = %event.job_id,
        owner = %event.owner,
        disposition = %event.disposition,
        state = %event.state,
        retry_count = event.retry_count,
        record = %event.to_json(),
        "Scan disposition recorded"
    );
}

/// Emits an audit event for an upload being deleted.
pub fn emit_file_deleted(job: &ScanJob, reason: &str) {
    tracing::info!(
        target: "scanflow::audit",
        event_type = "file_deleted",
        job_id = %job.id,
        file = %job.file,
        owner = %job.owner,
        reason = %reason,
        "Upload deleted"
    );
}

/// Emits an audit event for an infected upload counted against its owner.
pub fn emit_penalty_applied(job: &ScanJob, infected_total: u64) {
    tracing::info!(
        target: "scanflow::audit",
        event_type = "penalty_applied",
        job_id = %job.id,
        owner = %job.owner,
        infected_total,
        "Infected upload recorded against owner"
    );
}

/// Emits an audit event for a retry being scheduled.
pub fn emit_retry_scheduled(job: &ScanJob, delay: Duration) {
    tracing::info!(
        target: "scanflow::audit",
        event_type = "retry_scheduled",
        job_id = %job.id,
        retry_count = job.retry_count,
        max_retries = job.max_retries,
        delay_secs = delay.as_secs(),
        "Scan retry scheduled"
    );
}
