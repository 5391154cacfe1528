//! Scan job records and partial updates.

use crate::core::{AccountId, FileRef, JobId, ScanOutcome, ScanState, ScanVerdict};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default ceiling on transient-error retries per job.
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Detail recorded when a job is abandoned after exhausting its retries.
pub const MAX_RETRIES_DETAIL: &str = "max scan retries exceeded, file deleted";

/// The last classification recorded on a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LastResult {
    /// Whether a threat was found.
    pub infected: bool,

    /// Threat signature, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Classification of the attempt; absent for pure bookkeeping entries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ScanOutcome>,

    /// Free-form error or status detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Scanning was disabled when this result was produced.
    #[serde(default)]
    pub skipped: bool,

    /// Engine that produced the result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,

    /// When the result was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl LastResult {
    /// Builds an error entry carrying only a detail message.
    pub fn error(detail: impl Into<String>) -> Self {
        Self {
            infected: false,
            signature: None,
            outcome: Some(ScanOutcome::ScanError),
            detail: Some(detail.into()),
            skipped: false,
            engine: None,
            recorded_at: Utc::now(),
        }
    }

    /// Builds the entry written when retries are exhausted.
    pub fn max_retries_exceeded() -> Self {
        Self {
            outcome: None,
            ..Self::error(MAX_RETRIES_DETAIL)
        }
    }
}

impl From<&ScanVerdict> for LastResult {
    fn from(verdict: &ScanVerdict) -> Self {
        Self {
            infected: verdict.infected,
            signature: verdict.signature.clone(),
            outcome: Some(verdict.outcome),
            detail: verdict.detail.clone(),
            skipped: verdict.skipped,
            engine: Some(verdict.engine.clone()),
            recorded_at: Utc::now(),
        }
    }
}

/// One uploaded file's scan lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanJob {
    /// Stable job identifier.
    pub id: JobId,

    /// The uploaded file.
    pub file: FileRef,

    /// The uploading account.
    pub owner: AccountId,

    /// Current lifecycle state.
    pub state: ScanState,

    /// Transient-error retries consumed so far.
    pub retry_count: u32,

    /// Retry ceiling.
    pub max_retries: u32,

    /// Last recorded classification.
    pub last_result: Option<LastResult>,

    /// Set on the terminal clean/infected transition.
    pub scanned_at: Option<DateTime<Utc>>,

    /// Write counter; bumped by every successful save.
    pub version: u64,

    /// When the job was created.
    pub created_at: DateTime<Utc>,

    /// When the job was last written.
    pub updated_at: DateTime<Utc>,
}

impl ScanJob {
    /// Creates a pending job for an accepted upload.
    pub fn new(file: FileRef, owner: AccountId) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            file,
            owner,
            state: ScanState::Pending,
            retry_count: 0,
            max_retries: DEFAULT_MAX_RETRIES,
            last_result: None,
            scanned_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Uses a fixed id instead of a random one.
    pub fn with_id(mut self, id: impl Into<JobId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the retry ceiling.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the consumed retry count.
    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    /// Sets the state.
    pub fn with_state(mut self, state: ScanState) -> Self {
        self.state = state;
        self
    }

    /// Returns `true` once no further scan attempts will be made.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Returns `true` when the retry ceiling has been reached.
    pub fn retries_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }
}

/// A partial write to a job; unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    /// New state.
    pub state: Option<ScanState>,
    /// New retry count.
    pub retry_count: Option<u32>,
    /// New last result.
    pub last_result: Option<LastResult>,
    /// New scan timestamp.
    pub scanned_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    /// Creates an empty update.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the state.
    pub fn state(mut self, state: ScanState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the retry count.
    pub fn retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    /// Sets the last result.
    pub fn last_result(mut self, result: LastResult) -> Self {
        self.last_result = Some(result);
        self
    }

    /// Sets the scan timestamp.
    pub fn scanned_at(mut self, at: DateTime<Utc>) -> Self {
        self.scanned_at = Some(at);
        self
    }

    /// Names of the fields this update writes.
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::with_capacity(4);
        if self.state.is_some() {
            fields.push("state");
        }
        if self.retry_count.is_some() {
            fields.push("retry_count");
        }
        if self.last_result.is_some() {
            fields.push("last_result");
        }
        if self.scanned_at.is_some() {
            fields.push("scanned_at");
        }
        fields
    }

    /// Applies the update and bumps the version.
    pub fn apply(self, job: &mut ScanJob) {
        if let Some(state) = self.state {
            job.state = state;
        }
        if let Some(retry_count) = self.retry_count {
            job.retry_count = retry_count;
        }
        if let Some(result) = self.last_result {
            job.last_result = Some(result);
        }
        if let Some(at) = self.scanned_at {
            job.scanned_at = Some(at);
        }
        job.version += 1;
        job.updated_at = Utc::now();
    }
}
