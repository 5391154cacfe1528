//! Core types used throughout the scanflow crate.
//!
//! This module defines the identifiers shared by the pipeline, the closed
//! set of scan job states, and the classification a scan attempt produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identifier of a scan job, stable for the lifetime of the uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Creates a new random job id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Reference to an uploaded file held by the file store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileRef(pub String);

impl FileRef {
    /// Creates a file reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Returns the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to the account that uploaded a file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    /// Creates an account reference.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a scan job.
///
/// `Clean`, `Infected` and `Error` are terminal: once a job reaches one of
/// them no further scan attempts are made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    /// Waiting for a (re)delivery.
    Pending,
    /// A delivery is currently scanning the file, or crashed while doing so.
    Scanning,
    /// No threat found.
    Clean,
    /// A threat was found; the file has been deleted.
    Infected,
    /// Retries exhausted; the file has been deleted.
    Error,
}

impl ScanState {
    /// Returns `true` for states that end the job's lifecycle.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Pending | Self::Scanning => false,
            Self::Clean | Self::Infected | Self::Error => true,
        }
    }

    /// Returns `true` if the file may be served for download.
    pub fn is_downloadable(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns `true` if the file may appear in its owner's listings.
    pub fn is_listable(&self) -> bool {
        !matches!(self, Self::Infected)
    }

    /// Returns `true` if the file may appear in public listings.
    pub fn is_publicly_visible(&self) -> bool {
        matches!(self, Self::Clean)
    }

    /// Returns the persisted name of the state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Scanning => "scanning",
            Self::Clean => "clean",
            Self::Infected => "infected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ScanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a single scan attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanOutcome {
    /// No threat was found (or scanning was skipped).
    Clean,
    /// A threat was found.
    Infected,
    /// The scan could not be completed.
    ScanError,
}

impl fmt::Display for ScanOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Infected => write!(f, "infected"),
            Self::ScanError => write!(f, "scan_error"),
        }
    }
}

/// The full result of one scan attempt.
///
/// A verdict with `skipped == true` was produced without consulting a
/// scanning engine and carries no security meaning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanVerdict {
    /// The classification.
    pub outcome: ScanOutcome,

    /// Whether a threat was found.
    pub infected: bool,

    /// Threat signature name reported by the engine.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// Free-form detail, set for errors and skipped scans.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,

    /// Scanning was administratively disabled.
    #[serde(default)]
    pub skipped: bool,

    /// Name of the engine that produced the verdict.
    pub engine: String,

    /// How long the attempt took, in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
}

impl ScanVerdict {
    /// Creates a clean verdict.
    pub fn clean(engine: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::Clean,
            infected: false,
            signature: None,
            detail: None,
            skipped: false,
            engine: engine.into(),
            duration_ms: 0,
        }
    }

    /// Creates an infected verdict carrying the engine's signature name.
    pub fn infected(engine: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::Infected,
            infected: true,
            signature: Some(signature.into()),
            ..Self::clean(engine)
        }
    }

    /// Creates a failed verdict with the error detail.
    pub fn scan_error(engine: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            outcome: ScanOutcome::ScanError,
            detail: Some(detail.into()),
            ..Self::clean(engine)
        }
    }

    /// Creates the verdict returned when scanning is disabled.
    pub fn skipped() -> Self {
        Self {
            detail: Some("scanning disabled".to_string()),
            skipped: true,
            ..Self::clean("disabled")
        }
    }

    /// Records how long the attempt took.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = duration.as_millis() as u64;
        self
    }

    /// Returns `true` if the verdict is clean.
    pub fn is_clean(&self) -> bool {
        self.outcome == ScanOutcome::Clean
    }

    /// Returns `true` if the verdict is infected.
    pub fn is_infected(&self) -> bool {
        self.outcome == ScanOutcome::Infected
    }

    /// Returns `true` if the attempt failed.
    pub fn is_error(&self) -> bool {
        self.outcome == ScanOutcome::ScanError
    }
}
