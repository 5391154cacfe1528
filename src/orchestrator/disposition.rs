//! What the orchestrator decided for one delivery.

use crate::core::ScanState;
use crate::job::MAX_RETRIES_DETAIL;
use crate::queue::HandlerOutcome;

use std::time::Duration;

/// The action taken after interpreting one delivery of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The file scanned clean (or scanning is disabled).
    Clean {
        /// Scanning was disabled; not a security signal.
        skipped: bool,
    },

    /// A threat was found and this delivery won the terminal write.
    Infected {
        /// Threat signature reported by the engine.
        signature: Option<String>,
        /// The file delete succeeded.
        file_deleted: bool,
        /// The owner's counter was incremented.
        penalty_recorded: bool,
    },

    /// A transient failure; the job is back to pending.
    RetryScheduled {
        /// Retries consumed, including this one.
        retry_count: u32,
        /// Delay before the next delivery.
        delay: Duration,
    },

    /// The retry ceiling was reached; the job is in terminal error.
    RetriesExhausted {
        /// The file delete succeeded.
        file_deleted: bool,
    },

    /// The job was already terminal; nothing was done.
    AlreadyTerminal(ScanState),

    /// No job exists under the delivered id.
    NotFound,

    /// Bookkeeping failed; the job record could not be updated.
    Unrecorded {
        /// Delay before the queue should try again.
        delay: Duration,
    },
}

impl Disposition {
    /// Returns `true` if this delivery performed a terminal transition.
    pub fn is_terminal_transition(&self) -> bool {
        matches!(
            self,
            Self::Clean { .. } | Self::Infected { .. } | Self::RetriesExhausted { .. }
        )
    }

    /// Short label for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean { .. } => "clean",
            Self::Infected { .. } => "infected",
            Self::RetryScheduled { .. } => "retry_scheduled",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::AlreadyTerminal(_) => "already_terminal",
            Self::NotFound => "not_found",
            Self::Unrecorded { .. } => "unrecorded",
        }
    }

    /// Translates the disposition into the queue's control signal.
    pub fn handler_outcome(&self) -> HandlerOutcome {
        match self {
            Self::Clean { .. }
            | Self::Infected { .. }
            | Self::AlreadyTerminal(_)
            | Self::NotFound => HandlerOutcome::Completed,
            Self::RetryScheduled { delay, .. } | Self::Unrecorded { delay } => {
                HandlerOutcome::RetryAfter(*delay)
            }
            Self::RetriesExhausted { .. } => HandlerOutcome::FailedTerminal {
                reason: MAX_RETRIES_DETAIL.to_string(),
            },
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_retries_cross_as_retry_after() {
        let retry = Disposition::RetryScheduled {
            retry_count: 1,
            delay: Duration::from_secs(120),
        };
        assert_eq!(
            retry.handler_outcome(),
            HandlerOutcome::RetryAfter(Duration::from_secs(120))
        );

        assert_eq!(Disposition::NotFound.handler_outcome(), HandlerOutcome::Completed);
        assert_eq!(
            Disposition::AlreadyTerminal(ScanState::Infected).handler_outcome(),
            HandlerOutcome::Completed
        );
        assert!(matches!(
            Disposition::RetriesExhausted { file_deleted: true }.handler_outcome(),
            HandlerOutcome::FailedTerminal { .. }
        ));
    }

    #[test]
    fn test_terminal_transition() {
        assert!(Disposition::Clean { skipped: false }.is_terminal_transition());
        assert!(!Disposition::AlreadyTerminal(ScanState::Clean).is_terminal_transition());
        assert!(!Disposition::NotFound.is_terminal_transition());
    }
}
