//! Account penalty ledger collaborator.
//!
//! Counts confirmed infected uploads per account for downstream moderation.
//! The orchestrator calls [`PenaltyLedger::increment_infected_count`] at most
//! once per job: only the delivery that wins the transition to `infected`
//! reaches it.

use crate::core::{AccountId, LedgerError};

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// Per-account counter of infected uploads.
#[async_trait]
pub trait PenaltyLedger: Send + Sync + Debug {
    /// Atomically increments the account's counter and returns the new value.
    ///
    /// Must be safe to call concurrently for the same account.
    async fn increment_infected_count(&self, account: &AccountId) -> Result<u64, LedgerError>;

    /// Returns the account's current counter.
    async fn infected_count(&self, account: &AccountId) -> Result<u64, LedgerError>;
}

/// A process-local [`PenaltyLedger`].
#[derive(Debug, Default)]
pub struct MemoryPenaltyLedger {
    counts: Mutex<HashMap<AccountId, u64>>,
    failing: AtomicBool,
}

impl MemoryPenaltyLedger {
    /// Creates an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the counter without going through the async trait.
    pub fn count(&self, account: &AccountId) -> u64 {
        self.counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(account)
            .copied()
            .unwrap_or(0)
    }

    /// While set, every increment fails.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PenaltyLedger for MemoryPenaltyLedger {
    async fn increment_infected_count(&self, account: &AccountId) -> Result<u64, LedgerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(LedgerError::Backend {
                message: "ledger unavailable".to_string(),
            });
        }

        let mut counts = self
            .counts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let count = counts.entry(account.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn infected_count(&self, account: &AccountId) -> Result<u64, LedgerError> {
        Ok(self.count(account))
    }
}
