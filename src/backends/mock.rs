//! Mock scanner for testing.
//!
//! Simulates the engine outcomes the orchestrator has to handle (clean,
//! infected, engine failure, unreachable daemon) without a running clamd.

use crate::core::{FileInput, ScanError, ScanVerdict, Scanner};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

/// What the mock reports for every scan.
#[derive(Debug, Clone, PartialEq)]
pub enum MockBehavior {
    /// Report a clean file.
    Clean,
    /// Report an infection with the given signature.
    Infected(String),
    /// Fail the scan with the given message.
    Fail(String),
}

/// A mock scanner for testing purposes.
///
/// # Examples
///
/// ```rust
/// use scanflow::backends::MockScanner;
/// use std::time::Duration;
///
/// let scanner = MockScanner::new_clean();
/// let scanner = MockScanner::new_infected("Eicar-Test-Signature")
///     .with_latency(Duration::from_millis(10));
/// scanner.make_unhealthy();
/// ```
#[derive(Debug)]
pub struct MockScanner {
    name: String,
    behavior: RwLock<MockBehavior>,
    latency: Option<Duration>,
    scan_count: AtomicU64,
    health_checks: AtomicU64,
    unhealthy: AtomicBool,
}

impl MockScanner {
    /// Creates a new mock scanner that reports every file as clean.
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            behavior: RwLock::new(MockBehavior::Clean),
            latency: None,
            scan_count: AtomicU64::new(0),
            health_checks: AtomicU64::new(0),
            unhealthy: AtomicBool::new(false),
        }
    }

    /// Creates a mock scanner that always reports clean.
    pub fn new_clean() -> Self {
        Self::new()
    }

    /// Creates a mock scanner that always reports the given signature.
    pub fn new_infected(signature: impl Into<String>) -> Self {
        Self::new().with_behavior(MockBehavior::Infected(signature.into()))
    }

    /// Creates a mock scanner whose scans always fail.
    pub fn new_failing(message: impl Into<String>) -> Self {
        Self::new().with_behavior(MockBehavior::Fail(message.into()))
    }

    /// Sets the name of this scanner.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the scan behavior.
    pub fn with_behavior(self, behavior: MockBehavior) -> Self {
        self.set_behavior(behavior);
        self
    }

    /// Sets the simulated latency for scans.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Changes the scan behavior in place.
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self
            .behavior
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = behavior;
    }

    /// Returns the number of scans performed.
    pub fn scan_count(&self) -> u64 {
        self.scan_count.load(Ordering::SeqCst)
    }

    /// Returns the number of health checks performed.
    pub fn health_check_count(&self) -> u64 {
        self.health_checks.load(Ordering::SeqCst)
    }

    /// Makes the scanner unhealthy (health checks will fail).
    pub fn make_unhealthy(&self) {
        self.unhealthy.store(true, Ordering::SeqCst);
    }

    /// Makes the scanner healthy again.
    pub fn make_healthy(&self) {
        self.unhealthy.store(false, Ordering::SeqCst);
    }
}

impl Default for MockScanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Scanner for MockScanner {
    fn name(&self) -> &str {
        &self.name
    }

    async fn scan(&self, _input: &FileInput) -> Result<ScanVerdict, ScanError> {
        self.scan_count.fetch_add(1, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        let behavior = self
            .behavior
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();

        match behavior {
            MockBehavior::Clean => Ok(ScanVerdict::clean(&self.name)),
            MockBehavior::Infected(signature) => Ok(ScanVerdict::infected(&self.name, signature)),
            MockBehavior::Fail(message) => Err(ScanError::connection_failed(&self.name, message)),
        }
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        self.health_checks.fetch_add(1, Ordering::SeqCst);

        if self.unhealthy.load(Ordering::SeqCst) {
            return Err(ScanError::engine_unavailable(
                &self.name,
                "mock scanner is unhealthy",
            ));
        }
        Ok(())
    }
}
