//! In-process job queue backed by tokio tasks.

use crate::core::{JobId, QueueError};
use crate::queue::traits::{Delivery, HandlerOutcome, JobHandler, JobQueue};

use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinHandle;

/// Configuration for [`MemoryJobQueue`].
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Maximum number of deliveries handled concurrently.
    pub max_workers: usize,

    /// Deliveries of one job before it is dead-lettered.
    ///
    /// Must stay above the jobs' retry ceiling, otherwise a job is dropped
    /// while still `pending`.
    pub max_attempts: u32,

    /// Redelivery delay after a handler panics.
    pub panic_retry_delay: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_attempts: Self::attempts_for(crate::job::DEFAULT_MAX_RETRIES),
            panic_retry_delay: Duration::from_secs(60),
        }
    }
}

impl QueueConfig {
    /// Creates a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivery ceiling for jobs allowed `max_retries` scan retries.
    ///
    /// Every scan retry costs one delivery, and deliveries whose outcome
    /// could not be recorded cost one more without consuming a retry, so
    /// the ceiling is twice the deliveries a job needs to reach `error`.
    pub fn attempts_for(max_retries: u32) -> u32 {
        max_retries.saturating_add(1).saturating_mul(2)
    }

    /// Sets the worker count.
    pub fn with_max_workers(mut self, workers: usize) -> Self {
        self.max_workers = workers.max(1);
        self
    }

    /// Sets the delivery attempt ceiling.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the redelivery delay used after a handler panic.
    pub fn with_panic_retry_delay(mut self, delay: Duration) -> Self {
        self.panic_retry_delay = delay;
        self
    }
}

/// Snapshot of queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Jobs accepted through `enqueue` or `enqueue_after`.
    pub enqueued: u64,
    /// Handler invocations.
    pub delivered: u64,
    /// Deliveries that completed.
    pub completed: u64,
    /// Redeliveries scheduled after `RetryAfter`.
    pub retried: u64,
    /// Deliveries that failed terminally.
    pub failed: u64,
    /// Jobs dropped after reaching the attempt ceiling.
    pub dead_lettered: u64,
    /// Jobs not yet settled, including those waiting for redelivery.
    pub outstanding: u64,
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    delivered: AtomicU64,
    completed: AtomicU64,
    retried: AtomicU64,
    failed: AtomicU64,
    dead_lettered: AtomicU64,
    outstanding: AtomicU64,
}

#[derive(Debug)]
struct Shared {
    config: QueueConfig,
    sender: mpsc::UnboundedSender<Delivery>,
    counters: Counters,
    closed: AtomicBool,
}

impl Shared {
    fn settle(&self) {
        self.counters
            .outstanding
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |val| {
                Some(val.saturating_sub(1))
            })
            .ok();
    }

    fn schedule(&self, delivery: Delivery, delay: Duration) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if sender.send(delivery).is_err() {
                tracing::debug!("Job queue stopped before redelivery");
            }
        });
    }

    async fn deliver(&self, handler: &dyn JobHandler, delivery: Delivery) {
        self.counters.delivered.fetch_add(1, Ordering::SeqCst);
        let outcome = match AssertUnwindSafe(handler.handle(&delivery))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!(
                    job_id = %delivery.job_id,
                    attempt = delivery.attempt,
                    "Job handler panicked, scheduling redelivery"
                );
                HandlerOutcome::RetryAfter(self.config.panic_retry_delay)
            }
        };

        match outcome {
            HandlerOutcome::Completed => {
                self.counters.completed.fetch_add(1, Ordering::SeqCst);
                self.settle();
            }
            HandlerOutcome::FailedTerminal { reason } => {
                tracing::warn!(
                    job_id = %delivery.job_id,
                    attempt = delivery.attempt,
                    reason = %reason,
                    "Job failed terminally"
                );
                self.counters.failed.fetch_add(1, Ordering::SeqCst);
                self.settle();
            }
            HandlerOutcome::RetryAfter(_) if delivery.attempt >= self.config.max_attempts => {
                tracing::error!(
                    job_id = %delivery.job_id,
                    attempt = delivery.attempt,
                    max_attempts = self.config.max_attempts,
                    "Job exceeded delivery attempts, dead-lettering"
                );
                self.counters.dead_lettered.fetch_add(1, Ordering::SeqCst);
                self.settle();
            }
            HandlerOutcome::RetryAfter(delay) => {
                tracing::debug!(
                    job_id = %delivery.job_id,
                    attempt = delivery.attempt,
                    delay_secs = delay.as_secs(),
                    "Scheduling redelivery"
                );
                self.counters.retried.fetch_add(1, Ordering::SeqCst);
                self.schedule(delivery.next(), delay);
            }
        }
    }
}

/// An at-least-once [`JobQueue`] running deliveries on a bounded worker pool.
///
/// Delayed deliveries are held by sleeping tasks, so nothing survives a
/// process restart. Jobs that keep asking for a retry are dropped after
/// [`QueueConfig::max_attempts`] deliveries.
#[derive(Debug)]
pub struct MemoryJobQueue {
    shared: Arc<Shared>,
    shutdown: watch::Sender<bool>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl MemoryJobQueue {
    /// Starts the queue and its dispatcher task.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: QueueConfig, handler: Arc<dyn JobHandler>) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            config,
            sender,
            counters: Counters::default(),
            closed: AtomicBool::new(false),
        });

        let dispatcher = tokio::spawn(dispatch(
            Arc::clone(&shared),
            handler,
            receiver,
            shutdown_rx,
        ));

        tracing::info!(
            max_workers = shared.config.max_workers,
            max_attempts = shared.config.max_attempts,
            "Job queue started"
        );

        Self {
            shared,
            shutdown,
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Returns the queue configuration.
    pub fn config(&self) -> &QueueConfig {
        &self.shared.config
    }

    /// Returns a snapshot of the queue counters.
    pub fn stats(&self) -> QueueStats {
        let c = &self.shared.counters;
        QueueStats {
            enqueued: c.enqueued.load(Ordering::SeqCst),
            delivered: c.delivered.load(Ordering::SeqCst),
            completed: c.completed.load(Ordering::SeqCst),
            retried: c.retried.load(Ordering::SeqCst),
            failed: c.failed.load(Ordering::SeqCst),
            dead_lettered: c.dead_lettered.load(Ordering::SeqCst),
            outstanding: c.outstanding.load(Ordering::SeqCst),
        }
    }

    /// Returns `true` once the queue has been shut down.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// Waits until every accepted job has settled.
    pub async fn wait_idle(&self) {
        while self.shared.counters.outstanding.load(Ordering::SeqCst) > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Stops accepting jobs and stops the dispatcher.
    ///
    /// Deliveries already running are allowed to finish.
    pub async fn shutdown(&self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        self.shutdown.send_replace(true);

        let dispatcher = self
            .dispatcher
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                tracing::error!(error = %e, "Job queue dispatcher panicked");
            }
        }
        tracing::info!("Job queue stopped");
    }

    fn accept(&self) -> Result<(), QueueError> {
        if self.is_closed() {
            return Err(QueueError::Closed);
        }
        self.shared.counters.enqueued.fetch_add(1, Ordering::SeqCst);
        self.shared
            .counters
            .outstanding
            .fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[async_trait]
impl JobQueue for MemoryJobQueue {
    async fn enqueue(&self, job_id: JobId) -> Result<(), QueueError> {
        self.accept()?;
        tracing::debug!(job_id = %job_id, "Job enqueued");
        self.shared.sender.send(Delivery::first(job_id)).map_err(|_| {
            self.shared.settle();
            QueueError::Closed
        })
    }

    async fn enqueue_after(&self, job_id: JobId, delay: Duration) -> Result<(), QueueError> {
        self.accept()?;
        tracing::debug!(job_id = %job_id, delay_secs = delay.as_secs(), "Job enqueued with delay");
        self.shared.schedule(Delivery::first(job_id), delay);
        Ok(())
    }
}

async fn dispatch(
    shared: Arc<Shared>,
    handler: Arc<dyn JobHandler>,
    mut receiver: mpsc::UnboundedReceiver<Delivery>,
    mut shutdown: watch::Receiver<bool>,
) {
    let workers = Arc::new(Semaphore::new(shared.config.max_workers));

    loop {
        let delivery = tokio::select! {
            _ = shutdown.changed() => break,
            delivery = receiver.recv() => match delivery {
                Some(delivery) => delivery,
                None => break,
            },
        };

        let permit = tokio::select! {
            _ = shutdown.changed() => break,
            permit = Arc::clone(&workers).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let shared = Arc::clone(&shared);
        let handler = Arc::clone(&handler);
        tokio::spawn(async move {
            let _permit = permit;
            shared.deliver(handler.as_ref(), delivery).await;
        });
    }

    tracing::debug!("Job queue dispatcher exiting");
}
