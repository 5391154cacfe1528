//! Scans every file in an upload directory through the full pipeline.
//!
//! Run with: `cargo run --example scan_worker -- ./uploads`
//!
//! clamd must be reachable at `CLAMAV_HOST:CLAMAV_PORT` and able to read
//! the upload directory. Set `CLAMAV_ENABLED=false` to run without it.

use scanflow::prelude::*;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config = PipelineConfig::from_env()?;
    let root = std::env::args().nth(1).unwrap_or_else(|| "uploads".to_string());

    tracing::info!(
        root = %root,
        clamav_enabled = config.clamav_enabled,
        clamav_host = %config.clamav_host,
        clamav_port = config.clamav_port,
        "Starting scan worker"
    );

    let jobs = Arc::new(MemoryJobStore::new());
    let files = Arc::new(LocalFileStore::new(&root)?);
    let ledger = Arc::new(MemoryPenaltyLedger::new());

    let orchestrator = ScanOrchestrator::builder()
        .with_job_store(jobs.clone())
        .with_file_store(files.clone())
        .with_ledger(ledger.clone())
        .with_client(ScanClient::clamav(config.scan_client())?)
        .with_config(config.orchestrator())
        .build()?;

    let queue = MemoryJobQueue::start(config.queue(), Arc::new(orchestrator));
    let owner = AccountId::new("demo-user");

    let mut accepted = Vec::new();
    let mut entries = tokio::fs::read_dir(&root).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let id = accept_upload(
            jobs.as_ref(),
            &queue,
            FileRef::new(name.clone()),
            owner.clone(),
            config.max_retries(),
        )
        .await?;
        accepted.push((name, id));
    }

    tracing::info!(count = accepted.len(), "Uploads accepted, waiting for scans");
    queue.wait_idle().await;

    for (name, id) in &accepted {
        if let Some(job) = jobs.get_job(id).await? {
            println!(
                "{name}: {} (retries: {}, downloadable: {})",
                job.state,
                job.retry_count,
                job.state.is_downloadable()
            );
        }
    }
    println!(
        "infected uploads for {owner}: {}",
        ledger.infected_count(&owner).await?
    );

    queue.shutdown().await;
    Ok(())
}
