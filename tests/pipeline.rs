//! End-to-end tests driving the queue and orchestrator together.

use async_trait::async_trait;
use scanflow::core::{FileInput, ScanError, ScanVerdict, Scanner};
use scanflow::prelude::*;
use std::sync::Arc;
use std::time::Duration;

/// Classifies uploads by name, the way a test double for clamd would.
#[derive(Debug)]
struct NameScanner;

#[async_trait]
impl Scanner for NameScanner {
    fn name(&self) -> &str {
        "name-scanner"
    }

    async fn scan(&self, input: &FileInput) -> Result<ScanVerdict, ScanError> {
        let name = input.filename().unwrap_or_default();
        if name.contains("eicar") {
            Ok(ScanVerdict::infected(self.name(), "Eicar-Test-Signature"))
        } else if name.contains("broken") {
            Err(ScanError::connection_failed(self.name(), "connection reset"))
        } else {
            Ok(ScanVerdict::clean(self.name()))
        }
    }

    async fn health_check(&self) -> Result<(), ScanError> {
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_pipeline_settles_every_upload() {
    let jobs = Arc::new(MemoryJobStore::new());
    let files = Arc::new(MemoryFileStore::new());
    let ledger = Arc::new(MemoryPenaltyLedger::new());

    let orchestrator = ScanOrchestrator::builder()
        .with_job_store(jobs.clone())
        .with_file_store(files.clone())
        .with_ledger(ledger.clone())
        .with_client(ScanClient::new(ScanClientConfig::default(), NameScanner))
        .build()
        .unwrap();
    let queue = MemoryJobQueue::start(QueueConfig::default(), Arc::new(orchestrator));

    let owner = AccountId::new("user-1");
    let mut ids = Vec::new();
    for name in ["castle.schem", "eicar.schem", "broken.schem"] {
        files.put(FileRef::new(name), b"schematic".to_vec());
        let id = accept_upload(jobs.as_ref(), &queue, FileRef::new(name), owner.clone(), 5)
            .await
            .unwrap();
        ids.push(id);
    }

    let started = tokio::time::Instant::now();
    queue.wait_idle().await;

    let clean = jobs.get_job(&ids[0]).await.unwrap().unwrap();
    assert_eq!(clean.state, ScanState::Clean);
    assert!(clean.state.is_downloadable());
    assert!(files.contains(&clean.file));

    let infected = jobs.get_job(&ids[1]).await.unwrap().unwrap();
    assert_eq!(infected.state, ScanState::Infected);
    assert!(!infected.state.is_listable());
    assert!(!files.contains(&infected.file));

    let failed = jobs.get_job(&ids[2]).await.unwrap().unwrap();
    assert_eq!(failed.state, ScanState::Error);
    assert_eq!(failed.retry_count, 5);
    assert!(!files.contains(&failed.file));

    assert_eq!(ledger.count(&owner), 1);

    // 120s + 240s + 480s + 900s between the five failing deliveries.
    assert!(started.elapsed() >= Duration::from_secs(1740));

    let stats = queue.stats();
    assert_eq!(stats.enqueued, 3);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.retried, 4);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_raised_retry_ceiling_reaches_error() {
    let config = PipelineConfig::from_vars(vec![(
        "SCAN_MAX_RETRIES".to_string(),
        "8".to_string(),
    )])
    .unwrap();

    let jobs = Arc::new(MemoryJobStore::new());
    let files = Arc::new(MemoryFileStore::new());
    let orchestrator = ScanOrchestrator::builder()
        .with_job_store(jobs.clone())
        .with_file_store(files.clone())
        .with_ledger(Arc::new(MemoryPenaltyLedger::new()))
        .with_client(ScanClient::new(config.scan_client(), NameScanner))
        .with_config(config.orchestrator())
        .build()
        .unwrap();
    let queue = MemoryJobQueue::start(config.queue(), Arc::new(orchestrator));

    let file = FileRef::new("broken.schem");
    files.put(file.clone(), b"schematic".to_vec());
    let id = accept_upload(
        jobs.as_ref(),
        &queue,
        file.clone(),
        AccountId::new("user-1"),
        config.max_retries(),
    )
    .await
    .unwrap();
    queue.wait_idle().await;

    let job = jobs.get_job(&id).await.unwrap().unwrap();
    assert_eq!(job.state, ScanState::Error);
    assert_eq!(job.retry_count, 8);
    assert!(!files.contains(&file));

    let stats = queue.stats();
    assert_eq!(stats.delivered, 8);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.dead_lettered, 0);
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_deliveries_penalize_once() {
    let jobs = Arc::new(MemoryJobStore::new());
    let files = Arc::new(MemoryFileStore::new());
    let ledger = Arc::new(MemoryPenaltyLedger::new());

    let orchestrator = ScanOrchestrator::builder()
        .with_job_store(jobs.clone())
        .with_file_store(files.clone())
        .with_ledger(ledger.clone())
        .with_client(ScanClient::new(ScanClientConfig::default(), NameScanner))
        .build()
        .unwrap();
    let queue = MemoryJobQueue::start(QueueConfig::default(), Arc::new(orchestrator));

    let owner = AccountId::new("user-1");
    let file = FileRef::new("eicar.schem");
    files.put(file.clone(), b"X5O!P%@AP".to_vec());
    let id = accept_upload(jobs.as_ref(), &queue, file, owner.clone(), 5)
        .await
        .unwrap();

    // At-least-once delivery: the same job arrives several more times.
    for _ in 0..3 {
        queue.enqueue(id.clone()).await.unwrap();
    }
    queue.wait_idle().await;

    assert_eq!(ledger.count(&owner), 1);
    assert_eq!(files.delete_count(), 1);
    assert_eq!(queue.stats().completed, 4);
}

#[cfg(feature = "clamav")]
mod clamd {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_command(socket: &mut TcpStream) -> String {
        let mut command = Vec::new();
        let mut byte = [0u8; 1];
        while socket.read_exact(&mut byte).await.is_ok() {
            if byte[0] == 0 {
                break;
            }
            command.push(byte[0]);
        }
        String::from_utf8_lossy(&command).into_owned()
    }

    /// Answers `zPING` and reports every `zSCAN` path as infected.
    async fn spawn_infected_clamd() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let command = read_command(&mut socket).await;
                    let reply = match command.strip_prefix("zSCAN ") {
                        Some(path) => format!("{path}: Eicar-Test-Signature FOUND"),
                        None if command == "zPING" => "PONG".to_string(),
                        None => "UNKNOWN COMMAND".to_string(),
                    };
                    socket.write_all(reply.as_bytes()).await.unwrap();
                    socket.write_all(b"\0").await.unwrap();
                    let _ = socket.shutdown().await;
                });
            }
        });

        port
    }

    #[tokio::test]
    async fn test_clamd_infected_upload_on_disk() {
        let port = spawn_infected_clamd().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eicar.schem"), b"X5O!P%@AP").unwrap();

        let jobs = Arc::new(MemoryJobStore::new());
        let files = Arc::new(LocalFileStore::new(dir.path()).unwrap());
        let ledger = Arc::new(MemoryPenaltyLedger::new());
        let client = ScanClient::clamav(
            ScanClientConfig::default()
                .with_address("127.0.0.1", port)
                .with_connection_timeout(Duration::from_secs(2))
                .with_scan_timeout(Duration::from_secs(5)),
        )
        .unwrap();

        let orchestrator = ScanOrchestrator::builder()
            .with_job_store(jobs.clone())
            .with_file_store(files.clone())
            .with_ledger(ledger.clone())
            .with_client(client)
            .build()
            .unwrap();

        let owner = AccountId::new("user-1");
        let job = ScanJob::new(FileRef::new("eicar.schem"), owner.clone());
        let id = job.id.clone();
        jobs.insert_job(job).await.unwrap();

        let disposition = orchestrator.process(&id).await;
        assert!(matches!(disposition, Disposition::Infected { file_deleted: true, .. }));

        let job = jobs.get_job(&id).await.unwrap().unwrap();
        assert_eq!(
            job.last_result.unwrap().signature.as_deref(),
            Some("Eicar-Test-Signature")
        );
        assert!(!dir.path().join("eicar.schem").exists());
        assert_eq!(ledger.count(&owner), 1);
    }
}
