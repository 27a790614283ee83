//! Service initialization and application state setup

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use scanvault_core::constants::SCRATCH_MAX_AGE_SECS;
use scanvault_core::Config;
use scanvault_db::{create_kv_store, FileRecordRepository};
use scanvault_services::{
    create_storage, ClamAVService, DownloadTokenService, FileService, VirusScanner,
};
use scanvault_storage::ScratchDir;
use scanvault_worker::{ScanOrchestrator, ScratchSweeper, TaskQueue, TaskQueueConfig};

use crate::constants::SCRATCH_SWEEP_INTERVAL_SECS;
use crate::state::AppState;

/// Tasks that outlive request handling and must be stopped on shutdown.
pub struct BackgroundServices {
    queue: TaskQueue,
    sweeper: Option<ScratchSweeper>,
}

impl BackgroundServices {
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
        if let Some(sweeper) = self.sweeper {
            sweeper.shutdown().await;
        }
        tracing::info!("Background services stopped");
    }
}

/// Initialize all services, returning the application state and background tasks
pub async fn initialize_services(config: &Config) -> Result<(Arc<AppState>, BackgroundServices)> {
    let kv = create_kv_store(config)
        .await
        .context("Failed to connect to the record store")?;
    tracing::info!(backend = kv.backend_name(), "Record store ready");
    let records = FileRecordRepository::new(kv.clone(), config.record_ttl());

    let storage = create_storage(config)
        .await
        .context("Failed to initialize storage")?;
    tracing::info!(backend = %storage.backend_type(), "Storage ready");

    let clamav = ClamAVService::from_config(config);
    if clamav.probe().await {
        tracing::info!(endpoints = ?clamav.endpoints(), "ClamAV reachable");
    } else {
        // Uploads are still accepted; their scans end in `error` until clamd is back.
        tracing::warn!(endpoints = ?clamav.endpoints(), "ClamAV not reachable at startup");
    }
    let scanner: Arc<dyn VirusScanner> = Arc::new(clamav);

    let orchestrator = Arc::new(ScanOrchestrator::new(
        records.clone(),
        storage.clone(),
        scanner.clone(),
        config.scan_time_limit(),
    ));
    let queue_config = TaskQueueConfig::from_config(config);
    tracing::info!(
        max_workers = queue_config.max_workers,
        max_retries = queue_config.max_retries,
        "Starting scan queue"
    );
    let queue = TaskQueue::new(orchestrator, queue_config, None);

    let tokens = DownloadTokenService::new(&config.download_token_secret)
        .context("Invalid download token secret")?;

    let files = FileService::new(
        records,
        storage,
        Arc::new(queue.clone()),
        tokens,
        config,
    );

    let sweeper = if config.storage_backend.is_remote() {
        let scratch = ScratchDir::new(&config.scratch_dir)
            .context("Failed to prepare scratch directory")?;
        let max_age = Duration::from_secs(SCRATCH_MAX_AGE_SECS)
            .max(config.scan_time_limit().saturating_mul(2));
        Some(ScratchSweeper::start(
            scratch,
            Duration::from_secs(SCRATCH_SWEEP_INTERVAL_SECS),
            max_age,
        ))
    } else {
        None
    };

    let state = AppState::new(files, kv, scanner);

    Ok((state, BackgroundServices { queue, sweeper }))
}
