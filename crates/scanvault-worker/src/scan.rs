//! Scan orchestrator
//!
//! Runs one scan for one file: claim the record (`pending -> scanning`), stage the
//! bytes on local disk, scan them under a hard wall-clock limit and write the
//! outcome. The scan body runs in its own task so that a panic inside the scanner
//! or storage still ends with a terminal `error` record instead of a file stuck in
//! `scanning`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use scanvault_core::constants::SCAN_TIMEOUT_DETAIL;
use scanvault_core::{AppError, FileRecord, MissingResource, ScanJob, ScanOutcome, ScanStatus};
use scanvault_db::FileRecordRepository;
use scanvault_services::VirusScanner;
use scanvault_storage::{Storage, StorageError};
use uuid::Uuid;

use crate::context::ScanJobHandler;

const FALLBACK_WRITE_ATTEMPTS: u32 = 3;
const FALLBACK_WRITE_BACKOFF: Duration = Duration::from_millis(50);

/// What a call to [`ScanOrchestrator::run`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanRun {
    /// This call scanned the file and recorded the outcome.
    Scanned(ScanOutcome),
    /// The file already had a terminal outcome; nothing was done.
    AlreadyComplete {
        status: ScanStatus,
        outcome: Option<ScanOutcome>,
    },
    /// Another run owns the scan.
    InProgress,
}

impl ScanRun {
    pub fn outcome(&self) -> Option<&ScanOutcome> {
        match self {
            ScanRun::Scanned(outcome) => Some(outcome),
            ScanRun::AlreadyComplete { outcome, .. } => outcome.as_ref(),
            ScanRun::InProgress => None,
        }
    }
}

#[derive(Clone)]
pub struct ScanOrchestrator {
    records: FileRecordRepository,
    storage: Arc<dyn Storage>,
    scanner: Arc<dyn VirusScanner>,
    time_limit: Duration,
}

impl ScanOrchestrator {
    pub fn new(
        records: FileRecordRepository,
        storage: Arc<dyn Storage>,
        scanner: Arc<dyn VirusScanner>,
        time_limit: Duration,
    ) -> Self {
        Self {
            records,
            storage,
            scanner,
            time_limit,
        }
    }

    /// Scan `file_id` once.
    ///
    /// Safe to call any number of times for the same file: only the call that moves
    /// the record out of `pending` scans it. A missing record is `NotFound`.
    #[tracing::instrument(skip(self), fields(scanner = self.scanner.name()))]
    pub async fn run(&self, file_id: Uuid) -> Result<ScanRun, AppError> {
        let record = match self.records.update(file_id, |r| r.begin_scan()).await {
            Ok(record) => record,
            Err(AppError::InvalidTransition { from, .. }) => {
                return self.already_claimed(file_id, from).await;
            }
            Err(e) => return Err(e),
        };

        tracing::info!(file_id = %file_id, filename = %record.filename, "Scan started");

        let body = tokio::spawn(Self::scan_body(
            self.storage.clone(),
            self.scanner.clone(),
            self.time_limit,
            record,
        ));

        let outcome = match body.await {
            Ok(outcome) => outcome,
            Err(join) if join.is_panic() => {
                tracing::error!(file_id = %file_id, "Scan task panicked");
                ScanOutcome::error("scan task panicked")
            }
            Err(join) => {
                tracing::error!(file_id = %file_id, error = %join, "Scan task cancelled");
                ScanOutcome::error("scan task cancelled")
            }
        };

        self.finalize(file_id, outcome).await
    }

    async fn already_claimed(&self, file_id: Uuid, from: ScanStatus) -> Result<ScanRun, AppError> {
        if !from.is_terminal() {
            tracing::debug!(file_id = %file_id, status = %from, "Scan already in progress");
            return Ok(ScanRun::InProgress);
        }

        let outcome = self
            .records
            .get(file_id)
            .await?
            .and_then(|r| r.scan_result);
        tracing::debug!(file_id = %file_id, status = %from, "Scan already complete");
        Ok(ScanRun::AlreadyComplete {
            status: from,
            outcome,
        })
    }

    /// Stage and scan under one wall-clock limit. Hitting the limit drops the staging
    /// future, which removes any partial scratch copy.
    async fn scan_body(
        storage: Arc<dyn Storage>,
        scanner: Arc<dyn VirusScanner>,
        time_limit: Duration,
        record: FileRecord,
    ) -> ScanOutcome {
        let start = Instant::now();
        let file_id = record.file_id;

        let staged = Self::stage_and_scan(storage.as_ref(), scanner.as_ref(), &record);
        let outcome = match tokio::time::timeout(time_limit, staged).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(
                    file_id = %file_id,
                    limit_secs = time_limit.as_secs_f64(),
                    "Scan exceeded time limit"
                );
                ScanOutcome::error(SCAN_TIMEOUT_DETAIL)
            }
        };

        outcome.with_duration_secs(start.elapsed().as_secs_f64())
    }

    async fn stage_and_scan(
        storage: &dyn Storage,
        scanner: &dyn VirusScanner,
        record: &FileRecord,
    ) -> ScanOutcome {
        let file_id = record.file_id;

        let local = match storage.fetch_to_local(file_id, &record.filename).await {
            Ok(local) => local,
            Err(StorageError::NotFound(location)) => {
                tracing::warn!(file_id = %file_id, location = %location, "Stored bytes missing");
                return ScanOutcome::error(format!(
                    "{} missing for file {}",
                    MissingResource::Bytes,
                    file_id
                ));
            }
            Err(e) => {
                tracing::error!(file_id = %file_id, error = %e, "Failed to stage file for scan");
                return ScanOutcome::error(format!("failed to stage file for scan: {}", e));
            }
        };

        let outcome = scanner.scan(local.path()).await;

        if let Err(e) = local.release() {
            tracing::warn!(file_id = %file_id, error = %e, "Failed to remove scratch file");
        }

        outcome
    }

    /// Write the outcome. If that write fails, retry a bounded number of times with an
    /// `error` outcome so the record still leaves `scanning`.
    async fn finalize(&self, file_id: Uuid, outcome: ScanOutcome) -> Result<ScanRun, AppError> {
        let written = self
            .records
            .update(file_id, |r| r.complete_scan(outcome.clone(), Utc::now()))
            .await;

        let err = match written {
            Ok(record) => {
                tracing::info!(
                    file_id = %file_id,
                    status = %record.status,
                    duration_secs = outcome.duration_secs,
                    threats = ?outcome.threats,
                    "Scan finished"
                );
                return Ok(ScanRun::Scanned(outcome));
            }
            Err(AppError::InvalidTransition { from, .. }) => {
                return self.already_claimed(file_id, from).await;
            }
            Err(e) => e,
        };

        tracing::error!(file_id = %file_id, error = %err, "Failed to record scan outcome");

        let fallback = ScanOutcome::error(format!("failed to record scan outcome: {}", err))
            .with_duration_secs(outcome.duration_secs);

        let mut attempt = 1;
        loop {
            let written = self
                .records
                .update(file_id, |r| r.complete_scan(fallback.clone(), Utc::now()))
                .await;

            match written {
                Ok(_) => return Ok(ScanRun::Scanned(fallback)),
                Err(AppError::InvalidTransition { from, .. }) => {
                    return self.already_claimed(file_id, from).await;
                }
                Err(e) if attempt < FALLBACK_WRITE_ATTEMPTS => {
                    tracing::warn!(
                        file_id = %file_id,
                        attempt,
                        error = %e,
                        "Retrying error outcome write"
                    );
                    tokio::time::sleep(FALLBACK_WRITE_BACKOFF * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!(
                        file_id = %file_id,
                        attempts = attempt,
                        error = %e,
                        "Giving up on error outcome; record left in scanning"
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl ScanJobHandler for ScanOrchestrator {
    async fn handle(&self, job: &ScanJob) -> Result<(), AppError> {
        self.run(job.file_id).await.map(|_| ())
    }
}
