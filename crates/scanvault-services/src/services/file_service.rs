//! File lifecycle service
//!
//! Owns every operation that touches both the record store and storage: accepting
//! uploads, reporting status, gating and redeeming download links, deleting and
//! listing. Handlers stay thin and the whole flow is testable without HTTP.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use scanvault_core::constants::MAX_LIST_LIMIT;
use scanvault_core::{
    AppError, Config, FileRecord, ScanJob, ScanScheduler, ScanStatus, UploadValidator,
};
use scanvault_db::FileRecordRepository;
use scanvault_storage::{Storage, StorageError, StorageStream};
use uuid::Uuid;

use super::token::DownloadTokenService;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// An upload as received from the client.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct DownloadLink {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub record: FileRecord,
}

/// How a redeemed token is served.
pub enum Redemption {
    /// The backend issued a temporary URL; the client should follow it.
    Redirect { url: String, record: FileRecord },
    /// The bytes are streamed through this service.
    Stream {
        record: FileRecord,
        stream: StorageStream,
    },
}

impl Redemption {
    pub fn record(&self) -> &FileRecord {
        match self {
            Redemption::Redirect { record, .. } | Redemption::Stream { record, .. } => record,
        }
    }

    fn record_mut(&mut self) -> &mut FileRecord {
        match self {
            Redemption::Redirect { record, .. } | Redemption::Stream { record, .. } => record,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteReport {
    pub file_id: Uuid,
    pub bytes_deleted: bool,
    pub record_deleted: bool,
}

/// Only `clean` files may be handed out.
fn ensure_downloadable(record: &FileRecord) -> Result<(), AppError> {
    match record.status {
        ScanStatus::Clean => Ok(()),
        ScanStatus::Infected => Err(AppError::Forbidden(
            "File contains viruses and cannot be downloaded".to_string(),
        )),
        ScanStatus::Pending | ScanStatus::Scanning => Err(AppError::Pending {
            file_id: record.file_id,
            status: record.status,
        }),
        ScanStatus::Error => Err(AppError::ScanError {
            file_id: record.file_id,
            detail: record
                .scan_result
                .as_ref()
                .and_then(|outcome| outcome.error_detail.clone()),
        }),
    }
}

fn bytes_error(file_id: Uuid, err: StorageError) -> AppError {
    match err {
        StorageError::NotFound(_) => AppError::bytes_not_found(file_id),
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct FileService {
    records: FileRecordRepository,
    storage: Arc<dyn Storage>,
    scheduler: Arc<dyn ScanScheduler>,
    tokens: DownloadTokenService,
    validator: UploadValidator,
    link_ttl: Duration,
    presigned_ttl: Duration,
}

impl FileService {
    pub fn new(
        records: FileRecordRepository,
        storage: Arc<dyn Storage>,
        scheduler: Arc<dyn ScanScheduler>,
        tokens: DownloadTokenService,
        config: &Config,
    ) -> Self {
        Self {
            records,
            storage,
            scheduler,
            tokens,
            validator: UploadValidator::new(
                config.max_file_size_bytes,
                config.allowed_extensions.clone(),
            ),
            link_ttl: config.download_link_ttl(),
            presigned_ttl: config.presigned_url_ttl(),
        }
    }

    pub fn records(&self) -> &FileRecordRepository {
        &self.records
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn validator(&self) -> &UploadValidator {
        &self.validator
    }

    async fn load(&self, file_id: Uuid) -> Result<FileRecord, AppError> {
        self.records
            .get(file_id)
            .await?
            .ok_or_else(|| AppError::record_not_found(file_id))
    }

    /// Accept an upload: validate, store the bytes, create the `pending` record and
    /// hand the file to the scan scheduler.
    ///
    /// Nothing is written when validation fails. If a later step fails, whatever was
    /// already written is removed again before the error is returned.
    #[tracing::instrument(skip(self, request), fields(filename = %request.filename, size = request.data.len()))]
    pub async fn upload(&self, request: UploadRequest) -> Result<FileRecord, AppError> {
        let size = request.data.len() as u64;
        self.validator.validate(&request.filename, size)?;

        let file_id = Uuid::new_v4();
        let content_type = request
            .content_type
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let location = self
            .storage
            .put(request.data, file_id, &request.filename)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, file_id = %file_id, "Failed to store upload");
                AppError::from(e)
            })?;

        let mut record =
            FileRecord::new_pending(file_id, &request.filename, size, content_type, location);

        if let Err(e) = self.records.create(&record).await {
            tracing::error!(error = %e, file_id = %file_id, "Failed to create file record");
            self.discard_bytes(file_id, &request.filename).await;
            return Err(e);
        }

        let job = ScanJob {
            file_id,
            filename: request.filename.clone(),
            hint: Some(record.content_type.clone()),
        };
        let handle = match self.scheduler.submit(job).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(error = %e, file_id = %file_id, "Failed to schedule scan");
                if let Err(cleanup) = self.records.delete(file_id).await {
                    tracing::warn!(error = %cleanup, file_id = %file_id, "Failed to remove file record");
                }
                self.discard_bytes(file_id, &request.filename).await;
                return Err(e);
            }
        };

        // The scan may already have moved the record on; only the task id is touched.
        match self
            .records
            .update(file_id, |r| {
                r.task_id = Some(handle.task_id);
                Ok(())
            })
            .await
        {
            Ok(updated) => record = updated,
            Err(e) => {
                tracing::warn!(error = %e, file_id = %file_id, "Failed to store scan task id");
                record.task_id = Some(handle.task_id);
            }
        }

        tracing::info!(
            file_id = %file_id,
            task_id = %handle.task_id,
            size_bytes = size,
            "File uploaded, scan scheduled"
        );

        Ok(record)
    }

    async fn discard_bytes(&self, file_id: Uuid, filename: &str) {
        if let Err(e) = self.storage.delete(file_id, filename).await {
            tracing::warn!(error = %e, file_id = %file_id, "Failed to remove stored bytes");
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn status(&self, file_id: Uuid) -> Result<FileRecord, AppError> {
        self.load(file_id).await
    }

    /// Issue a download token for a clean file whose bytes are still present.
    #[tracing::instrument(skip(self))]
    pub async fn request_download_link(&self, file_id: Uuid) -> Result<DownloadLink, AppError> {
        let record = self.load(file_id).await?;
        ensure_downloadable(&record)?;

        let present = self
            .storage
            .exists(file_id, &record.filename)
            .await
            .map_err(|e| bytes_error(file_id, e))?;
        if !present {
            tracing::warn!(file_id = %file_id, "Clean record has no stored bytes");
            return Err(AppError::bytes_not_found(file_id));
        }

        let issued = self.tokens.issue(file_id, self.link_ttl)?;
        tracing::debug!(file_id = %file_id, expires_at = %issued.expires_at, "Download link issued");

        Ok(DownloadLink {
            token: issued.token,
            expires_at: issued.expires_at,
            record,
        })
    }

    /// Redeem a download token.
    ///
    /// The file's state is checked again at redemption time, so a token issued
    /// earlier never outlives the record being clean.
    #[tracing::instrument(skip(self, token))]
    pub async fn redeem(&self, token: &str) -> Result<Redemption, AppError> {
        let file_id = self.tokens.verify(token)?;
        let record = self.load(file_id).await?;
        ensure_downloadable(&record)?;

        let link = self
            .storage
            .issue_temporary_link(file_id, &record.filename, self.presigned_ttl)
            .await
            .map_err(|e| bytes_error(file_id, e))?;

        let mut redemption = match link {
            Some(url) => Redemption::Redirect { url, record },
            None => {
                let stream = self
                    .storage
                    .download_stream(file_id, &record.filename)
                    .await
                    .map_err(|e| bytes_error(file_id, e))?;
                Redemption::Stream { record, stream }
            }
        };

        let updated = self
            .records
            .update(file_id, |r| {
                ensure_downloadable(r)?;
                r.record_download(Utc::now());
                Ok(())
            })
            .await?;

        tracing::info!(
            file_id = %file_id,
            download_count = updated.download_count,
            "File download started"
        );

        *redemption.record_mut() = updated;
        Ok(redemption)
    }

    /// Remove a file's bytes and record.
    ///
    /// When the bytes cannot be removed the record is kept, so the file stays
    /// visible and the delete can be retried.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, file_id: Uuid) -> Result<DeleteReport, AppError> {
        let record = self.load(file_id).await?;

        let bytes_deleted = self
            .storage
            .delete(file_id, &record.filename)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, file_id = %file_id, "Failed to delete stored bytes");
                AppError::from(e)
            })?;
        let record_deleted = self.records.delete(file_id).await?;

        tracing::info!(
            file_id = %file_id,
            bytes_deleted,
            record_deleted,
            "File deleted"
        );

        Ok(DeleteReport {
            file_id,
            bytes_deleted,
            record_deleted,
        })
    }

    /// A page of records; `limit` is clamped to `1..=MAX_LIST_LIMIT`.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        skip: usize,
        limit: usize,
    ) -> Result<(Vec<FileRecord>, usize), AppError> {
        self.records
            .list(skip, limit.clamp(1, MAX_LIST_LIMIT))
            .await
    }
}
