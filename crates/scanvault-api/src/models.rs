//! Request and response bodies of the HTTP API.

use chrono::{DateTime, Utc};
use scanvault_core::{FileRecord, ScanOutcome, ScanStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::constants::DEFAULT_LIST_LIMIT;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileUploadResponse {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub upload_timestamp: DateTime<Utc>,
    pub scan_status: ScanStatus,
    pub task_id: Option<Uuid>,
}

impl From<FileRecord> for FileUploadResponse {
    fn from(record: FileRecord) -> Self {
        Self {
            file_id: record.file_id,
            filename: record.filename,
            file_size: record.size,
            upload_timestamp: record.created_at,
            scan_status: record.status,
            task_id: record.task_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileInfo {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub content_type: String,
    pub upload_timestamp: DateTime<Utc>,
    pub scan_status: ScanStatus,
    pub scan_result: Option<ScanOutcome>,
    pub scan_timestamp: Option<DateTime<Utc>>,
    pub download_count: u64,
    pub last_downloaded: Option<DateTime<Utc>>,
}

impl From<FileRecord> for FileInfo {
    fn from(record: FileRecord) -> Self {
        Self {
            file_id: record.file_id,
            filename: record.filename,
            file_size: record.size,
            content_type: record.content_type,
            upload_timestamp: record.created_at,
            scan_status: record.status,
            scan_result: record.scan_result,
            scan_timestamp: record.scan_timestamp,
            download_count: record.download_count,
            last_downloaded: record.last_downloaded,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileStatusResponse {
    pub file_info: FileInfo,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadLinkResponse {
    /// Relative URL redeeming the signed token
    pub download_url: String,
    pub expires_at: DateTime<Utc>,
    pub file_info: FileInfo,
}

/// Body of the 302 returned when storage hands out a temporary URL.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadRedirectResponse {
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeleteFileResponse {
    pub message: String,
    pub file_id: Uuid,
    pub bytes_deleted: bool,
    pub record_deleted: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileSummary {
    pub file_id: Uuid,
    pub filename: String,
    pub file_size: u64,
    pub upload_timestamp: DateTime<Utc>,
    pub scan_status: ScanStatus,
    pub download_count: u64,
}

impl From<FileRecord> for FileSummary {
    fn from(record: FileRecord) -> Self {
        Self {
            file_id: record.file_id,
            filename: record.filename,
            file_size: record.size,
            upload_timestamp: record.created_at,
            scan_status: record.status,
            download_count: record.download_count,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct FileListResponse {
    pub files: Vec<FileSummary>,
    pub total: usize,
    pub skip: usize,
    pub limit: usize,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,
    pub kv_store: String,
    pub storage: String,
    pub scanner: String,
    pub timestamp: DateTime<Utc>,
}
