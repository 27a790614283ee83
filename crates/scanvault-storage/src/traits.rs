//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use scanvault_core::AppError;
use thiserror::Error;
use uuid::Uuid;

use crate::scratch::LocalFile;
use crate::StorageBackend;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Byte stream returned by [`Storage::download_stream`]
pub type StorageStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(msg) => AppError::AlreadyExists(msg),
            StorageError::NotFound(msg) => AppError::NotFound {
                resource: scanvault_core::MissingResource::Bytes,
                message: msg,
            },
            StorageError::ConfigError(msg) => AppError::Internal(msg),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Storage abstraction trait
///
/// Callers address files only by `(file_id, original_filename)`; each backend derives
/// its object name from that pair. The backend is chosen once at construction
/// (see [`crate::create_storage`]) and never inspected by callers.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` and return the backend-specific location.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the target already has content;
    /// existing objects are never overwritten.
    async fn put(
        &self,
        data: Bytes,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<String>;

    async fn exists(&self, file_id: Uuid, original_filename: &str) -> StorageResult<bool>;

    /// Size in bytes of the stored object.
    async fn size(&self, file_id: Uuid, original_filename: &str) -> StorageResult<u64>;

    /// Remove the stored object. Returns `false` when there was nothing to remove.
    async fn delete(&self, file_id: Uuid, original_filename: &str) -> StorageResult<bool>;

    /// Make the bytes available at a local filesystem path for scanning.
    ///
    /// The returned [`LocalFile`] owns any scratch copy; dropping or releasing it
    /// removes the copy. Stored files on the local backend are never removed by it.
    async fn fetch_to_local(
        &self,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<LocalFile>;

    /// A time-limited direct link to the bytes, if the backend supports one.
    async fn issue_temporary_link(
        &self,
        file_id: Uuid,
        original_filename: &str,
        ttl: Duration,
    ) -> StorageResult<Option<String>>;

    /// Stream the stored bytes.
    async fn download_stream(
        &self,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<StorageStream>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
