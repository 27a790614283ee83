use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http::Method;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{ObjectStore, ObjectStoreExt, PutMode, PutPayload, Result as ObjectResult};
use scanvault_core::constants::REMOTE_UPLOAD_PREFIX;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::keys::{file_extension, object_name};
use crate::scratch::{LocalFile, ScratchDir};
use crate::traits::{Storage, StorageError, StorageResult, StorageStream};
use crate::StorageBackend;

/// Remote object store storage (S3 or Azure Blob)
///
/// Objects are written create-only under `uploads/{file_id}{ext}`. Scans run against a
/// scratch copy streamed into the configured scratch directory. The provider-specific
/// constructors live in the `s3` and `azure` modules.
#[derive(Clone)]
pub struct ObjectStorage {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    backend: StorageBackend,
    container: String,
    scratch: ScratchDir,
}

impl ObjectStorage {
    /// Wrap an existing object store. Without a signer no temporary links are issued.
    pub fn from_store(
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
        backend: StorageBackend,
        container: impl Into<String>,
        scratch: ScratchDir,
    ) -> Self {
        ObjectStorage {
            store,
            signer,
            backend,
            container: container.into(),
            scratch,
        }
    }

    fn object_key(file_id: Uuid, original_filename: &str) -> String {
        format!(
            "{}{}",
            REMOTE_UPLOAD_PREFIX,
            object_name(file_id, original_filename)
        )
    }

    fn location_of(&self, key: &str) -> String {
        let scheme = match self.backend {
            StorageBackend::Azure => "az",
            _ => "s3",
        };
        format!("{}://{}/{}", scheme, self.container, key)
    }

    fn map_read_error(&self, key: &str, err: ObjectStoreError) -> StorageError {
        match err {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(self.location_of(key)),
            other => {
                tracing::error!(
                    error = %other,
                    backend = %self.backend,
                    container = %self.container,
                    key = %key,
                    "Object read failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        }
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn put(
        &self,
        data: Bytes,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<String> {
        let key = Self::object_key(file_id, original_filename);
        let size = data.len() as u64;
        let location = Path::from(key.clone());

        let start = std::time::Instant::now();

        let result: ObjectResult<_> = self
            .store
            .put_opts(&location, PutPayload::from(data), PutMode::Create.into())
            .await;

        result.map_err(|e| match e {
            ObjectStoreError::AlreadyExists { .. } | ObjectStoreError::Precondition { .. } => {
                StorageError::AlreadyExists(self.location_of(&key))
            }
            other => {
                tracing::error!(
                    error = %other,
                    backend = %self.backend,
                    container = %self.container,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object upload failed"
                );
                StorageError::UploadFailed(other.to_string())
            }
        })?;

        tracing::info!(
            backend = %self.backend,
            container = %self.container,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object upload successful"
        );

        Ok(self.location_of(&key))
    }

    async fn exists(&self, file_id: Uuid, original_filename: &str) -> StorageResult<bool> {
        let location = Path::from(Self::object_key(file_id, original_filename));
        match self.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn size(&self, file_id: Uuid, original_filename: &str) -> StorageResult<u64> {
        let key = Self::object_key(file_id, original_filename);
        let location = Path::from(key.clone());
        let meta = self
            .store
            .head(&location)
            .await
            .map_err(|e| self.map_read_error(&key, e))?;
        Ok(meta.size)
    }

    async fn delete(&self, file_id: Uuid, original_filename: &str) -> StorageResult<bool> {
        if !self.exists(file_id, original_filename).await? {
            return Ok(false);
        }

        let key = Self::object_key(file_id, original_filename);
        let start = std::time::Instant::now();
        let location = Path::from(key.clone());

        let result: ObjectResult<_> = self.store.delete(&location).await;

        match result {
            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {}
            Err(e) => {
                tracing::error!(
                    error = %e,
                    backend = %self.backend,
                    container = %self.container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object delete failed"
                );
                return Err(StorageError::DeleteFailed(e.to_string()));
            }
        }

        tracing::info!(
            backend = %self.backend,
            container = %self.container,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object delete successful"
        );

        Ok(true)
    }

    async fn fetch_to_local(
        &self,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<LocalFile> {
        let key = Self::object_key(file_id, original_filename);
        let location = Path::from(key.clone());
        let start = std::time::Instant::now();

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.map_read_error(&key, e))?;

        // The temp path deletes the copy if anything below returns early.
        let (std_file, temp_path) = self
            .scratch
            .create(&file_extension(original_filename))?
            .into_parts();
        let mut file = fs::File::from_std(std_file);

        let mut stream = result.into_stream();
        let mut size_bytes: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| StorageError::DownloadFailed(e.to_string()))?;
            size_bytes += chunk.len() as u64;
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tracing::debug!(
            backend = %self.backend,
            container = %self.container,
            key = %key,
            scratch = %temp_path.display(),
            size_bytes,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Staged remote object in scratch file"
        );

        Ok(LocalFile::Scratch(temp_path))
    }

    async fn issue_temporary_link(
        &self,
        file_id: Uuid,
        original_filename: &str,
        ttl: Duration,
    ) -> StorageResult<Option<String>> {
        let Some(signer) = self.signer.as_ref() else {
            return Ok(None);
        };

        let location = Path::from(Self::object_key(file_id, original_filename));
        let url_result: ObjectResult<_> = signer.signed_url(Method::GET, &location, ttl).await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        Ok(Some(url))
    }

    async fn download_stream(
        &self,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<StorageStream> {
        let key = Self::object_key(file_id, original_filename);
        let start = std::time::Instant::now();
        let location = Path::from(key.clone());

        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| self.map_read_error(&key, e))?;

        let container = self.container.clone();
        let stream = result.into_stream().map(move |res| match res {
            Ok(bytes) => Ok(bytes),
            Err(e) => {
                tracing::error!(
                    container = %container,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object stream download error"
                );
                Err(StorageError::DownloadFailed(e.to_string()))
            }
        });

        Ok(Box::pin(stream))
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
