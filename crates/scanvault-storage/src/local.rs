use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::keys::object_name;
use crate::scratch::LocalFile;
use crate::traits::{Storage, StorageError, StorageResult, StorageStream};
use crate::StorageBackend;

/// Local filesystem storage implementation
///
/// Files live directly under `base_path` as `{file_id}{ext}`. Scanning reads the
/// stored file in place, so no scratch copies are made.
#[derive(Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at `base_path`, creating the directory if needed.
    pub async fn new(base_path: impl Into<PathBuf>) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalStorage { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn file_path(&self, file_id: Uuid, original_filename: &str) -> PathBuf {
        self.base_path.join(object_name(file_id, original_filename))
    }

    async fn present(path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

#[async_trait]
impl Storage for LocalStorage {
    async fn put(
        &self,
        data: Bytes,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<String> {
        let path = self.file_path(file_id, original_filename);
        let size = data.len();
        let start = std::time::Instant::now();

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyExists(path.display().to_string()));
            }
            Err(e) => {
                return Err(StorageError::UploadFailed(format!(
                    "Failed to create file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let written = async {
            file.write_all(&data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = fs::remove_file(&path).await {
                tracing::warn!(
                    path = %path.display(),
                    error = %cleanup,
                    "Failed to remove partially written file"
                );
            }
            return Err(StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                path.display(),
                e
            )));
        }

        tracing::info!(
            path = %path.display(),
            file_id = %file_id,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(path.display().to_string())
    }

    async fn exists(&self, file_id: Uuid, original_filename: &str) -> StorageResult<bool> {
        Ok(Self::present(&self.file_path(file_id, original_filename)).await)
    }

    async fn size(&self, file_id: Uuid, original_filename: &str) -> StorageResult<u64> {
        let path = self.file_path(file_id, original_filename);
        match fs::metadata(&path).await {
            Ok(meta) => Ok(meta.len()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(path.display().to_string()))
            }
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, file_id: Uuid, original_filename: &str) -> StorageResult<bool> {
        let path = self.file_path(file_id, original_filename);
        let start = std::time::Instant::now();

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(
                    path = %path.display(),
                    file_id = %file_id,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage delete successful"
                );
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::DeleteFailed(format!(
                "Failed to delete file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    async fn fetch_to_local(
        &self,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<LocalFile> {
        let path = self.file_path(file_id, original_filename);
        if !Self::present(&path).await {
            return Err(StorageError::NotFound(path.display().to_string()));
        }
        Ok(LocalFile::Stored(path))
    }

    async fn issue_temporary_link(
        &self,
        _file_id: Uuid,
        _original_filename: &str,
        _ttl: Duration,
    ) -> StorageResult<Option<String>> {
        Ok(None)
    }

    async fn download_stream(
        &self,
        file_id: Uuid,
        original_filename: &str,
    ) -> StorageResult<StorageStream> {
        let path = self.file_path(file_id, original_filename);
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(path.display().to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |item| {
            item.map_err(|e| {
                tracing::error!(
                    path = %path_display,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream download error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(dir.join("uploads")).await.unwrap()
    }

    #[tokio::test]
    async fn test_put_then_size_and_exists() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let file_id = Uuid::new_v4();

        let location = storage
            .put(Bytes::from_static(b"hello world"), file_id, "Hello.TXT")
            .await
            .unwrap();

        assert!(location.ends_with(&format!("{}.txt", file_id)));
        assert!(storage.exists(file_id, "Hello.TXT").await.unwrap());
        assert_eq!(storage.size(file_id, "Hello.TXT").await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_put_never_overwrites() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let file_id = Uuid::new_v4();

        storage
            .put(Bytes::from_static(b"first"), file_id, "a.txt")
            .await
            .unwrap();
        let second = storage
            .put(Bytes::from_static(b"second!"), file_id, "a.txt")
            .await;

        assert!(matches!(second, Err(StorageError::AlreadyExists(_))));
        assert_eq!(storage.size(file_id, "a.txt").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_delete_reports_whether_removed() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let file_id = Uuid::new_v4();

        assert!(!storage.delete(file_id, "x.pdf").await.unwrap());
        storage
            .put(Bytes::from_static(b"%PDF"), file_id, "x.pdf")
            .await
            .unwrap();
        assert!(storage.delete(file_id, "x.pdf").await.unwrap());
        assert!(!storage.exists(file_id, "x.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_fetch_to_local_returns_stored_path() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let file_id = Uuid::new_v4();
        storage
            .put(Bytes::from_static(b"scan me"), file_id, "s.txt")
            .await
            .unwrap();

        let local = storage.fetch_to_local(file_id, "s.txt").await.unwrap();
        assert!(!local.is_scratch());
        let path = local.path().to_path_buf();
        local.release().unwrap();
        assert!(path.exists(), "releasing a stored file must not delete it");
    }

    #[tokio::test]
    async fn test_missing_bytes_are_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let file_id = Uuid::new_v4();

        assert!(matches!(
            storage.fetch_to_local(file_id, "gone.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.size(file_id, "gone.txt").await,
            Err(StorageError::NotFound(_))
        ));
        assert!(matches!(
            storage.download_stream(file_id, "gone.txt").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_no_temporary_link_and_stream_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        let file_id = Uuid::new_v4();
        let data = b"stream download test".to_vec();
        storage
            .put(Bytes::from(data.clone()), file_id, "d.txt")
            .await
            .unwrap();

        let link = storage
            .issue_temporary_link(file_id, "d.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(link.is_none());

        let mut stream = storage.download_stream(file_id, "d.txt").await.unwrap();
        let mut downloaded = Vec::new();
        while let Some(chunk) = stream.next().await {
            downloaded.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(downloaded, data);
    }
}
