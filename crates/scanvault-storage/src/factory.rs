#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(any(feature = "storage-s3", feature = "storage-azure"))]
use crate::{ObjectStorage, ScratchDir};
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use scanvault_core::Config;
use std::sync::Arc;

/// Create the storage backend named by configuration.
pub async fn create_storage(config: &Config) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let bucket = config
                .s3_bucket
                .clone()
                .ok_or_else(|| StorageError::ConfigError("S3_BUCKET not configured".to_string()))?;
            let region = config.s3_region.clone().ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let scratch = ScratchDir::new(&config.scratch_dir)?;

            let storage = ObjectStorage::s3(bucket, region, config.s3_endpoint.clone(), scratch)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-azure")]
        StorageBackend::Azure => {
            let account = config.azure_storage_account.clone().ok_or_else(|| {
                StorageError::ConfigError("AZURE_STORAGE_ACCOUNT not configured".to_string())
            })?;
            let container = config.azure_container.clone().ok_or_else(|| {
                StorageError::ConfigError("AZURE_CONTAINER not configured".to_string())
            })?;
            let scratch = ScratchDir::new(&config.scratch_dir)?;

            let storage = ObjectStorage::azure(account, container, scratch)?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-azure"))]
        StorageBackend::Azure => Err(StorageError::ConfigError(
            "Azure storage backend not available (storage-azure feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let storage = LocalStorage::new(config.local_storage_path.clone()).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_local_backend_from_config() {
        let dir = tempdir().unwrap();
        let config = Config {
            local_storage_path: dir.path().join("files"),
            ..Config::default()
        };

        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
        assert!(dir.path().join("files").is_dir());
    }

    #[cfg(feature = "storage-s3")]
    #[tokio::test]
    async fn test_s3_backend_requires_bucket() {
        let config = Config {
            storage_backend: StorageBackend::S3,
            ..Config::default()
        };
        assert!(matches!(
            create_storage(&config).await,
            Err(StorageError::ConfigError(_))
        ));
    }

    #[cfg(feature = "storage-azure")]
    #[tokio::test]
    async fn test_azure_backend_from_config() {
        let dir = tempdir().unwrap();
        let mut config = Config {
            storage_backend: StorageBackend::Azure,
            azure_storage_account: Some("quarantineacct".to_string()),
            scratch_dir: dir.path().join("scratch"),
            ..Config::default()
        };
        assert!(matches!(
            create_storage(&config).await,
            Err(StorageError::ConfigError(_))
        ));

        config.azure_container = Some("uploads".to_string());
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Azure);
        assert!(dir.path().join("scratch").is_dir());
    }
}
