//! Stand-ins for clamd, for storage that issues temporary links and for a record
//! store whose health ping fails.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use scanvault_core::{AppError, ScanJob, ScanOutcome, ScanScheduler, TaskHandle};
use scanvault_db::{KeyValueStore, KvError, KvResult, MemoryStore};
use scanvault_services::{Storage, StorageBackend, StorageResult, VirusScanner};
use scanvault_storage::{LocalFile, LocalStorage, StorageStream};
use scanvault_worker::ScanOrchestrator;
use uuid::Uuid;

/// Flags any file containing the EICAR marker.
pub struct MarkerScanner {
    pub healthy: bool,
}

#[async_trait]
impl VirusScanner for MarkerScanner {
    fn name(&self) -> &'static str {
        "marker"
    }

    async fn probe(&self) -> bool {
        self.healthy
    }

    async fn scan(&self, path: &Path) -> ScanOutcome {
        if !self.healthy {
            return ScanOutcome::error("scanner unavailable: marker offline");
        }
        match tokio::fs::read(path).await {
            Ok(data) if data.windows(5).any(|w| w == b"EICAR") => {
                ScanOutcome::infected("Eicar-Test-Signature")
            }
            Ok(_) => ScanOutcome::clean(),
            Err(e) => ScanOutcome::error(e.to_string()),
        }
    }
}

/// Runs the scan before `submit` returns.
pub struct InlineScheduler(pub Arc<ScanOrchestrator>);

#[async_trait]
impl ScanScheduler for InlineScheduler {
    async fn submit(&self, job: ScanJob) -> Result<TaskHandle, AppError> {
        self.0.run(job.file_id).await?;
        Ok(TaskHandle {
            task_id: Uuid::new_v4(),
        })
    }
}

/// Local storage that also issues temporary links, like the S3 backend.
pub struct LinkingStorage(pub LocalStorage);

#[async_trait]
impl Storage for LinkingStorage {
    async fn put(&self, data: Bytes, file_id: Uuid, name: &str) -> StorageResult<String> {
        self.0.put(data, file_id, name).await
    }
    async fn exists(&self, file_id: Uuid, name: &str) -> StorageResult<bool> {
        self.0.exists(file_id, name).await
    }
    async fn size(&self, file_id: Uuid, name: &str) -> StorageResult<u64> {
        self.0.size(file_id, name).await
    }
    async fn delete(&self, file_id: Uuid, name: &str) -> StorageResult<bool> {
        self.0.delete(file_id, name).await
    }
    async fn fetch_to_local(&self, file_id: Uuid, name: &str) -> StorageResult<LocalFile> {
        self.0.fetch_to_local(file_id, name).await
    }
    async fn issue_temporary_link(
        &self,
        file_id: Uuid,
        _name: &str,
        ttl: Duration,
    ) -> StorageResult<Option<String>> {
        Ok(Some(format!(
            "https://files.test/{}?expires={}",
            file_id,
            ttl.as_secs()
        )))
    }
    async fn download_stream(&self, file_id: Uuid, name: &str) -> StorageResult<StorageStream> {
        self.0.download_stream(file_id, name).await
    }
    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

/// Serves records normally but fails PING with a connection error naming the host.
pub struct UnreachableKv(pub MemoryStore);

pub const UNREACHABLE_KV_HOST: &str = "10.0.0.3";

#[async_trait]
impl KeyValueStore for UnreachableKv {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        self.0.get(key).await
    }
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.0.set_ex(key, value, ttl).await
    }
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        self.0.set_nx_ex(key, value, ttl).await
    }
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> KvResult<bool> {
        self.0.compare_and_swap(key, expected, new, ttl).await
    }
    async fn delete(&self, key: &str) -> KvResult<bool> {
        self.0.delete(key).await
    }
    async fn scan_keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        self.0.scan_keys(prefix).await
    }
    async fn ping(&self) -> KvResult<()> {
        Err(KvError::Connection(format!(
            "redis://{}:6379 connection refused",
            UNREACHABLE_KV_HOST
        )))
    }
    fn backend_name(&self) -> &'static str {
        "unreachable"
    }
}
