use std::sync::Arc;
use std::time::Duration;

use scanvault_core::constants::FILE_RECORD_KEY_PREFIX;
use scanvault_core::{AppError, FileRecord};
use uuid::Uuid;

use crate::kv::KeyValueStore;

/// Optimistic updates give up after this many lost races on one record.
const MAX_UPDATE_ATTEMPTS: usize = 32;

fn record_key(file_id: Uuid) -> String {
    format!("{}{}", FILE_RECORD_KEY_PREFIX, file_id)
}

/// File record repository
///
/// One JSON document per file under `file:{file_id}`, rewritten with the retention
/// TTL on every write. Updates are compare-and-swap on the whole document, so two
/// writers racing on one record never lose each other's changes and writers on
/// different records never wait on each other.
#[derive(Clone)]
pub struct FileRecordRepository {
    store: Arc<dyn KeyValueStore>,
    ttl: Duration,
}

impl FileRecordRepository {
    pub fn new(store: Arc<dyn KeyValueStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    fn decode(raw: &str) -> Result<FileRecord, AppError> {
        serde_json::from_str(raw)
            .map_err(|e| AppError::Metadata(format!("Corrupt file record: {}", e)))
    }

    /// Store a new record. Fails with `AlreadyExists` if the identity is taken.
    #[tracing::instrument(skip(self, record), fields(file_id = %record.file_id))]
    pub async fn create(&self, record: &FileRecord) -> Result<(), AppError> {
        let raw = serde_json::to_string(record)?;
        let written = self
            .store
            .set_nx_ex(&record_key(record.file_id), &raw, self.ttl)
            .await?;

        if !written {
            return Err(AppError::AlreadyExists(format!(
                "File record {} already exists",
                record.file_id
            )));
        }

        tracing::debug!(status = %record.status, "File record created");
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, file_id: Uuid) -> Result<Option<FileRecord>, AppError> {
        match self.store.get(&record_key(file_id)).await? {
            Some(raw) => Ok(Some(Self::decode(&raw)?)),
            None => Ok(None),
        }
    }

    /// Apply `mutator` to the current record and write it back atomically.
    ///
    /// The mutator may run several times if other writers get in first; it must only
    /// depend on the record it is given. An error from the mutator aborts the update
    /// without writing anything.
    #[tracing::instrument(skip(self, mutator))]
    pub async fn update<F>(&self, file_id: Uuid, mut mutator: F) -> Result<FileRecord, AppError>
    where
        F: FnMut(&mut FileRecord) -> Result<(), AppError> + Send,
    {
        let key = record_key(file_id);

        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let current = self
                .store
                .get(&key)
                .await?
                .ok_or_else(|| AppError::record_not_found(file_id))?;

            let mut record = Self::decode(&current)?;
            mutator(&mut record)?;
            let next = serde_json::to_string(&record)?;

            if self
                .store
                .compare_and_swap(&key, &current, &next, self.ttl)
                .await?
            {
                return Ok(record);
            }

            tracing::debug!(attempt, "File record changed concurrently, retrying update");
            tokio::task::yield_now().await;
        }

        Err(AppError::Metadata(format!(
            "Gave up updating file record {} after {} conflicting writes",
            file_id, MAX_UPDATE_ATTEMPTS
        )))
    }

    /// Remove a record. Returns whether one existed.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, file_id: Uuid) -> Result<bool, AppError> {
        Ok(self.store.delete(&record_key(file_id)).await?)
    }

    /// A page of records ordered by key, plus the total number of records.
    #[tracing::instrument(skip(self))]
    pub async fn list(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<FileRecord>, usize), AppError> {
        let mut keys = self.store.scan_keys(FILE_RECORD_KEY_PREFIX).await?;
        keys.sort();
        let total = keys.len();

        let mut records = Vec::with_capacity(limit.min(total));
        for key in keys.iter().skip(offset).take(limit) {
            // Records can expire or be deleted between the scan and the read.
            if let Some(raw) = self.store.get(key).await? {
                match Self::decode(&raw) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(key = %key, error = %e, "Skipping unreadable record"),
                }
            }
        }

        Ok((records, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryStore;
    use chrono::Utc;
    use scanvault_core::{ScanOutcome, ScanStatus};

    fn repo() -> FileRecordRepository {
        FileRecordRepository::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600))
    }

    fn record() -> FileRecord {
        FileRecord::new_pending(Uuid::new_v4(), "note.txt", 40, "text/plain", "/tmp/x.txt")
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = repo();
        let record = record();
        repo.create(&record).await.unwrap();

        let loaded = repo.get(record.file_id).await.unwrap().unwrap();
        assert_eq!(loaded, record);
        assert!(repo.get(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicate_identity() {
        let repo = repo();
        let record = record();
        repo.create(&record).await.unwrap();
        assert!(matches!(
            repo.create(&record).await,
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_update_applies_transitions() {
        let repo = repo();
        let record = record();
        repo.create(&record).await.unwrap();

        let updated = repo
            .update(record.file_id, |r| r.begin_scan())
            .await
            .unwrap();
        assert_eq!(updated.status, ScanStatus::Scanning);

        let done = repo
            .update(record.file_id, |r| {
                r.complete_scan(ScanOutcome::clean(), Utc::now())
            })
            .await
            .unwrap();
        assert_eq!(done.status, ScanStatus::Clean);
    }

    #[tokio::test]
    async fn test_rejected_mutation_writes_nothing() {
        let repo = repo();
        let record = record();
        repo.create(&record).await.unwrap();

        let result = repo
            .update(record.file_id, |r| {
                r.complete_scan(ScanOutcome::infected("EICAR-Test"), Utc::now())
            })
            .await;
        assert!(matches!(result, Err(AppError::InvalidTransition { .. })));

        let stored = repo.get(record.file_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ScanStatus::Pending);
        assert!(stored.scan_result.is_none());
    }

    #[tokio::test]
    async fn test_update_missing_record_is_not_found() {
        let repo = repo();
        let result = repo.update(Uuid::new_v4(), |_| Ok(())).await;
        assert!(matches!(result, Err(AppError::NotFound { .. })));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_updates_do_not_lose_writes() {
        let repo = repo();
        let record = record();
        repo.create(&record).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let repo = repo.clone();
            let file_id = record.file_id;
            handles.push(tokio::spawn(async move {
                repo.update(file_id, |r| {
                    r.record_download(Utc::now());
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let stored = repo.get(record.file_id).await.unwrap().unwrap();
        assert_eq!(stored.download_count, 20);
    }

    #[tokio::test]
    async fn test_delete_and_list() {
        let repo = repo();
        let mut ids = Vec::new();
        for _ in 0..5 {
            let record = record();
            ids.push(record.file_id);
            repo.create(&record).await.unwrap();
        }

        let (page, total) = repo.list(1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page.len(), 2);

        let (rest, _) = repo.list(4, 10).await.unwrap();
        assert_eq!(rest.len(), 1);

        assert!(repo.delete(ids[0]).await.unwrap());
        assert!(!repo.delete(ids[0]).await.unwrap());
        let (_, total) = repo.list(0, 10).await.unwrap();
        assert_eq!(total, 4);
    }
}
