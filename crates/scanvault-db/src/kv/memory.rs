use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::{KeyValueStore, KvResult};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn new(value: &str, ttl: Duration) -> Self {
        Self {
            value: value.to_string(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local store honouring TTLs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> KvResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), Entry::new(value, ttl));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        if entries.get(key).is_some_and(|e| e.is_live(now)) {
            return Ok(false);
        }
        entries.insert(key.to_string(), Entry::new(value, ttl));
        Ok(true)
    }

    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) && entry.value == expected => {
                entries.insert(key.to_string(), Entry::new(new, ttl));
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> KvResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(entries.remove(key).is_some_and(|e| e.is_live(now)))
    }

    async fn scan_keys(&self, prefix: &str) -> KvResult<Vec<String>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> KvResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TTL: Duration = Duration::from_secs(60);

    #[tokio::test]
    async fn test_set_nx_only_writes_once() {
        let store = MemoryStore::new();
        assert!(store.set_nx_ex("file:a", "one", TTL).await.unwrap());
        assert!(!store.set_nx_ex("file:a", "two", TTL).await.unwrap());
        assert_eq!(store.get("file:a").await.unwrap().as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_compare_and_swap_requires_current_value() {
        let store = MemoryStore::new();
        store.set_ex("file:a", "v1", TTL).await.unwrap();

        assert!(!store.compare_and_swap("file:a", "v0", "v2", TTL).await.unwrap());
        assert!(store.compare_and_swap("file:a", "v1", "v2", TTL).await.unwrap());
        assert_eq!(store.get("file:a").await.unwrap().as_deref(), Some("v2"));
        assert!(!store.compare_and_swap("file:missing", "v1", "v2", TTL).await.unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store
            .set_ex("file:a", "v1", Duration::from_secs(5))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(store.get("file:a").await.unwrap().is_none());
        assert!(store.scan_keys("file:").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scan_keys_filters_prefix_and_delete() {
        let store = MemoryStore::new();
        store.set_ex("file:a", "1", TTL).await.unwrap();
        store.set_ex("file:b", "2", TTL).await.unwrap();
        store.set_ex("other:c", "3", TTL).await.unwrap();

        let mut keys = store.scan_keys("file:").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["file:a".to_string(), "file:b".to_string()]);

        assert!(store.delete("file:a").await.unwrap());
        assert!(!store.delete("file:a").await.unwrap());
    }
}
