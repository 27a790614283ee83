//! Key-value store contract used for file records.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scanvault_core::{AppError, Config};

pub use memory::MemoryStore;
#[cfg(feature = "redis")]
pub use redis_store::RedisStore;

#[derive(Debug, thiserror::Error)]
pub enum KvError {
    #[error("Key-value store connection failed: {0}")]
    Connection(String),

    #[error("Key-value store command failed: {0}")]
    Command(String),

    #[error("Unsupported key-value store URL: {0}")]
    UnsupportedUrl(String),
}

pub type KvResult<T> = Result<T, KvError>;

impl From<KvError> for AppError {
    fn from(err: KvError) -> Self {
        AppError::Metadata(err.to_string())
    }
}

/// String-valued key-value store with per-key expiry.
///
/// Every write carries a TTL. `compare_and_swap` is the only primitive the record
/// repository uses for updates, which keeps read-modify-write safe per key without
/// any cross-key locking.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> KvResult<Option<String>>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<()>;

    /// Write only if the key is absent. Returns whether the value was written.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> KvResult<bool>;

    /// Replace the value only if it still equals `expected`. Returns whether it was replaced.
    async fn compare_and_swap(
        &self,
        key: &str,
        expected: &str,
        new: &str,
        ttl: Duration,
    ) -> KvResult<bool>;

    /// Returns whether a key was removed.
    async fn delete(&self, key: &str) -> KvResult<bool>;

    /// All live keys starting with `prefix`, in no particular order.
    async fn scan_keys(&self, prefix: &str) -> KvResult<Vec<String>>;

    async fn ping(&self) -> KvResult<()>;

    fn backend_name(&self) -> &'static str;
}

/// Build the store named by `REDIS_URL`; `memory://` selects the in-process store.
pub async fn create_kv_store(config: &Config) -> KvResult<Arc<dyn KeyValueStore>> {
    let url = config.redis_url.as_str();

    if url.starts_with("memory://") {
        tracing::warn!("Using in-process record store; records are lost on restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    #[cfg(feature = "redis")]
    if url.starts_with("redis://") || url.starts_with("rediss://") {
        let store = RedisStore::connect(url).await?;
        return Ok(Arc::new(store));
    }

    Err(KvError::UnsupportedUrl(url.to_string()))
}
