//! Scanvault record store
//!
//! File records are JSON documents in a key-value store. The [`kv::KeyValueStore`]
//! trait is the only contract the repository needs; Redis backs it in production and
//! [`kv::MemoryStore`] in tests and single-process deployments.

pub mod db;
pub mod kv;

pub use db::FileRecordRepository;
pub use kv::{create_kv_store, KeyValueStore, KvError, KvResult, MemoryStore};
#[cfg(feature = "redis")]
pub use kv::RedisStore;
