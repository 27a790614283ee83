//! Repositories over the key-value store.

pub mod file_record;

pub use file_record::FileRecordRepository;
