//! Scanvault Core Library
//!
//! This crate provides the domain models, error taxonomy, configuration and upload
//! validation shared by every scanvault component.

pub mod config;
pub mod constants;
pub mod error;
pub mod hooks;
pub mod models;
pub mod storage_types;
pub mod validation;

// Re-export commonly used types
pub use config::Config;
pub use error::{AppError, ErrorMetadata, LogLevel, MissingResource};
pub use hooks::{NoOpScanScheduler, ScanJob, ScanScheduler, TaskHandle};
pub use models::{FileRecord, ScanOutcome, ScanStatus, ScanVerdict};
pub use storage_types::StorageBackend;
pub use validation::{UploadValidator, ValidationError};
