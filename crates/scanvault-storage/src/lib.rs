//! Scanvault Storage Library
//!
//! Storage abstraction for quarantined uploads with a local filesystem backend and
//! remote object store backends (S3, Azure Blob). All behave identically from the
//! caller's point of view.
//!
//! # Object naming
//!
//! Every backend stores a file under `{file_id}{extension}`, where the extension is
//! taken from the original filename, lower-cased and stripped of anything that is not
//! alphanumeric. Remote objects live under the `uploads/` prefix. Naming is centralized
//! in the `keys` module.
//!
//! # Scratch files
//!
//! Scanning needs a path on local disk. [`Storage::fetch_to_local`] returns a
//! [`LocalFile`]: either the stored file itself (local backend) or a private scratch
//! copy (remote backend) that is deleted when released or dropped.

pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
#[cfg(feature = "storage-azure")]
pub mod azure;
#[cfg(any(feature = "storage-s3", feature = "storage-azure"))]
pub mod object;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod scratch;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use scanvault_core::StorageBackend;
#[cfg(any(feature = "storage-s3", feature = "storage-azure"))]
pub use object::ObjectStorage;
pub use scratch::{LocalFile, ScratchDir};
pub use traits::{Storage, StorageError, StorageResult, StorageStream};
