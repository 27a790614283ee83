//! Scanvault Services Layer
//!
//! Business services shared by the HTTP layer and the background worker: the ClamAV
//! scan client, download token signing, and the file lifecycle service that ties
//! validation, storage, records and scan scheduling together.

pub mod services;

#[cfg(feature = "clamav")]
pub use services::clamav::{parse_scan_response, ClamAVService, ClamdEndpoint, Detection};
pub use services::file_service::{DeleteReport, DownloadLink, FileService, Redemption, UploadRequest};
pub use services::scanner::{ScanClientError, VirusScanner};
pub use services::token::{DownloadTokenService, IssuedToken, TokenError};
pub use scanvault_storage::{create_storage, Storage, StorageBackend, StorageError, StorageResult};
