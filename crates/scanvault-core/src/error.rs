//! Error types module
//!
//! Every fallible operation in scanvault eventually surfaces as an [`AppError`]. The
//! variants follow the lifecycle of a quarantined file: validation before any write,
//! conflicts on identity, missing records or bytes, gated downloads (`Forbidden`,
//! `Pending`, `ScanError`) and token rejection. Crate-local errors (storage, key-value
//! store, scan client, token) convert into it at the service boundary.

use std::fmt;
use std::io;

use uuid::Uuid;

use crate::models::ScanStatus;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for conflicts and illegal state moves
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error responses - defines how an error should be presented
pub trait ErrorMetadata {
    /// HTTP status code to return
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g., "SCAN_PENDING")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (can be retried)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the client
    fn suggested_action(&self) -> Option<&'static str>;

    /// Client-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Whether the message carries backend internals
    fn is_sensitive(&self) -> bool;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Which half of a file is missing: its metadata record or its stored bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingResource {
    Record,
    Bytes,
}

impl fmt::Display for MissingResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingResource::Record => f.write_str("record"),
            MissingResource::Bytes => f.write_str("bytes"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("File too large: {0}")]
    PayloadTooLarge(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found ({resource}): {message}")]
    NotFound {
        resource: MissingResource,
        message: String,
    },

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("File {file_id} is not ready for download (status: {status})")]
    Pending { file_id: Uuid, status: ScanStatus },

    #[error("Scan failed for file {file_id}: {}", detail.as_deref().unwrap_or("unknown"))]
    ScanError {
        file_id: Uuid,
        detail: Option<String>,
    },

    #[error("Invalid download token: {0}")]
    TokenInvalid(String),

    #[error("Illegal state transition for file {file_id}: {from} -> {to}")]
    InvalidTransition {
        file_id: Uuid,
        from: ScanStatus,
        to: ScanStatus,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Metadata store error: {0}")]
    Metadata(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error with source")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl AppError {
    pub fn record_not_found(file_id: Uuid) -> Self {
        AppError::NotFound {
            resource: MissingResource::Record,
            message: format!("File {} not found", file_id),
        }
    }

    pub fn bytes_not_found(file_id: Uuid) -> Self {
        AppError::NotFound {
            resource: MissingResource::Bytes,
            message: format!("File {} not found in storage", file_id),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<io::Error> for AppError {
    fn from(err: io::Error) -> Self {
        AppError::Internal(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Metadata(format!("Record encoding error: {}", err))
    }
}

impl From<uuid::Error> for AppError {
    fn from(err: uuid::Error) -> Self {
        AppError::Validation(format!("UUID parsing error: {}", err))
    }
}

/// Static metadata for each variant: (http_status, error_code, recoverable, suggested_action, sensitive, log_level).
fn app_error_static_metadata(
    err: &AppError,
) -> (
    u16,
    &'static str,
    bool,
    Option<&'static str>,
    bool,
    LogLevel,
) {
    match err {
        AppError::Validation(_) => (
            400,
            "VALIDATION_ERROR",
            false,
            Some("Check the file name, extension and size, then upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::PayloadTooLarge(_) => (
            413,
            "PAYLOAD_TOO_LARGE",
            false,
            Some("Reduce file size and upload again"),
            false,
            LogLevel::Debug,
        ),
        AppError::AlreadyExists(_) => (
            409,
            "ALREADY_EXISTS",
            false,
            Some("Upload the file again to get a new identifier"),
            false,
            LogLevel::Warn,
        ),
        AppError::NotFound { .. } => (
            404,
            "NOT_FOUND",
            false,
            Some("Verify the file ID exists"),
            false,
            LogLevel::Debug,
        ),
        AppError::Forbidden(_) => (
            403,
            "FORBIDDEN",
            false,
            None,
            false,
            LogLevel::Debug,
        ),
        AppError::Pending { .. } => (
            202,
            "SCAN_PENDING",
            true,
            Some("Retry after the virus scan completes"),
            false,
            LogLevel::Debug,
        ),
        AppError::ScanError { .. } => (
            500,
            "SCAN_FAILED",
            false,
            Some("Contact support"),
            false,
            LogLevel::Warn,
        ),
        AppError::TokenInvalid(_) => (
            401,
            "TOKEN_INVALID",
            false,
            Some("Request a new download link"),
            false,
            LogLevel::Debug,
        ),
        AppError::InvalidTransition { .. } => (
            409,
            "INVALID_TRANSITION",
            false,
            None,
            false,
            LogLevel::Warn,
        ),
        AppError::Storage(_) => (
            500,
            "STORAGE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Metadata(_) => (
            500,
            "METADATA_STORE_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
        AppError::Internal(_) | AppError::InternalWithSource { .. } => (
            500,
            "INTERNAL_ERROR",
            true,
            Some("Retry after a short delay"),
            true,
            LogLevel::Error,
        ),
    }
}

impl AppError {
    /// Get error type name for logging/debugging
    pub fn error_type(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "Validation",
            AppError::PayloadTooLarge(_) => "PayloadTooLarge",
            AppError::AlreadyExists(_) => "AlreadyExists",
            AppError::NotFound { .. } => "NotFound",
            AppError::Forbidden(_) => "Forbidden",
            AppError::Pending { .. } => "Pending",
            AppError::ScanError { .. } => "ScanError",
            AppError::TokenInvalid(_) => "TokenInvalid",
            AppError::InvalidTransition { .. } => "InvalidTransition",
            AppError::Storage(_) => "Storage",
            AppError::Metadata(_) => "Metadata",
            AppError::Internal(_) => "Internal",
            AppError::InternalWithSource { .. } => "InternalWithSource",
        }
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        use std::error::Error;

        let mut details = self.to_string();

        let mut source = self.source();
        let mut depth = 0;
        while let Some(err) = source {
            depth += 1;
            if depth > 5 {
                details.push_str("\n  ... (truncated)");
                break;
            }
            details.push_str(&format!("\n  Caused by: {}", err));
            source = err.source();
        }

        details
    }
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        app_error_static_metadata(self).0
    }

    fn error_code(&self) -> &'static str {
        app_error_static_metadata(self).1
    }

    fn is_recoverable(&self) -> bool {
        app_error_static_metadata(self).2
    }

    fn suggested_action(&self) -> Option<&'static str> {
        app_error_static_metadata(self).3
    }

    fn is_sensitive(&self) -> bool {
        app_error_static_metadata(self).4
    }

    fn log_level(&self) -> LogLevel {
        app_error_static_metadata(self).5
    }

    fn client_message(&self) -> String {
        match self {
            AppError::Validation(ref msg) => msg.clone(),
            AppError::PayloadTooLarge(ref msg) => msg.clone(),
            AppError::AlreadyExists(ref msg) => msg.clone(),
            AppError::NotFound { ref message, .. } => message.clone(),
            AppError::Forbidden(ref msg) => msg.clone(),
            AppError::Pending { .. } => {
                "File is still being scanned. Please try again later.".to_string()
            }
            AppError::ScanError { .. } => "File scan failed. Please contact support.".to_string(),
            AppError::TokenInvalid(_) => "Invalid or expired download token".to_string(),
            AppError::InvalidTransition { from, to, .. } => {
                format!("File cannot move from {} to {}", from, to)
            }
            AppError::Storage(_) => "Failed to access storage".to_string(),
            AppError::Metadata(_) => "Failed to access file metadata".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "Internal server error".to_string()
            }
        }
    }
}
