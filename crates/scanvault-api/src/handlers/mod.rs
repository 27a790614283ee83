pub mod download;
pub mod files;
pub mod health;

use scanvault_core::AppError;
use uuid::Uuid;

/// Parse a file id from a path segment, rejecting malformed ids as a validation error.
pub(crate) fn parse_file_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw.trim()).map_err(|_| AppError::Validation(format!("Invalid file id: {}", raw)))
}
