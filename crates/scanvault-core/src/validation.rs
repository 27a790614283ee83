//! Upload validation, applied before any byte or record is written.

use std::path::Path;

use crate::error::AppError;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("No filename provided")]
    MissingFilename,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File type not allowed: {extension} (allowed: {allowed:?})")]
    InvalidExtension {
        extension: String,
        allowed: Vec<String>,
    },

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("Empty file not allowed")]
    EmptyFile,
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::FileTooLarge { .. } => AppError::PayloadTooLarge(err.to_string()),
            other => AppError::Validation(other.to_string()),
        }
    }
}

/// Checks an incoming upload against the configured size limit and extension allow-list.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    max_file_size: u64,
    allowed_extensions: Vec<String>,
}

impl UploadValidator {
    /// Extensions are compared case-insensitively and without a leading dot.
    pub fn new(max_file_size: u64, allowed_extensions: Vec<String>) -> Self {
        let allowed_extensions = allowed_extensions
            .into_iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            max_file_size,
            allowed_extensions,
        }
    }

    pub fn validate_filename(&self, filename: &str) -> Result<(), ValidationError> {
        if filename.trim().is_empty() {
            return Err(ValidationError::MissingFilename);
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .ok_or_else(|| ValidationError::InvalidFilename(filename.to_string()))?;

        if !self.allowed_extensions.contains(&extension) {
            return Err(ValidationError::InvalidExtension {
                extension,
                allowed: self.allowed_extensions.clone(),
            });
        }

        Ok(())
    }

    pub fn validate_size(&self, size: u64) -> Result<(), ValidationError> {
        if size > self.max_file_size {
            return Err(ValidationError::FileTooLarge {
                size,
                max: self.max_file_size,
            });
        }

        if size == 0 {
            return Err(ValidationError::EmptyFile);
        }

        Ok(())
    }

    pub fn validate(&self, filename: &str, size: u64) -> Result<(), ValidationError> {
        self.validate_filename(filename)?;
        self.validate_size(size)
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}
