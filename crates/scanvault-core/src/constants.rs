//! Constants shared across crates.

/// Key prefix for file records in the key-value store (`file:{file_id}`).
pub const FILE_RECORD_KEY_PREFIX: &str = "file:";

/// Object key prefix for uploads on remote storage.
pub const REMOTE_UPLOAD_PREFIX: &str = "uploads/";

/// Prefix of scratch files created while staging remote bytes for a scan.
pub const SCRATCH_FILE_PREFIX: &str = "scan-";

/// Scratch files older than this are swept by the cleanup task.
pub const SCRATCH_MAX_AGE_SECS: u64 = 3600;

/// Error detail recorded when a scan exceeds its wall-clock limit.
pub const SCAN_TIMEOUT_DETAIL: &str = "timeout";

/// Maximum page size for record listings.
pub const MAX_LIST_LIMIT: usize = 100;
