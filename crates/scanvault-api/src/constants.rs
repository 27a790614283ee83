//! HTTP-level constants.

/// Path prefix of token redemption URLs handed to clients.
pub const DOWNLOAD_PATH_PREFIX: &str = "/download/";

/// Headroom on top of the maximum file size for multipart framing.
pub const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Requests served concurrently before new ones wait.
pub const HTTP_CONCURRENCY_LIMIT: usize = 1024;

/// Timeout for each dependency probe in the health check.
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// How often orphaned scratch files are swept.
pub const SCRATCH_SWEEP_INTERVAL_SECS: u64 = 600;

/// Default page size for listings.
pub const DEFAULT_LIST_LIMIT: usize = 50;
