//! Scanner seam used by the scan orchestrator.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use scanvault_core::ScanOutcome;

/// Failures talking to a scanning daemon. Every one of them ends as an `error` outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ScanClientError {
    #[error("scanner unavailable: {0}")]
    Unavailable(String),

    #[error("scanner timeout after {}s during {operation}", .limit.as_secs_f64())]
    Timeout {
        operation: &'static str,
        limit: Duration,
    },

    #[error("scanner I/O error during {operation}: {message}")]
    Io {
        operation: &'static str,
        message: String,
    },

    #[error("unexpected scanner response: {0}")]
    Protocol(String),

    #[error("scanner reported an error: {0}")]
    Daemon(String),

    #[error("scanner task failed: {0}")]
    TaskFailed(String),
}

/// Anything that can scan a file on local disk.
///
/// `scan` never fails: daemon, transport and parse failures are folded into an
/// outcome with status `error` and a readable `error_detail`.
#[async_trait]
pub trait VirusScanner: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether the scanner answers a health check.
    async fn probe(&self) -> bool;

    async fn scan(&self, path: &Path) -> ScanOutcome;
}
