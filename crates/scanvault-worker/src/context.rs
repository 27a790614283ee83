//! Job handler trait
//!
//! The queue knows nothing about scanning. It hands each claimed job to a
//! [`ScanJobHandler`]; the scan orchestrator is the production implementation.

use async_trait::async_trait;
use scanvault_core::{AppError, ScanJob};

#[async_trait]
pub trait ScanJobHandler: Send + Sync {
    /// Process one job. Errors that report themselves as recoverable are retried.
    async fn handle(&self, job: &ScanJob) -> Result<(), AppError>;
}
