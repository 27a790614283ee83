//! Hooks between the upload path and the background scanner
//!
//! The upload path only knows how to hand a file identity to "something that will
//! eventually run a scan". The worker crate provides the in-process queue; other
//! schedulers can be plugged in by implementing [`ScanScheduler`].

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppError;

/// Work item submitted after a successful upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanJob {
    pub file_id: Uuid,
    pub filename: String,
    /// Optional context for logging, e.g. the declared content type
    pub hint: Option<String>,
}

/// Opaque handle of a submitted scan task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskHandle {
    pub task_id: Uuid,
}

/// At-least-once delivery of scan jobs.
///
/// Implementations may run a job more than once; the scan task itself is idempotent.
#[async_trait]
pub trait ScanScheduler: Send + Sync {
    async fn submit(&self, job: ScanJob) -> Result<TaskHandle, AppError>;
}

/// Scheduler that accepts every job and runs none of them.
pub struct NoOpScanScheduler;

#[async_trait]
impl ScanScheduler for NoOpScanScheduler {
    async fn submit(&self, _job: ScanJob) -> Result<TaskHandle, AppError> {
        Ok(TaskHandle {
            task_id: Uuid::new_v4(),
        })
    }
}
