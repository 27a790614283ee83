//! Task queue: in-process worker pool, retry with backoff, and submission.
//!
//! Jobs are held in memory, so delivery is at-least-once only for the lifetime of
//! the process. Handlers must be idempotent; the scan orchestrator is.
//!
//! Shutdown: [`TaskQueue::shutdown`] signals the pool to stop taking new jobs; it
//! does not wait for in-flight jobs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use scanvault_core::{AppError, ErrorMetadata, ScanJob, ScanScheduler, TaskHandle};
use tokio::sync::{mpsc, Semaphore};
use uuid::Uuid;

use crate::context::ScanJobHandler;

/// Upper bound on the retry delay, in backoff units (seconds by default).
pub const MAX_RETRY_BACKOFF_SECS: u64 = 300;

/// Exponential backoff with a cap.
#[inline]
pub(crate) fn compute_retry_backoff_seconds(retry_count: u32) -> u64 {
    2_u64
        .saturating_pow(retry_count)
        .min(MAX_RETRY_BACKOFF_SECS)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    Failed,
}

/// Optional sender notified when a job finishes for good.
pub type TaskFinishedSender = mpsc::Sender<(Uuid, TaskOutcome)>;

#[derive(Debug, Clone)]
pub struct TaskQueueConfig {
    pub max_workers: usize,
    pub max_retries: u32,
    /// Length of one backoff step.
    pub backoff_unit: Duration,
}

impl Default for TaskQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_retries: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl TaskQueueConfig {
    pub fn from_config(config: &scanvault_core::Config) -> Self {
        Self {
            max_workers: config.task_queue_max_workers.max(1),
            max_retries: config.task_queue_max_retries,
            ..Self::default()
        }
    }

    fn retry_delay(&self, retry_count: u32) -> Duration {
        let steps = compute_retry_backoff_seconds(retry_count);
        self.backoff_unit
            .saturating_mul(u32::try_from(steps).unwrap_or(u32::MAX))
    }
}

#[derive(Debug, Clone)]
struct QueuedTask {
    task_id: Uuid,
    job: ScanJob,
    retry_count: u32,
}

#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<QueuedTask>,
    shutdown_tx: mpsc::Sender<()>,
}

impl TaskQueue {
    /// Create the queue and spawn its worker pool on the current runtime.
    pub fn new(
        handler: Arc<dyn ScanJobHandler>,
        config: TaskQueueConfig,
        task_finished_tx: Option<TaskFinishedSender>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        tokio::spawn(Self::worker_pool(
            handler,
            config,
            receiver,
            sender.clone(),
            shutdown_rx,
            task_finished_tx,
        ));

        Self {
            sender,
            shutdown_tx,
        }
    }

    /// Enqueue a job and return its task id.
    #[tracing::instrument(skip(self, job), fields(file_id = %job.file_id))]
    pub fn submit_job(&self, job: ScanJob) -> Result<Uuid, AppError> {
        let task_id = Uuid::new_v4();
        self.sender
            .send(QueuedTask {
                task_id,
                job,
                retry_count: 0,
            })
            .map_err(|_| {
                tracing::error!(task_id = %task_id, "Task queue is not running");
                AppError::Internal("Task queue is not running".to_string())
            })?;

        tracing::info!(task_id = %task_id, "Task submitted to queue");
        Ok(task_id)
    }

    async fn worker_pool(
        handler: Arc<dyn ScanJobHandler>,
        config: TaskQueueConfig,
        mut receiver: mpsc::UnboundedReceiver<QueuedTask>,
        requeue: mpsc::UnboundedSender<QueuedTask>,
        mut shutdown_rx: mpsc::Receiver<()>,
        task_finished_tx: Option<TaskFinishedSender>,
    ) {
        tracing::info!(
            max_workers = config.max_workers,
            max_retries = config.max_retries,
            "Task queue worker pool started"
        );

        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Task queue worker pool shutting down");
                    break;
                }
                next = receiver.recv() => {
                    let Some(task) = next else { break };

                    let permit = match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let handler = handler.clone();
                    let requeue = requeue.clone();
                    let config = config.clone();
                    let finished_tx = task_finished_tx.clone();
                    tokio::spawn(async move {
                        let _permit = permit;
                        Self::process_task_with_retry(task, handler, requeue, config, finished_tx)
                            .await;
                    });
                }
            }
        }

        tracing::info!("Task queue worker pool stopped");
    }

    #[tracing::instrument(
        skip(handler, requeue, config, task_finished_tx),
        fields(task.id = %task.task_id, file_id = %task.job.file_id)
    )]
    async fn process_task_with_retry(
        task: QueuedTask,
        handler: Arc<dyn ScanJobHandler>,
        requeue: mpsc::UnboundedSender<QueuedTask>,
        config: TaskQueueConfig,
        task_finished_tx: Option<TaskFinishedSender>,
    ) {
        let finished = match handler.handle(&task.job).await {
            Ok(()) => {
                tracing::info!(task_id = %task.task_id, "Task completed successfully");
                TaskOutcome::Completed
            }
            Err(e) => {
                let recoverable = e.is_recoverable();
                tracing::error!(
                    task_id = %task.task_id,
                    error = %e,
                    retry_count = task.retry_count,
                    max_retries = config.max_retries,
                    recoverable,
                    "Task execution failed"
                );

                if recoverable && task.retry_count < config.max_retries {
                    let delay = config.retry_delay(task.retry_count);
                    tracing::info!(
                        task_id = %task.task_id,
                        retry_count = task.retry_count + 1,
                        backoff_ms = delay.as_millis(),
                        "Scheduling task retry"
                    );
                    let retried = QueuedTask {
                        retry_count: task.retry_count + 1,
                        ..task
                    };
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if requeue.send(retried).is_err() {
                            tracing::warn!("Task queue stopped before retry could be enqueued");
                        }
                    });
                    return;
                }

                if recoverable {
                    tracing::error!(task_id = %task.task_id, "Task failed after max retries");
                } else {
                    tracing::error!(
                        task_id = %task.task_id,
                        "Task failed with unrecoverable error, will not retry"
                    );
                }
                TaskOutcome::Failed
            }
        };

        if let Some(ref tx) = task_finished_tx {
            let _ = tx.send((task.task_id, finished)).await;
        }
    }

    /// Signals the worker pool to stop taking new jobs. Returns immediately; jobs
    /// already running continue until they finish.
    pub async fn shutdown(&self) {
        tracing::info!("Initiating task queue shutdown");
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[async_trait]
impl ScanScheduler for TaskQueue {
    async fn submit(&self, job: ScanJob) -> Result<TaskHandle, AppError> {
        let task_id = self.submit_job(job)?;
        Ok(TaskHandle { task_id })
    }
}
