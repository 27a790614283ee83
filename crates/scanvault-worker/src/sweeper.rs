//! Periodic removal of orphaned scratch files.
//!
//! Scratch copies are deleted when the scan that created them ends. Files only
//! survive when the process dies mid-scan; this task removes them once they are
//! older than any live scan could be.

use std::time::Duration;

use scanvault_storage::ScratchDir;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

pub struct ScratchSweeper {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl ScratchSweeper {
    /// Sweep `scratch` every `interval`, removing files older than `max_age`.
    pub fn start(scratch: ScratchDir, interval: Duration, max_age: Duration) -> Self {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let handle = tokio::spawn(async move {
            tracing::info!(
                dir = %scratch.root().display(),
                interval_secs = interval.as_secs(),
                max_age_secs = max_age.as_secs(),
                "Scratch sweeper started"
            );

            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = ticker.tick() => Self::sweep_once(&scratch, max_age).await,
                    _ = shutdown_rx.recv() => break,
                }
            }

            tracing::info!("Scratch sweeper stopped");
        });

        Self {
            shutdown_tx,
            handle,
        }
    }

    async fn sweep_once(scratch: &ScratchDir, max_age: Duration) {
        let dir = scratch.clone();
        match tokio::task::spawn_blocking(move || dir.sweep_stale(max_age)).await {
            Ok(Ok(removed)) => tracing::debug!(removed, "Scratch sweep finished"),
            Ok(Err(e)) => tracing::error!(error = %e, "Scratch sweep failed"),
            Err(e) => tracing::error!(error = %e, "Scratch sweep task failed"),
        }
    }

    /// Stop sweeping and wait for the task to exit.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        let _ = self.handle.await;
    }
}
