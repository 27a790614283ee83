//! Scanvault Worker
//!
//! Everything that runs after an upload has been accepted: the scan orchestrator,
//! the in-process task queue that schedules it, and the periodic scratch sweeper.

pub mod context;
pub mod queue;
pub mod scan;
pub mod sweeper;

pub use context::ScanJobHandler;
pub use queue::{TaskFinishedSender, TaskOutcome, TaskQueue, TaskQueueConfig};
pub use scan::{ScanOrchestrator, ScanRun};
pub use sweeper::ScratchSweeper;
