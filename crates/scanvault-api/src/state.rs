//! Application state shared by all handlers.
//!
//! Everything here is built once at startup and injected; handlers never reach for
//! globals.

use std::sync::Arc;

use scanvault_db::KeyValueStore;
use scanvault_services::{FileService, VirusScanner};

#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    /// Record store backend, used directly only by the health check
    pub kv: Arc<dyn KeyValueStore>,
    pub scanner: Arc<dyn VirusScanner>,
}

impl AppState {
    pub fn new(
        files: FileService,
        kv: Arc<dyn KeyValueStore>,
        scanner: Arc<dyn VirusScanner>,
    ) -> Arc<Self> {
        Arc::new(Self {
            files,
            kv,
            scanner,
        })
    }
}
