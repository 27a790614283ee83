//! Test helpers: build AppState and router for integration tests.
//!
//! Records live in the in-process store and bytes in a temp directory, so the suite
//! needs neither Redis nor clamd.

#![allow(dead_code)]

pub mod doubles;

use std::sync::Arc;
use std::time::Duration;

use axum_test::multipart::{MultipartForm, Part};
use axum_test::{TestResponse, TestServer};
use scanvault_api::setup::routes;
use scanvault_api::state::AppState;
use scanvault_core::{Config, NoOpScanScheduler, ScanScheduler};
use scanvault_db::{FileRecordRepository, KeyValueStore, MemoryStore};
use scanvault_services::{DownloadTokenService, FileService, Storage, VirusScanner};
use scanvault_storage::LocalStorage;
use scanvault_worker::{ScanOrchestrator, TaskQueue, TaskQueueConfig};
use tempfile::TempDir;
use uuid::Uuid;

use doubles::{InlineScheduler, LinkingStorage, MarkerScanner, UnreachableKv};

pub const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";
pub const MAX_FILE_SIZE: u64 = 4096;

pub const NOTE: &[u8] = b"this is a perfectly harmless note file.\n";
pub const EICAR: &[u8] =
    br"X5O!P%@AP[4\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

/// How submitted scans are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Scan before the upload request returns.
    Inline,
    /// Through the background task queue.
    Queued,
    /// Never; files stay `pending`.
    Never,
}

#[derive(Debug, Clone, Copy)]
pub struct TestOptions {
    pub scan: ScanMode,
    /// Storage hands out temporary links, so downloads redirect.
    pub redirect_downloads: bool,
    pub scanner_healthy: bool,
    /// The record store answers requests but fails its health ping.
    pub kv_ping_fails: bool,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            scan: ScanMode::Inline,
            redirect_downloads: false,
            scanner_healthy: true,
            kv_ping_fails: false,
        }
    }
}

/// Test application: server and owned resources.
pub struct TestApp {
    pub server: TestServer,
    pub state: Arc<AppState>,
    pub _temp_dir: TempDir,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

pub fn create_test_config(temp_dir: &TempDir) -> Config {
    Config {
        redis_url: "memory://".to_string(),
        local_storage_path: temp_dir.path().join("uploads"),
        max_file_size_bytes: MAX_FILE_SIZE,
        download_token_secret: TEST_SECRET.to_string(),
        scan_time_limit_secs: 5,
        ..Config::default()
    }
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(TestOptions::default()).await
}

pub async fn setup_test_app_with(options: TestOptions) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
    let config = create_test_config(&temp_dir);

    let kv: Arc<dyn KeyValueStore> = if options.kv_ping_fails {
        Arc::new(UnreachableKv(MemoryStore::new()))
    } else {
        Arc::new(MemoryStore::new())
    };
    let records = FileRecordRepository::new(kv.clone(), config.record_ttl());

    let local = LocalStorage::new(config.local_storage_path.clone())
        .await
        .expect("Failed to create local storage");
    let storage: Arc<dyn Storage> = if options.redirect_downloads {
        Arc::new(LinkingStorage(local))
    } else {
        Arc::new(local)
    };

    let scanner: Arc<dyn VirusScanner> = Arc::new(MarkerScanner {
        healthy: options.scanner_healthy,
    });
    let orchestrator = Arc::new(ScanOrchestrator::new(
        records.clone(),
        storage.clone(),
        scanner.clone(),
        config.scan_time_limit(),
    ));

    let scheduler: Arc<dyn ScanScheduler> = match options.scan {
        ScanMode::Inline => Arc::new(InlineScheduler(orchestrator)),
        ScanMode::Queued => Arc::new(TaskQueue::new(
            orchestrator,
            TaskQueueConfig {
                max_workers: 2,
                max_retries: 1,
                backoff_unit: Duration::from_millis(10),
            },
            None,
        )),
        ScanMode::Never => Arc::new(NoOpScanScheduler),
    };

    let tokens = DownloadTokenService::new(TEST_SECRET).expect("Failed to create token service");
    let files = FileService::new(records, storage, scheduler, tokens, &config);
    let state = AppState::new(files, kv, scanner);

    let app = routes::setup_routes(&config, state.clone()).expect("Failed to setup routes");
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");

    TestApp {
        server,
        state,
        _temp_dir: temp_dir,
    }
}

pub async fn upload(client: &TestServer, filename: &str, data: &[u8]) -> TestResponse {
    let part = Part::bytes(bytes::Bytes::copy_from_slice(data))
        .file_name(filename)
        .mime_type("text/plain");
    client
        .post("/upload")
        .multipart(MultipartForm::new().add_part("file", part))
        .await
}

/// Upload and return the new file id, asserting success.
pub async fn upload_ok(client: &TestServer, filename: &str, data: &[u8]) -> Uuid {
    let response = upload(client, filename, data).await;
    assert_eq!(response.status_code(), 200, "upload failed: {}", response.text());
    let body: serde_json::Value = response.json();
    let id = body
        .get("file_id")
        .and_then(|v| v.as_str())
        .expect("Expected 'file_id' in upload response");
    Uuid::parse_str(id).expect("Invalid UUID in upload response")
}

pub async fn status_of(client: &TestServer, file_id: Uuid) -> serde_json::Value {
    let response = client.get(&format!("/files/{}/status", file_id)).await;
    assert_eq!(response.status_code(), 200);
    response.json()
}

/// Poll until the scan reaches a terminal state.
pub async fn wait_for_terminal(client: &TestServer, file_id: Uuid) -> String {
    for _ in 0..200 {
        let body = status_of(client, file_id).await;
        let status = body["file_info"]["scan_status"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if matches!(status.as_str(), "clean" | "infected" | "error") {
            return status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("scan of {} did not finish", file_id);
}

/// Request a download link and return its relative URL.
pub async fn download_url(client: &TestServer, file_id: Uuid) -> String {
    let response = client.get(&format!("/files/{}/download-link", file_id)).await;
    assert_eq!(response.status_code(), 200, "link failed: {}", response.text());
    let body: serde_json::Value = response.json();
    body["download_url"]
        .as_str()
        .expect("Expected 'download_url' in link response")
        .to_string()
}
