use scanvault_core::{ScanOutcome, ScanStatus, ScanVerdict};
use utoipa::OpenApi;

use crate::error;
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Scanvault API",
        version = "0.1.0",
        description = "File quarantine service. Uploads are held until a ClamAV scan marks them clean; only clean files can be downloaded, through short-lived signed links."
    ),
    paths(
        handlers::files::upload_file,
        handlers::files::file_status,
        handlers::files::list_files,
        handlers::files::delete_file,
        handlers::download::get_download_link,
        handlers::download::download_file,
        handlers::health::health_check,
    ),
    components(
        schemas(
            models::FileUploadResponse,
            models::FileInfo,
            models::FileStatusResponse,
            models::DownloadLinkResponse,
            models::DownloadRedirectResponse,
            models::DeleteFileResponse,
            models::FileSummary,
            models::FileListResponse,
            models::HealthResponse,
            ScanStatus,
            ScanVerdict,
            ScanOutcome,
            error::ErrorResponse,
        )
    ),
    tags(
        (name = "files", description = "Upload, status, listing and deletion of quarantined files"),
        (name = "downloads", description = "Signed download links for clean files"),
        (name = "health", description = "Dependency health")
    )
)]
pub struct ApiDoc;

pub fn get_openapi_spec() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
