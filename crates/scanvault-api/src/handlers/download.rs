use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::TryStreamExt;
use scanvault_core::AppError;
use scanvault_services::Redemption;

use super::parse_file_id;
use crate::constants::DOWNLOAD_PATH_PREFIX;
use crate::error::{ErrorResponse, HttpAppError};
use crate::models::{DownloadLinkResponse, DownloadRedirectResponse, FileInfo};
use crate::state::AppState;

/// Quote-safe `filename` parameter for Content-Disposition.
fn disposition_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .filter(|c| !c.is_control() && *c != '"' && *c != '\\')
        .collect();
    if cleaned.trim().is_empty() {
        "download".to_string()
    } else {
        cleaned
    }
}

#[utoipa::path(
    get,
    path = "/files/{id}/download-link",
    tag = "downloads",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Signed download link", body = DownloadLinkResponse),
        (status = 202, description = "Scan not finished", body = ErrorResponse),
        (status = 403, description = "File is infected", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Scan failed", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "download_link"))]
pub async fn get_download_link(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file_id = parse_file_id(&id)?;
    let link = state.files.request_download_link(file_id).await?;

    Ok(Json(DownloadLinkResponse {
        download_url: format!("{}{}", DOWNLOAD_PATH_PREFIX, link.token),
        expires_at: link.expires_at,
        file_info: FileInfo::from(link.record),
    }))
}

#[utoipa::path(
    get,
    path = "/download/{token}",
    tag = "downloads",
    params(("token" = String, Path, description = "Signed download token")),
    responses(
        (status = 200, description = "File content", content_type = "application/octet-stream"),
        (status = 302, description = "Redirect to a temporary storage URL", body = DownloadRedirectResponse),
        (status = 401, description = "Invalid or expired token", body = ErrorResponse),
        (status = 403, description = "File is infected", body = ErrorResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, token), fields(operation = "download_file"))]
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<Response, HttpAppError> {
    let redemption = state.files.redeem(&token).await?;

    match redemption {
        Redemption::Redirect { url, record } => {
            tracing::info!(file_id = %record.file_id, "Redirecting download to storage");
            let location = HeaderValue::from_str(&url).map_err(|e| {
                AppError::Internal(format!("Storage returned an unusable URL: {}", e))
            })?;
            Ok((
                StatusCode::FOUND,
                [(header::LOCATION, location)],
                Json(DownloadRedirectResponse { download_url: url }),
            )
                .into_response())
        }
        Redemption::Stream { record, stream } => {
            tracing::info!(file_id = %record.file_id, size = record.size, "Streaming download");

            let content_type = HeaderValue::from_str(&record.content_type)
                .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
            let disposition = HeaderValue::from_str(&format!(
                "attachment; filename=\"{}\"",
                disposition_filename(&record.filename)
            ))
            .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

            let body = Body::from_stream(stream.map_err(std::io::Error::other));

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                body,
            )
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_filename_strips_quotes_and_controls() {
        assert_eq!(disposition_filename("note.txt"), "note.txt");
        assert_eq!(disposition_filename("a\"b\\c\r\n.pdf"), "abc.pdf");
        assert_eq!(disposition_filename("\"\""), "download");
    }
}
