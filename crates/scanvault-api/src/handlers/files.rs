use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use scanvault_core::constants::MAX_LIST_LIMIT;
use scanvault_core::AppError;
use scanvault_services::UploadRequest;

use super::parse_file_id;
use crate::error::{ErrorResponse, HttpAppError};
use crate::models::{
    DeleteFileResponse, FileInfo, FileListResponse, FileStatusResponse, FileSummary,
    FileUploadResponse, ListQuery,
};
use crate::state::AppState;

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("Upload exceeds the size limit: {}", err.body_text()))
    } else {
        AppError::Validation(format!("Failed to read multipart: {}", err.body_text()))
    }
}

/// Pull the single `file` field out of a multipart body.
async fn extract_upload(mut multipart: Multipart) -> Result<UploadRequest, AppError> {
    let mut upload: Option<UploadRequest> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }
        if upload.is_some() {
            return Err(AppError::Validation(
                "Multiple file fields are not allowed; send exactly one field named 'file'"
                    .to_string(),
            ));
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(multipart_error)?;

        upload = Some(UploadRequest {
            filename,
            content_type,
            data,
        });
    }

    upload.ok_or_else(|| AppError::Validation("No file provided".to_string()))
}

#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    request_body(content_type = "multipart/form-data", description = "Form with a single `file` field"),
    responses(
        (status = 200, description = "File accepted, scan scheduled", body = FileUploadResponse),
        (status = 400, description = "Invalid file", body = ErrorResponse),
        (status = 413, description = "File too large", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, multipart), fields(operation = "upload_file"))]
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<impl IntoResponse, HttpAppError> {
    let request = extract_upload(multipart).await?;
    let record = state.files.upload(request).await?;
    Ok((StatusCode::OK, Json(FileUploadResponse::from(record))))
}

#[utoipa::path(
    get,
    path = "/files/{id}/status",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "Current file state", body = FileStatusResponse),
        (status = 404, description = "File not found", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "file_status"))]
pub async fn file_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file_id = parse_file_id(&id)?;
    let record = state.files.status(file_id).await?;
    let message = record.status.message().to_string();

    Ok(Json(FileStatusResponse {
        file_info: FileInfo::from(record),
        message,
    }))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    tag = "files",
    params(("id" = Uuid, Path, description = "File ID")),
    responses(
        (status = 200, description = "File deleted", body = DeleteFileResponse),
        (status = 404, description = "File not found", body = ErrorResponse),
        (status = 500, description = "Storage failure, record kept", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "delete_file"))]
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, HttpAppError> {
    let file_id = parse_file_id(&id)?;
    let report = state.files.delete(file_id).await?;

    let message = if report.bytes_deleted {
        "File deleted successfully"
    } else {
        "File metadata deleted (file may not have existed in storage)"
    };

    Ok(Json(DeleteFileResponse {
        message: message.to_string(),
        file_id: report.file_id,
        bytes_deleted: report.bytes_deleted,
        record_deleted: report.record_deleted,
    }))
}

#[utoipa::path(
    get,
    path = "/files",
    tag = "files",
    params(ListQuery),
    responses(
        (status = 200, description = "Page of files", body = FileListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(operation = "list_files"))]
pub async fn list_files(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, HttpAppError> {
    let limit = query.limit.clamp(1, MAX_LIST_LIMIT);
    let (records, total) = state.files.list(query.skip, limit).await?;

    Ok(Json(FileListResponse {
        files: records.into_iter().map(FileSummary::from).collect(),
        total,
        skip: query.skip,
        limit,
    }))
}
