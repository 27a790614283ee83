//! HTTP error response conversion
//!
//! Handlers return `Result<impl IntoResponse, HttpAppError>`; any `AppError` (or type
//! converting into one) renders as an [`ErrorResponse`] with the status, code and
//! recoverability from [`ErrorMetadata`].

use std::sync::OnceLock;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use scanvault_core::{AppError, ErrorMetadata, LogLevel};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    /// Machine-readable error code for programmatic handling
    pub code: String,
    /// Whether the same request may succeed later
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggested_action: Option<String>,
}

/// Wrapper type for AppError to implement IntoResponse
///
/// Needed because of the orphan rule: `IntoResponse` and `AppError` both live in
/// other crates.
#[derive(Debug)]
pub struct HttpAppError(pub AppError);

impl<E> From<E> for HttpAppError
where
    E: Into<AppError>,
{
    fn from(err: E) -> Self {
        HttpAppError(err.into())
    }
}

fn log_error(error: &AppError) {
    let error_type = error.error_type();
    match error.log_level() {
        LogLevel::Debug => {
            tracing::debug!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Warn => {
            tracing::warn!(error = %error, error_type = error_type, "Error occurred");
        }
        LogLevel::Error => {
            tracing::error!(error = %error, error_type = error_type, "Error occurred");
        }
    }
}

static EXPOSE_DETAILS: OnceLock<bool> = OnceLock::new();

/// Fix whether error responses carry internal details. Set once at startup from
/// `Config::debug`; later calls keep the first value.
pub fn set_expose_details(expose: bool) {
    if EXPOSE_DETAILS.set(expose).is_err() && expose_details() != expose {
        tracing::warn!(expose, "Error detail exposure already set; keeping first value");
    }
}

fn expose_details() -> bool {
    EXPOSE_DETAILS.get().copied().unwrap_or(false)
}

/// Render `error` as a response body. Details are included only when
/// `expose_details` is set and the error carries nothing sensitive.
pub fn build_error_response(error: &AppError, expose_details: bool) -> ErrorResponse {
    let show = expose_details && !error.is_sensitive();
    ErrorResponse {
        error: error.client_message(),
        details: show.then(|| error.detailed_message()),
        error_type: show.then(|| error.error_type().to_string()),
        code: error.error_code().to_string(),
        recoverable: error.is_recoverable(),
        suggested_action: error.suggested_action().map(String::from),
    }
}

impl IntoResponse for HttpAppError {
    fn into_response(self) -> Response {
        let app_error = &self.0;
        let status = StatusCode::from_u16(app_error.http_status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        log_error(app_error);

        let body = build_error_response(app_error, expose_details());
        (status, Json(body)).into_response()
    }
}
