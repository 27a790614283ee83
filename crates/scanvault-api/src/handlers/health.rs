//! Dependency health check.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use uuid::Uuid;

use crate::constants::HEALTH_CHECK_TIMEOUT_SECS;
use crate::models::HealthResponse;
use crate::state::AppState;

const HEALTHY: &str = "healthy";
const UNHEALTHY: &str = "unhealthy";
const TIMEOUT: &str = "timeout";

/// Run an async check with timeout; returns "healthy", "timeout" or "unhealthy".
/// Failure details go to the log only, since the endpoint is unauthenticated.
async fn run_check<F, E>(check: &'static str, timeout: Duration, f: F) -> String
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    match tokio::time::timeout(timeout, f).await {
        Ok(Ok(())) => HEALTHY.to_string(),
        Ok(Err(e)) => {
            tracing::warn!(check, error = %e, "Health check failed");
            UNHEALTHY.to_string()
        }
        Err(_) => {
            tracing::warn!(check, timeout_secs = timeout.as_secs(), "Health check timed out");
            TIMEOUT.to_string()
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Dependency status; `degraded` when any check fails", body = HealthResponse)
    )
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let timeout = Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS);

    let kv = state.kv.clone();
    let kv_status = run_check("kv_store", timeout, async move { kv.ping().await }).await;

    let storage = state.files.storage().clone();
    let storage_status = run_check(
        "storage",
        timeout,
        async move {
            storage
                .exists(Uuid::nil(), "health-check")
                .await
                .map(drop)
        },
    )
    .await;

    let scanner = state.scanner.clone();
    let scanner_status = run_check(
        "scanner",
        timeout,
        async move {
            if scanner.probe().await {
                Ok(())
            } else {
                Err(format!("{} not responding", scanner.name()))
            }
        },
    )
    .await;

    let healthy = [&kv_status, &storage_status, &scanner_status]
        .iter()
        .all(|s| s.as_str() == HEALTHY);
    if !healthy {
        tracing::warn!(
            kv_store = %kv_status,
            storage = %storage_status,
            scanner = %scanner_status,
            "Health check degraded"
        );
    }

    Json(HealthResponse {
        status: if healthy { HEALTHY } else { "degraded" }.to_string(),
        kv_store: kv_status,
        storage: storage_status,
        scanner: scanner_status,
        timestamp: Utc::now(),
    })
}
