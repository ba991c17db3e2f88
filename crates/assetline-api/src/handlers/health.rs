//! Health check

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use sqlx::PgPool;

use crate::state::AppState;

const CHECK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct HealthCheckResponse {
    status: &'static str,
    canonical_store: String,
    metadata_store: String,
}

async fn check_pool(pool: Option<&PgPool>, store: &str) -> (bool, String) {
    let Some(pool) = pool else {
        return (true, "in_memory".to_string());
    };
    match tokio::time::timeout(CHECK_TIMEOUT, sqlx::query("SELECT 1").execute(pool)).await {
        Ok(Ok(_)) => (true, "healthy".to_string()),
        Ok(Err(e)) => {
            tracing::error!(store, error = %e, "Database health check failed");
            (false, format!("unhealthy: {}", e))
        }
        Err(_) => {
            tracing::error!(store, "Database health check timed out");
            (false, "timeout".to_string())
        }
    }
}

/// 200 when both stores answer, 503 otherwise.
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (canonical_ok, canonical_store) =
        check_pool(state.health.canonical_pool.as_ref(), "canonical").await;
    let (metadata_ok, metadata_store) =
        check_pool(state.health.metadata_pool.as_ref(), "metadata").await;

    let healthy = canonical_ok && metadata_ok;
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(HealthCheckResponse {
            status: if healthy { "healthy" } else { "unhealthy" },
            canonical_store,
            metadata_store,
        }),
    )
}
