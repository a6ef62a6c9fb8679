//! Health check endpoint.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::api::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub queue_size: Option<i64>,
}

/// Liveness check. Reports the queue depth as a cheap store probe.
pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    match state.queue.size().await {
        Ok(size) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                queue_size: Some(size),
            }),
        ),
        Err(e) => {
            tracing::error!("Health check store probe failed: {e}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy".to_string(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                    queue_size: None,
                }),
            )
        }
    }
}
