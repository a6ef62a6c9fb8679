//! Notification queue inspection endpoints.

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::api::SharedState;
use crate::error::Result;

/// GET /api/v1/notifications
pub async fn list(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let notifications = state.queue.get_all().await?;
    Ok(Json(notifications))
}

/// DELETE /api/v1/notifications
pub async fn delete_all(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let deleted = state.queue.delete_all().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

/// GET /api/v1/notifications/dead-letters
pub async fn dead_letters(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let dead = state.queue.dead_letters().await?;
    Ok(Json(dead))
}
