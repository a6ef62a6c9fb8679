//! Refresh status endpoint.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};

use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::coordinate::ProjectVersionCoordinate;

/// GET /api/v1/refresh-status/:group/:artifact/:version
pub async fn get_status(
    State(state): State<SharedState>,
    Path((group_id, artifact_id, version_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let coordinate = ProjectVersionCoordinate::new(group_id, artifact_id, version_id);
    let status = state
        .tracker
        .status(&coordinate)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no refresh record for {coordinate}")))?;
    Ok(Json(status))
}
