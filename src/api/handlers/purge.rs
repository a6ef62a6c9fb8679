//! Eviction and deletion endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;

#[derive(Debug, Deserialize)]
pub struct EvictOldestParams {
    /// Number of newest release versions to keep.
    pub keep: usize,
}

#[derive(Debug, Deserialize)]
pub struct EvictUnusedParams {
    /// Versions untouched for this many days are evicted.
    pub retention_days: u64,
}

/// DELETE /api/v1/artifact-eviction/:group/:artifact/:version
pub async fn evict_version(
    State(state): State<SharedState>,
    Path((group_id, artifact_id, version_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let coordinate = ProjectVersionCoordinate::new(group_id, artifact_id, version_id);
    state.purge.evict(&coordinate).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/artifact-eviction/:group/:artifact/:version/hard
pub async fn delete_version(
    State(state): State<SharedState>,
    Path((group_id, artifact_id, version_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let coordinate = ProjectVersionCoordinate::new(group_id, artifact_id, version_id);
    state.purge.delete(&coordinate).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/artifact-eviction/:group/:artifact/:version/deprecate
pub async fn deprecate_version(
    State(state): State<SharedState>,
    Path((group_id, artifact_id, version_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse> {
    let coordinate = ProjectVersionCoordinate::new(group_id, artifact_id, version_id);
    state.purge.deprecate(&coordinate).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/artifact-eviction/:group/:artifact/oldest?keep=N
pub async fn evict_oldest(
    State(state): State<SharedState>,
    Path((group_id, artifact_id)): Path<(String, String)>,
    Query(params): Query<EvictOldestParams>,
) -> Result<impl IntoResponse> {
    let evicted = state
        .purge
        .evict_oldest_project_versions(&group_id, &artifact_id, params.keep)
        .await?;
    Ok(Json(json!({
        "evicted": evicted.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
    })))
}

/// DELETE /api/v1/artifact-eviction/unused?retention_days=N
pub async fn evict_unused(
    State(state): State<SharedState>,
    Query(params): Query<EvictUnusedParams>,
) -> Result<impl IntoResponse> {
    let retention = Duration::from_secs(params.retention_days * 24 * 3600);
    let evicted = state.purge.evict_versions_not_used(retention).await?;
    Ok(Json(json!({
        "evicted": evicted.iter().map(|c| c.to_string()).collect::<Vec<_>>(),
    })))
}
