//! Refresh endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::SharedState;
use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::models::notification::{EventPriority, MetadataNotification, ParentEvent};

#[derive(Debug, Deserialize)]
pub struct RefreshVersionParams {
    /// Re-ingest all files, ignoring checksum matches.
    #[serde(default)]
    pub full_update: bool,
    /// Recompute the transitive closure after ingesting.
    #[serde(default)]
    pub transitive: bool,
    /// Enqueue the refresh instead of running it inline.
    #[serde(default)]
    pub async_mode: bool,
}

#[derive(Debug, Deserialize)]
pub struct RefreshProjectParams {
    /// When false, only versions not yet stored are refreshed.
    #[serde(default)]
    pub all_versions: bool,
    #[serde(default)]
    pub full_update: bool,
    #[serde(default)]
    pub transitive: bool,
}

/// PUT /api/v1/artifacts-refresh/:group/:artifact/:version
pub async fn refresh_version(
    State(state): State<SharedState>,
    Path((group_id, artifact_id, version_id)): Path<(String, String, String)>,
    Query(params): Query<RefreshVersionParams>,
) -> Result<impl IntoResponse> {
    let coordinate = ProjectVersionCoordinate::new(group_id, artifact_id, version_id);
    let parent = ParentEvent::build(
        Some(&coordinate.group_id),
        Some(&coordinate.artifact_id),
        Some(&coordinate.version_id),
        None,
    );

    if params.async_mode {
        coordinate.validate()?;
        let notification = MetadataNotification::new(
            coordinate,
            parent,
            EventPriority::UserTriggered,
            state.queue.max_retries(),
        )
        .with_flags(params.full_update, params.transitive);
        let event_id = state.queue.push(&notification).await?;
        return Ok((StatusCode::ACCEPTED, Json(json!({ "event_id": event_id }))).into_response());
    }

    let result = state
        .orchestrator
        .refresh_version_for_project(&coordinate, &parent, params.full_update, params.transitive)
        .await?;
    Ok(Json(result).into_response())
}

/// PUT /api/v1/artifacts-refresh/:group/:artifact/versions
pub async fn refresh_project(
    State(state): State<SharedState>,
    Path((group_id, artifact_id)): Path<(String, String)>,
    Query(params): Query<RefreshProjectParams>,
) -> Result<impl IntoResponse> {
    let results = state
        .orchestrator
        .refresh_all_versions_for_project(
            &group_id,
            &artifact_id,
            None,
            params.all_versions,
            params.full_update,
            params.transitive,
        )
        .await?;
    Ok(Json(results))
}

/// PUT /api/v1/artifacts-refresh/versions
pub async fn refresh_all_projects(
    State(state): State<SharedState>,
    Query(params): Query<RefreshProjectParams>,
) -> Result<impl IntoResponse> {
    let results = state
        .orchestrator
        .refresh_all_versions_for_all_projects(
            params.all_versions,
            params.full_update,
            params.transitive,
        )
        .await?;
    Ok(Json(results))
}

/// PUT /api/v1/artifacts-refresh/snapshots
pub async fn refresh_snapshots(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let results = state
        .orchestrator
        .refresh_default_snapshots_for_all_projects()
        .await?;
    Ok(Json(results))
}

/// PUT /api/v1/artifacts-refresh/revisions
pub async fn refresh_revisions(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let results = state
        .orchestrator
        .refresh_all_project_revisions_artifacts()
        .await?;
    Ok(Json(results))
}

/// PUT /api/v1/artifacts-refresh/missing-versions
pub async fn refresh_missing_versions(
    State(state): State<SharedState>,
) -> Result<impl IntoResponse> {
    let results = state
        .orchestrator
        .refresh_projects_with_missing_versions()
        .await?;
    Ok(Json(results))
}

/// PUT /api/v1/artifacts-refresh/mismatches
pub async fn refresh_mismatches(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let mismatches = state.reconciliation.find_versions_mismatches().await?;
    let results = state
        .orchestrator
        .refresh_projects_version_mismatches(&mismatches)
        .await?;
    Ok(Json(results))
}
