//! Schedule inspection and manual-trigger endpoints.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::api::SharedState;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct RunParams {
    /// Run even when the schedule is disabled. Never bypasses the lease.
    #[serde(default)]
    pub force: bool,
}

/// GET /api/v1/schedules
pub async fn list(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let schedules: Vec<_> = state
        .scheduler
        .schedules()
        .into_iter()
        .cloned()
        .collect();
    Ok(Json(schedules))
}

/// POST /api/v1/schedules/:name/run
pub async fn run(
    State(state): State<SharedState>,
    Path(name): Path<String>,
    Query(params): Query<RunParams>,
) -> Result<impl IntoResponse> {
    let outcome = state.scheduler.run_by_name(&name, params.force).await?;
    Ok(Json(json!({ "schedule": name, "outcome": outcome })))
}
