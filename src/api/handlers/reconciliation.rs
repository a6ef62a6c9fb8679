//! Version reconciliation endpoint.

use axum::{extract::State, response::IntoResponse, Json};

use crate::api::SharedState;
use crate::error::Result;

/// GET /api/v1/versions/mismatch
pub async fn find_mismatches(State(state): State<SharedState>) -> Result<impl IntoResponse> {
    let mismatches = state.reconciliation.find_versions_mismatches().await?;
    Ok(Json(mismatches))
}
