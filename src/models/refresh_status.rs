//! Per-coordinate refresh bookkeeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::coordinate::ProjectVersionCoordinate;

/// Terminal outcome of a refresh unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefreshOutcome {
    Completed,
    Failed,
}

impl RefreshOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Completed => "completed",
            RefreshOutcome::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(RefreshOutcome::Completed),
            "failed" => Some(RefreshOutcome::Failed),
            _ => None,
        }
    }
}

/// Refresh record for one coordinate.
///
/// Created lazily on the first refresh attempt and updated on every
/// attempt; never deleted, so the `last_*` fields form an audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshStatus {
    pub coordinate: ProjectVersionCoordinate,
    /// Claim token: true while a refresh unit holds this coordinate.
    pub in_progress: bool,
    /// When the current claim (if any) was taken.
    pub claimed_at: Option<DateTime<Utc>>,
    pub last_refresh_time: Option<DateTime<Utc>>,
    pub last_outcome: Option<RefreshOutcome>,
    pub last_error: Option<String>,
    /// Consecutive failed attempts; reset to zero on success.
    pub retry_count: i32,
    pub updated_at: DateTime<Utc>,
}
