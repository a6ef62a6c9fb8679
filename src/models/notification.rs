//! Refresh queue events and the parent-event taxonomy.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::coordinate::ProjectVersionCoordinate;

/// Priority of a queued refresh event. Lower values are dequeued first:
/// explicit user-triggered refreshes beat scheduled sweeps, which beat
/// background consolidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    UserTriggered,
    Scheduled,
    Consolidation,
}

impl EventPriority {
    pub fn as_i32(&self) -> i32 {
        match self {
            EventPriority::UserTriggered => 1,
            EventPriority::Scheduled => 2,
            EventPriority::Consolidation => 3,
        }
    }

    pub fn from_i32(v: i32) -> Self {
        match v {
            1 => EventPriority::UserTriggered,
            2 => EventPriority::Scheduled,
            _ => EventPriority::Consolidation,
        }
    }
}

/// Taxonomy of fleet-wide operations that spawn per-version events.
///
/// The identifier built from a parent event correlates logs across an event
/// tree; it is never used as a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParentEvent {
    UpdateProjectVersion,
    UpdateProjectAllVersions,
    UpdateAllProjectAllVersions,
    UpdateAllProjectAllSnapshots,
    RefreshAllVersionArtifactsSchedule,
}

impl ParentEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentEvent::UpdateProjectVersion => "UPDATE_PROJECT_VERSION",
            ParentEvent::UpdateProjectAllVersions => "UPDATE_PROJECT_ALL_VERSIONS",
            ParentEvent::UpdateAllProjectAllVersions => "UPDATE_ALL_PROJECT_ALL_VERSIONS",
            ParentEvent::UpdateAllProjectAllSnapshots => "UPDATE_ALL_PROJECT_ALL_SNAPSHOTS",
            ParentEvent::RefreshAllVersionArtifactsSchedule => {
                "REFRESH_ALL_VERSION_ARTIFACTS_SCHEDULE"
            }
        }
    }

    /// Build a deterministic parent-event identifier.
    ///
    /// An explicit id is returned verbatim, even when empty. Otherwise the
    /// three coordinate fields are joined with `_`, with absent components
    /// serialized as the literal string `"null"`.
    pub fn build(
        group_id: Option<&str>,
        artifact_id: Option<&str>,
        version_id: Option<&str>,
        explicit_id: Option<&str>,
    ) -> String {
        if let Some(id) = explicit_id {
            return id.to_string();
        }
        [group_id, artifact_id, version_id]
            .iter()
            .map(|c| c.unwrap_or("null"))
            .collect::<Vec<_>>()
            .join("_")
    }
}

/// A queued refresh event.
///
/// Exclusively owned by the queue while enqueued; ownership transfers to a
/// single consumer on dequeue. Retry bookkeeping lives in the record itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataNotification {
    /// Assigned by the store on first push when absent.
    pub event_id: Option<Uuid>,
    pub coordinate: ProjectVersionCoordinate,
    /// Correlates this event with the sweep that spawned it.
    pub parent_event_id: String,
    pub priority: EventPriority,
    pub retries: i32,
    pub max_retries: i32,
    pub full_update: bool,
    pub transitive: bool,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl MetadataNotification {
    pub fn new(
        coordinate: ProjectVersionCoordinate,
        parent_event_id: impl Into<String>,
        priority: EventPriority,
        max_retries: i32,
    ) -> Self {
        let now = Utc::now();
        Self {
            event_id: None,
            coordinate,
            parent_event_id: parent_event_id.into(),
            priority,
            retries: 0,
            max_retries,
            full_update: false,
            transitive: false,
            created: now,
            last_updated: now,
        }
    }

    pub fn with_flags(mut self, full_update: bool, transitive: bool) -> Self {
        self.full_update = full_update;
        self.transitive = transitive;
        self
    }

    /// Whether the retry budget is spent.
    pub fn is_exhausted(&self) -> bool {
        self.retries >= self.max_retries
    }
}

/// An event that exhausted its retry budget, kept for operator attention.
#[derive(Debug, Clone, Serialize)]
pub struct DeadLetter {
    pub notification: MetadataNotification,
    pub reason: String,
    pub dead_lettered_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_joins_coordinates_with_underscores() {
        assert_eq!(
            ParentEvent::build(Some("g"), Some("a"), Some("1.0.0"), None),
            "g_a_1.0.0"
        );
    }

    #[test]
    fn build_serializes_missing_components_as_null() {
        assert_eq!(
            ParentEvent::build(Some("g"), None, Some("1.0.0"), None),
            "g_null_1.0.0"
        );
        assert_eq!(ParentEvent::build(None, None, None, None), "null_null_null");
    }

    #[test]
    fn build_returns_explicit_id_verbatim() {
        assert_eq!(
            ParentEvent::build(Some("g"), Some("a"), Some("v"), Some("x")),
            "x"
        );
        assert_eq!(ParentEvent::build(None, None, None, Some("x")), "x");
    }

    #[test]
    fn build_treats_empty_explicit_id_as_present() {
        assert_eq!(ParentEvent::build(Some("g"), Some("a"), Some("v"), Some("")), "");
    }

    #[test]
    fn priority_dequeue_order() {
        assert!(EventPriority::UserTriggered.as_i32() < EventPriority::Scheduled.as_i32());
        assert!(EventPriority::Scheduled.as_i32() < EventPriority::Consolidation.as_i32());
    }

    #[test]
    fn priority_round_trips() {
        for p in [
            EventPriority::UserTriggered,
            EventPriority::Scheduled,
            EventPriority::Consolidation,
        ] {
            assert_eq!(EventPriority::from_i32(p.as_i32()), p);
        }
    }

    #[test]
    fn exhaustion_at_max_retries() {
        let mut n = MetadataNotification::new(
            ProjectVersionCoordinate::new("g", "a", "1.0.0"),
            "g_a_1.0.0",
            EventPriority::Scheduled,
            3,
        );
        assert!(!n.is_exhausted());
        n.retries = 3;
        assert!(n.is_exhausted());
    }
}
