//! Storage port for the depot.
//!
//! The persistent store is the single source of truth and sole
//! synchronization point: `compare_and_set_claim` and
//! `claim_next_by_priority` must be genuinely atomic at the storage layer,
//! not emulated with read-then-write, because workers may be distributed
//! across processes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::models::notification::{DeadLetter, MetadataNotification};
use crate::models::project_version::{StoreProjectVersionData, TransitiveDependencyReport};
use crate::models::refresh_status::{RefreshOutcome, RefreshStatus};
use crate::repository::{ArtifactType, FileHandle};

/// Flat direct-dependency map used by closure computations.
pub type DependencyMap =
    HashMap<ProjectVersionCoordinate, Vec<ProjectVersionCoordinate>>;

/// Storage backend trait
#[async_trait]
pub trait DepotStore: Send + Sync {
    // ── Project versions ────────────────────────────────────────────────

    /// Create or replace the record for a coordinate.
    async fn upsert_project_version(&self, data: &StoreProjectVersionData) -> Result<()>;

    async fn find_project_version(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<StoreProjectVersionData>>;

    /// All stored versions of one project, including flagged rows.
    async fn list_project_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<StoreProjectVersionData>>;

    /// Distinct (groupId, artifactId) pairs known to the store.
    async fn list_all_projects(&self) -> Result<Vec<(String, String)>>;

    /// The fleet-wide direct-dependency map plus the set of excluded
    /// coordinates (present in the map, skipped as closure subjects).
    async fn load_dependency_map(
        &self,
    ) -> Result<(DependencyMap, HashSet<ProjectVersionCoordinate>)>;

    async fn save_transitive_report(
        &self,
        coordinate: &ProjectVersionCoordinate,
        report: &TransitiveDependencyReport,
    ) -> Result<()>;

    async fn set_evicted(&self, coordinate: &ProjectVersionCoordinate, evicted: bool)
        -> Result<()>;

    async fn set_deprecated(
        &self,
        coordinate: &ProjectVersionCoordinate,
        deprecated: bool,
    ) -> Result<()>;

    /// Hard-delete a row. Returns false when no row existed.
    async fn delete_project_version(&self, coordinate: &ProjectVersionCoordinate) -> Result<bool>;

    // ── Ingested artifact files ─────────────────────────────────────────

    /// Stored path → sha256 map for one coordinate and artifact type.
    async fn stored_checksums(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
    ) -> Result<HashMap<String, String>>;

    async fn upsert_artifact_file(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
        file: &FileHandle,
    ) -> Result<()>;

    async fn delete_artifact_files(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
    ) -> Result<u64>;

    // ── Refresh claims ──────────────────────────────────────────────────

    /// Atomically claim a coordinate for refresh.
    ///
    /// Succeeds when no claim is held, or when the held claim is older than
    /// `abandon_after` (abandonment recovery after a crashed worker).
    /// Implemented as a single conditional update, never read-then-write.
    async fn compare_and_set_claim(
        &self,
        coordinate: &ProjectVersionCoordinate,
        abandon_after: Duration,
    ) -> Result<bool>;

    /// Release a held claim, recording the outcome.
    async fn release_claim(
        &self,
        coordinate: &ProjectVersionCoordinate,
        outcome: RefreshOutcome,
        error: Option<&str>,
    ) -> Result<()>;

    async fn find_refresh_status(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<RefreshStatus>>;

    // ── Notification queue ──────────────────────────────────────────────

    /// Persist a notification, assigning an event id when absent.
    ///
    /// Upserts by event id when present, else by coordinate: re-pushing a
    /// pending coordinate overwrites the pending instance.
    async fn push_notification(&self, notification: &MetadataNotification) -> Result<Uuid>;

    /// Atomically find-and-remove the lowest-priority-value, oldest-created
    /// event. Two concurrent consumers never receive the same event.
    async fn claim_next_by_priority(&self) -> Result<Option<MetadataNotification>>;

    async fn queue_size(&self) -> Result<i64>;

    async fn all_notifications(&self) -> Result<Vec<MetadataNotification>>;

    async fn delete_all_notifications(&self) -> Result<u64>;

    async fn push_dead_letter(&self, dead_letter: &DeadLetter) -> Result<()>;

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>>;

    // ── Schedule leases ─────────────────────────────────────────────────

    /// Take (or renew an expired) lease for a named job. Returns false when
    /// a live lease is held elsewhere.
    async fn acquire_schedule_lease(&self, name: &str, ttl: Duration) -> Result<bool>;

    async fn release_schedule_lease(&self, name: &str) -> Result<()>;
}
