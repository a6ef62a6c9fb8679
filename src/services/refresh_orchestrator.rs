//! Refresh orchestration.
//!
//! A refresh unit moves one coordinate through a fixed sequence: validate,
//! claim, ingest artifact files per handler, record dependencies, optionally
//! recompute the transitive closure, release. The claim is always released,
//! with the outcome recorded, on both success and failure. Fleet-wide sweeps
//! fan out over projects with bounded concurrency and isolate per-unit
//! failures.

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::handlers::{EventResponse, HandlerRegistry};
use crate::models::coordinate::{
    self, ProjectVersionCoordinate, MASTER_SNAPSHOT,
};
use crate::models::notification::ParentEvent;
use crate::models::project_version::StoreProjectVersionData;
use crate::models::refresh_status::RefreshOutcome;
use crate::repository::ArtifactRepository;
use crate::services::dependency_resolver::{self, ReportMemo, ResolveError};
use crate::services::reconciliation_service::{MismatchKind, VersionMismatch};
use crate::services::refresh_status_tracker::RefreshStatusTracker;
use crate::store::DepotStore;

/// States a refresh unit passes through, in order. Logged at each
/// transition for event-tree correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefreshState {
    Validated,
    Claimed,
    ArtifactsRefreshed,
    DependenciesRecorded,
    ClosureComputed,
    Released,
}

impl RefreshState {
    fn as_str(&self) -> &'static str {
        match self {
            RefreshState::Validated => "validated",
            RefreshState::Claimed => "claimed",
            RefreshState::ArtifactsRefreshed => "artifacts_refreshed",
            RefreshState::DependenciesRecorded => "dependencies_recorded",
            RefreshState::ClosureComputed => "closure_computed",
            RefreshState::Released => "released",
        }
    }
}

/// How one refresh unit ended.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshDisposition {
    Completed,
    /// Another live worker holds the claim; nothing was done.
    AlreadyInProgress,
    /// The unit ran and failed; the claim was released with the error.
    Failed,
}

/// Outcome of one refresh unit, suitable for API responses.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RefreshResult {
    pub coordinate: String,
    pub disposition: RefreshDisposition,
    pub messages: Vec<String>,
}

impl RefreshResult {
    fn completed(coordinate: &ProjectVersionCoordinate, response: EventResponse) -> Self {
        Self {
            coordinate: coordinate.to_string(),
            disposition: RefreshDisposition::Completed,
            messages: response.messages,
        }
    }

    fn already_in_progress(coordinate: &ProjectVersionCoordinate) -> Self {
        Self {
            coordinate: coordinate.to_string(),
            disposition: RefreshDisposition::AlreadyInProgress,
            messages: vec!["refresh already in progress".to_string()],
        }
    }

    fn failed(coordinate: &ProjectVersionCoordinate, error: &AppError) -> Self {
        Self {
            coordinate: coordinate.to_string(),
            disposition: RefreshDisposition::Failed,
            messages: vec![error.to_string()],
        }
    }
}

pub struct RefreshOrchestrator {
    store: Arc<dyn DepotStore>,
    repository: Arc<dyn ArtifactRepository>,
    registry: Arc<HandlerRegistry>,
    tracker: RefreshStatusTracker,
    sweep_concurrency: usize,
}

impl RefreshOrchestrator {
    pub fn new(
        store: Arc<dyn DepotStore>,
        repository: Arc<dyn ArtifactRepository>,
        registry: Arc<HandlerRegistry>,
        tracker: RefreshStatusTracker,
        sweep_concurrency: usize,
    ) -> Self {
        Self {
            store,
            repository,
            registry,
            tracker,
            sweep_concurrency: sweep_concurrency.max(1),
        }
    }

    // ── Single-version refresh ──────────────────────────────────────────

    /// Refresh one project version end to end.
    ///
    /// Returns `Err(InvalidCoordinate)` before any claim attempt when the
    /// coordinate is syntactically invalid. Unit failures after a
    /// successful claim come back as `RefreshDisposition::Failed`, with the
    /// claim released and the error recorded; only claim-release failures
    /// escape as `Err`.
    pub async fn refresh_version_for_project(
        &self,
        coordinate: &ProjectVersionCoordinate,
        parent_event_id: &str,
        full_update: bool,
        transitive: bool,
    ) -> Result<RefreshResult> {
        coordinate.validate()?;
        self.trace_state(coordinate, parent_event_id, RefreshState::Validated);

        if !self.tracker.claim(coordinate).await? {
            return Ok(RefreshResult::already_in_progress(coordinate));
        }
        self.trace_state(coordinate, parent_event_id, RefreshState::Claimed);

        let unit = self
            .run_refresh_unit(coordinate, parent_event_id, full_update, transitive)
            .await;

        let result = match unit {
            Ok(response) => {
                self.tracker
                    .release(coordinate, RefreshOutcome::Completed, None)
                    .await?;
                RefreshResult::completed(coordinate, response)
            }
            Err(e) => {
                tracing::warn!(
                    coordinate = %coordinate,
                    parent_event_id,
                    "Refresh unit failed: {e}"
                );
                self.tracker
                    .release(coordinate, RefreshOutcome::Failed, Some(&e.to_string()))
                    .await?;
                RefreshResult::failed(coordinate, &e)
            }
        };
        self.trace_state(coordinate, parent_event_id, RefreshState::Released);
        Ok(result)
    }

    /// The work done while the claim is held. Aborts at the first handler
    /// or store failure; completed handler writes are not rolled back, the
    /// retried unit simply re-applies them.
    async fn run_refresh_unit(
        &self,
        coordinate: &ProjectVersionCoordinate,
        parent_event_id: &str,
        full_update: bool,
        transitive: bool,
    ) -> Result<EventResponse> {
        let mut response = EventResponse::new();
        for handler in self.registry.handlers() {
            let files = self
                .repository
                .find_files(
                    handler.artifact_type(),
                    &coordinate.group_id,
                    &coordinate.artifact_id,
                    &coordinate.version_id,
                )
                .await?;
            let handled = handler
                .refresh_project_version_artifacts(coordinate, &files, full_update)
                .await?;
            response.merge(handled);
        }
        self.trace_state(coordinate, parent_event_id, RefreshState::ArtifactsRefreshed);

        self.record_project_version(coordinate).await?;
        self.trace_state(coordinate, parent_event_id, RefreshState::DependenciesRecorded);

        if transitive {
            self.recompute_closure(coordinate).await?;
            self.trace_state(coordinate, parent_event_id, RefreshState::ClosureComputed);
        }
        Ok(response)
    }

    /// Upsert the version record with the repository's declared direct
    /// dependencies, preserving flags on an existing row.
    async fn record_project_version(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        let direct = self
            .repository
            .find_dependencies(
                &coordinate.group_id,
                &coordinate.artifact_id,
                &coordinate.version_id,
            )
            .await?;

        let data = match self.store.find_project_version(coordinate).await? {
            Some(mut existing) => {
                existing.direct_dependencies = direct;
                existing.updated_at = chrono::Utc::now();
                existing
            }
            None => StoreProjectVersionData::new(coordinate.clone(), direct),
        };
        self.store.upsert_project_version(&data).await
    }

    /// Recompute and persist the subject's closure report.
    ///
    /// A missing dependency yields a persisted invalid report and does not
    /// fail the unit. A dependency cycle is an unexpected traversal failure
    /// and does fail it.
    async fn recompute_closure(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        let (deps, _excluded) = self.store.load_dependency_map().await?;
        let mut memo = ReportMemo::new();
        let report = dependency_resolver::compute_transitive_closure(coordinate, &deps, &mut memo)
            .map_err(|ResolveError::Cycle(at)| {
                AppError::DependencyCycle(format!("cycle through {at}"))
            })?;
        if !report.valid {
            tracing::warn!(
                coordinate = %coordinate,
                "Transitive closure is invalid (missing dependency)"
            );
        }
        self.store.save_transitive_report(coordinate, &report).await
    }

    // ── Per-project refresh ─────────────────────────────────────────────

    /// Refresh versions of one project, oldest first.
    ///
    /// With `all_versions` false, only repository versions not yet stored
    /// are refreshed. Per-version failures are isolated into their
    /// `RefreshResult`; the remaining versions still run.
    pub async fn refresh_all_versions_for_project(
        &self,
        group_id: &str,
        artifact_id: &str,
        parent_event_id: Option<&str>,
        all_versions: bool,
        full_update: bool,
        transitive: bool,
    ) -> Result<Vec<RefreshResult>> {
        coordinate::validate_pair(group_id, artifact_id)?;
        let parent_event_id = ParentEvent::build(
            Some(group_id),
            Some(artifact_id),
            None,
            parent_event_id,
        );

        let mut versions = self.repository.find_versions(group_id, artifact_id).await?;
        if !all_versions {
            let stored: std::collections::HashSet<String> = self
                .store
                .list_project_versions(group_id, artifact_id)
                .await?
                .into_iter()
                .map(|v| v.coordinate.version_id)
                .collect();
            versions.retain(|v| !stored.contains(v));
        }
        versions.sort_by(|a, b| coordinate::version_precedence(a, b));

        let mut results = Vec::with_capacity(versions.len());
        for version in versions {
            let coord = ProjectVersionCoordinate::new(group_id, artifact_id, version);
            let result = match self
                .refresh_version_for_project(&coord, &parent_event_id, full_update, transitive)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(coordinate = %coord, "Refresh aborted: {e}");
                    RefreshResult::failed(&coord, &e)
                }
            };
            results.push(result);
        }
        Ok(results)
    }

    // ── Fleet-wide sweeps ───────────────────────────────────────────────

    /// Refresh versions of every stored project, with bounded concurrency
    /// across projects.
    pub async fn refresh_all_versions_for_all_projects(
        &self,
        all_versions: bool,
        full_update: bool,
        transitive: bool,
    ) -> Result<Vec<RefreshResult>> {
        let parent = ParentEvent::UpdateAllProjectAllVersions.as_str();
        let projects = self.store.list_all_projects().await?;
        let results = stream::iter(projects)
            .map(|(group_id, artifact_id)| async move {
                match self
                    .refresh_all_versions_for_project(
                        &group_id,
                        &artifact_id,
                        Some(parent),
                        all_versions,
                        full_update,
                        transitive,
                    )
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(
                            group_id,
                            artifact_id,
                            "Project sweep unit failed: {e}"
                        );
                        Vec::new()
                    }
                }
            })
            .buffer_unordered(self.sweep_concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(results.into_iter().flatten().collect())
    }

    /// Refresh the default mutable snapshot of every stored project.
    pub async fn refresh_default_snapshots_for_all_projects(&self) -> Result<Vec<RefreshResult>> {
        let parent = ParentEvent::UpdateAllProjectAllSnapshots.as_str();
        let projects = self.store.list_all_projects().await?;
        let results = stream::iter(projects)
            .map(|(group_id, artifact_id)| async move {
                let coord =
                    ProjectVersionCoordinate::new(&group_id, &artifact_id, MASTER_SNAPSHOT);
                match self
                    .refresh_version_for_project(&coord, parent, false, false)
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(coordinate = %coord, "Snapshot sweep unit failed: {e}");
                        RefreshResult::failed(&coord, &e)
                    }
                }
            })
            .buffer_unordered(self.sweep_concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(results)
    }

    /// Re-ingest artifacts for every stored, active version. Evicted,
    /// excluded and deprecated versions are skipped.
    pub async fn refresh_all_project_revisions_artifacts(&self) -> Result<Vec<RefreshResult>> {
        let parent = ParentEvent::RefreshAllVersionArtifactsSchedule.as_str();
        let projects = self.store.list_all_projects().await?;

        let mut coordinates = Vec::new();
        for (group_id, artifact_id) in projects {
            let versions = self
                .store
                .list_project_versions(&group_id, &artifact_id)
                .await?;
            coordinates.extend(
                versions
                    .into_iter()
                    .filter(|v| !v.evicted && !v.excluded && !v.deprecated)
                    .map(|v| v.coordinate),
            );
        }

        let results = stream::iter(coordinates)
            .map(|coord| async move {
                match self
                    .refresh_version_for_project(&coord, parent, false, false)
                    .await
                {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!(coordinate = %coord, "Revision sweep unit failed: {e}");
                        RefreshResult::failed(&coord, &e)
                    }
                }
            })
            .buffer_unordered(self.sweep_concurrency)
            .collect::<Vec<_>>()
            .await;
        Ok(results)
    }

    // ── Reconciliation-driven refresh ───────────────────────────────────

    /// Refresh every stored project, picking up only versions the store
    /// does not have yet.
    pub async fn refresh_projects_with_missing_versions(&self) -> Result<Vec<RefreshResult>> {
        self.refresh_all_versions_for_all_projects(false, false, false)
            .await
    }

    /// Refresh the coordinates a reconciliation pass found missing in the
    /// store. Other mismatch kinds require operator action and are skipped.
    pub async fn refresh_projects_version_mismatches(
        &self,
        mismatches: &[VersionMismatch],
    ) -> Result<Vec<RefreshResult>> {
        let mut results = Vec::new();
        for mismatch in mismatches {
            if mismatch.kind != MismatchKind::MissingInStore {
                continue;
            }
            let coord = &mismatch.coordinate;
            let parent = ParentEvent::build(
                Some(&coord.group_id),
                Some(&coord.artifact_id),
                Some(&coord.version_id),
                None,
            );
            let result = match self
                .refresh_version_for_project(coord, &parent, false, false)
                .await
            {
                Ok(r) => r,
                Err(e) => RefreshResult::failed(coord, &e),
            };
            results.push(result);
        }
        Ok(results)
    }

    fn trace_state(
        &self,
        coordinate: &ProjectVersionCoordinate,
        parent_event_id: &str,
        state: RefreshState,
    ) {
        tracing::debug!(
            coordinate = %coordinate,
            parent_event_id,
            state = state.as_str(),
            "Refresh state transition"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{ArtifactType, FileHandle};
    use crate::store::memory::MemoryDepotStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Repository stub backed by in-memory tables, counting calls.
    #[derive(Default)]
    struct FakeRepository {
        files: Mutex<HashMap<(String, String, String), Vec<FileHandle>>>,
        versions: Mutex<HashMap<(String, String), Vec<String>>>,
        dependencies: Mutex<HashMap<(String, String, String), Vec<ProjectVersionCoordinate>>>,
        calls: AtomicUsize,
        fail_files: Mutex<bool>,
    }

    impl FakeRepository {
        fn key(g: &str, a: &str, v: &str) -> (String, String, String) {
            (g.to_string(), a.to_string(), v.to_string())
        }

        fn publish(&self, g: &str, a: &str, v: &str, files: Vec<FileHandle>) {
            self.files.lock().unwrap().insert(Self::key(g, a, v), files);
            self.versions
                .lock()
                .unwrap()
                .entry((g.to_string(), a.to_string()))
                .or_default()
                .push(v.to_string());
        }

        fn declare_deps(&self, g: &str, a: &str, v: &str, deps: Vec<ProjectVersionCoordinate>) {
            self.dependencies
                .lock()
                .unwrap()
                .insert(Self::key(g, a, v), deps);
        }

        fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtifactRepository for FakeRepository {
        async fn find_files(
            &self,
            _artifact_type: ArtifactType,
            g: &str,
            a: &str,
            v: &str,
        ) -> Result<Vec<FileHandle>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if *self.fail_files.lock().unwrap() {
                return Err(AppError::RepositoryUnavailable("stub outage".to_string()));
            }
            Ok(self
                .files
                .lock()
                .unwrap()
                .get(&Self::key(g, a, v))
                .cloned()
                .unwrap_or_default())
        }

        async fn find_versions(&self, g: &str, a: &str) -> Result<Vec<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .versions
                .lock()
                .unwrap()
                .get(&(g.to_string(), a.to_string()))
                .cloned()
                .unwrap_or_default())
        }

        async fn find_dependencies(
            &self,
            g: &str,
            a: &str,
            v: &str,
        ) -> Result<Vec<ProjectVersionCoordinate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .dependencies
                .lock()
                .unwrap()
                .get(&Self::key(g, a, v))
                .cloned()
                .unwrap_or_default())
        }
    }

    struct Fixture {
        store: Arc<MemoryDepotStore>,
        repository: Arc<FakeRepository>,
        orchestrator: RefreshOrchestrator,
    }

    fn fixture() -> Fixture {
        let store: Arc<MemoryDepotStore> = Arc::new(MemoryDepotStore::new());
        let repository = Arc::new(FakeRepository::default());
        let registry = Arc::new(HandlerRegistry::default_set(store.clone()));
        let tracker =
            RefreshStatusTracker::new(store.clone(), std::time::Duration::from_secs(3600));
        let orchestrator = RefreshOrchestrator::new(
            store.clone(),
            repository.clone(),
            registry,
            tracker,
            4,
        );
        Fixture {
            store,
            repository,
            orchestrator,
        }
    }

    fn coord(v: &str) -> ProjectVersionCoordinate {
        ProjectVersionCoordinate::new("org.example", "core", v)
    }

    fn file(path: &str) -> FileHandle {
        FileHandle {
            path: path.to_string(),
            checksum_sha256: "abc".to_string(),
            size_bytes: 1,
        }
    }

    #[tokio::test]
    async fn refresh_ingests_files_and_records_version() {
        let f = fixture();
        f.repository
            .publish("org.example", "core", "1.0.0", vec![file("entities/x.json")]);

        let result = f
            .orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "test", false, false)
            .await
            .unwrap();
        assert_eq!(result.disposition, RefreshDisposition::Completed);

        let stored = f.store.find_project_version(&coord("1.0.0")).await.unwrap();
        assert!(stored.is_some());
        let checksums = f
            .store
            .stored_checksums(&coord("1.0.0"), ArtifactType::Entities)
            .await
            .unwrap();
        assert_eq!(checksums.len(), 1);
    }

    #[tokio::test]
    async fn invalid_coordinate_fails_before_any_claim() {
        let f = fixture();
        let bad = ProjectVersionCoordinate::new("bad group", "core", "1.0.0");

        let err = f
            .orchestrator
            .refresh_version_for_project(&bad, "test", false, false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidCoordinate(_)));
        assert_eq!(f.repository.call_count(), 0);
        assert!(f.store.find_refresh_status(&bad).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn held_claim_returns_already_in_progress_without_repository_calls() {
        let f = fixture();
        assert!(f
            .store
            .compare_and_set_claim(&coord("1.0.0"), std::time::Duration::from_secs(3600))
            .await
            .unwrap());

        let result = f
            .orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "test", false, false)
            .await
            .unwrap();
        assert_eq!(result.disposition, RefreshDisposition::AlreadyInProgress);
        assert_eq!(f.repository.call_count(), 0);
    }

    #[tokio::test]
    async fn failed_unit_releases_claim_with_error() {
        let f = fixture();
        *f.repository.fail_files.lock().unwrap() = true;

        let result = f
            .orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "test", false, false)
            .await
            .unwrap();
        assert_eq!(result.disposition, RefreshDisposition::Failed);

        let status = f
            .store
            .find_refresh_status(&coord("1.0.0"))
            .await
            .unwrap()
            .unwrap();
        assert!(!status.in_progress);
        assert_eq!(status.last_outcome, Some(RefreshOutcome::Failed));
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn transitive_refresh_persists_closure() {
        let f = fixture();
        f.repository
            .publish("org.example", "dep", "1.0.0", vec![file("entities/d.json")]);
        f.repository
            .publish("org.example", "core", "1.0.0", vec![file("entities/x.json")]);
        f.repository.declare_deps(
            "org.example",
            "core",
            "1.0.0",
            vec![ProjectVersionCoordinate::new("org.example", "dep", "1.0.0")],
        );

        let dep = ProjectVersionCoordinate::new("org.example", "dep", "1.0.0");
        f.orchestrator
            .refresh_version_for_project(&dep, "test", false, false)
            .await
            .unwrap();
        let result = f
            .orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "test", false, true)
            .await
            .unwrap();
        assert_eq!(result.disposition, RefreshDisposition::Completed);

        let stored = f
            .store
            .find_project_version(&coord("1.0.0"))
            .await
            .unwrap()
            .unwrap();
        let report = stored.transitive_report.unwrap();
        assert!(report.valid);
        assert_eq!(
            report.transitive_dependencies,
            [dep].into_iter().collect()
        );
    }

    #[tokio::test]
    async fn missing_dependency_persists_invalid_report_without_failing() {
        let f = fixture();
        f.repository
            .publish("org.example", "core", "1.0.0", vec![file("entities/x.json")]);
        f.repository.declare_deps(
            "org.example",
            "core",
            "1.0.0",
            vec![ProjectVersionCoordinate::new("org.example", "ghost", "9.9.9")],
        );

        let result = f
            .orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "test", false, true)
            .await
            .unwrap();
        assert_eq!(result.disposition, RefreshDisposition::Completed);

        let stored = f
            .store
            .find_project_version(&coord("1.0.0"))
            .await
            .unwrap()
            .unwrap();
        let report = stored.transitive_report.unwrap();
        assert!(!report.valid);
        assert!(report.transitive_dependencies.is_empty());
    }

    #[tokio::test]
    async fn project_refresh_picks_up_only_new_versions_oldest_first() {
        let f = fixture();
        f.repository
            .publish("org.example", "core", "1.10.0", vec![file("entities/x.json")]);
        f.repository
            .publish("org.example", "core", "1.9.0", vec![file("entities/x.json")]);
        f.repository
            .publish("org.example", "core", "1.0.0", vec![file("entities/x.json")]);

        // 1.0.0 already stored: only the two newer versions run.
        f.orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "test", false, false)
            .await
            .unwrap();

        let results = f
            .orchestrator
            .refresh_all_versions_for_project("org.example", "core", None, false, false, false)
            .await
            .unwrap();
        let coords: Vec<&str> = results.iter().map(|r| r.coordinate.as_str()).collect();
        assert_eq!(
            coords,
            ["org.example:core:1.9.0", "org.example:core:1.10.0"]
        );
    }

    #[tokio::test]
    async fn fleet_sweep_covers_every_stored_project() {
        let f = fixture();
        for artifact in ["core", "extras"] {
            f.repository
                .publish("org.example", artifact, "1.0.0", vec![file("entities/x.json")]);
            f.orchestrator
                .refresh_version_for_project(
                    &ProjectVersionCoordinate::new("org.example", artifact, "1.0.0"),
                    "seed",
                    false,
                    false,
                )
                .await
                .unwrap();
        }
        f.repository
            .publish("org.example", "core", "2.0.0", vec![file("entities/x.json")]);

        let results = f
            .orchestrator
            .refresh_all_versions_for_all_projects(false, false, false)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].coordinate, "org.example:core:2.0.0");
    }

    #[tokio::test]
    async fn snapshot_sweep_targets_the_default_snapshot() {
        let f = fixture();
        f.repository
            .publish("org.example", "core", "1.0.0", vec![file("entities/x.json")]);
        f.orchestrator
            .refresh_version_for_project(&coord("1.0.0"), "seed", false, false)
            .await
            .unwrap();
        f.repository.publish(
            "org.example",
            "core",
            MASTER_SNAPSHOT,
            vec![file("entities/s.json")],
        );

        let results = f
            .orchestrator
            .refresh_default_snapshots_for_all_projects()
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].coordinate, "org.example:core:master-SNAPSHOT");
        assert_eq!(results[0].disposition, RefreshDisposition::Completed);
    }

    #[tokio::test]
    async fn revision_sweep_skips_flagged_versions() {
        let f = fixture();
        for v in ["1.0.0", "2.0.0"] {
            f.repository
                .publish("org.example", "core", v, vec![file("entities/x.json")]);
            f.orchestrator
                .refresh_version_for_project(&coord(v), "seed", false, false)
                .await
                .unwrap();
        }
        f.store.set_evicted(&coord("1.0.0"), true).await.unwrap();

        let results = f
            .orchestrator
            .refresh_all_project_revisions_artifacts()
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].coordinate, "org.example:core:2.0.0");
    }

    #[tokio::test]
    async fn mismatch_refresh_only_handles_missing_in_store() {
        let f = fixture();
        f.repository
            .publish("org.example", "core", "2.0.0", vec![file("entities/x.json")]);

        let mismatches = vec![
            VersionMismatch {
                coordinate: coord("2.0.0"),
                kind: MismatchKind::MissingInStore,
            },
            VersionMismatch {
                coordinate: coord("3.0.0"),
                kind: MismatchKind::MissingInRepository,
            },
        ];
        let results = f
            .orchestrator
            .refresh_projects_version_mismatches(&mismatches)
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].coordinate, "org.example:core:2.0.0");
        assert_eq!(results[0].disposition, RefreshDisposition::Completed);
    }
}
