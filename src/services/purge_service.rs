//! Eviction, deprecation and hard deletion of project versions.
//!
//! Every purge operation takes the coordinate's refresh claim for its own
//! duration: the same conditional write that serializes refresh workers also
//! serializes purges against them. A status read would leave a window where
//! a worker claims the coordinate mid-purge and re-ingests deleted data.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{AppError, Result};
use crate::handlers::HandlerRegistry;
use crate::models::coordinate::{self, ProjectVersionCoordinate};
use crate::models::refresh_status::RefreshOutcome;
use crate::services::refresh_status_tracker::RefreshStatusTracker;
use crate::store::DepotStore;

pub struct ArtifactPurgeService {
    store: Arc<dyn DepotStore>,
    tracker: RefreshStatusTracker,
    registry: Arc<HandlerRegistry>,
}

impl ArtifactPurgeService {
    pub fn new(
        store: Arc<dyn DepotStore>,
        tracker: RefreshStatusTracker,
        registry: Arc<HandlerRegistry>,
    ) -> Self {
        Self {
            store,
            tracker,
            registry,
        }
    }

    /// Soft-delete one version. The row stays, flagged as evicted; sweeps
    /// and closure computations skip it.
    pub async fn evict(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        coordinate.validate()?;
        self.acquire_purge_claim(coordinate).await?;
        let result = self.evict_under_claim(coordinate).await;
        self.release_purge_claim(coordinate, &result).await;
        result
    }

    async fn evict_under_claim(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        self.ensure_exists(coordinate).await?;
        self.store.set_evicted(coordinate, true).await?;
        tracing::info!(coordinate = %coordinate, "Evicted project version");
        Ok(())
    }

    /// Hard-delete one version: every handler removes its ingested files,
    /// then the row itself goes.
    pub async fn delete(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        coordinate.validate()?;
        self.acquire_purge_claim(coordinate).await?;
        let result = self.delete_under_claim(coordinate).await;
        self.release_purge_claim(coordinate, &result).await;
        result
    }

    async fn delete_under_claim(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        self.ensure_exists(coordinate).await?;

        let mut removed = 0u64;
        for handler in self.registry.handlers() {
            removed += handler.delete(coordinate).await?;
        }
        self.store.delete_project_version(coordinate).await?;
        tracing::info!(
            coordinate = %coordinate,
            files_removed = removed,
            "Deleted project version"
        );
        Ok(())
    }

    /// Flag one version deprecated. It stays served and resolvable but is
    /// skipped by refresh sweeps.
    pub async fn deprecate(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        coordinate.validate()?;
        self.acquire_purge_claim(coordinate).await?;
        let result = self.deprecate_under_claim(coordinate).await;
        self.release_purge_claim(coordinate, &result).await;
        result
    }

    async fn deprecate_under_claim(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        self.ensure_exists(coordinate).await?;
        self.store.set_deprecated(coordinate, true).await?;
        tracing::info!(coordinate = %coordinate, "Deprecated project version");
        Ok(())
    }

    /// Evict all but the newest `keep` release versions of a project.
    ///
    /// Snapshots and already-evicted versions do not count against the
    /// budget and are never touched. A version with a live in-flight
    /// refresh is skipped this round. Returns the evicted coordinates.
    pub async fn evict_oldest_project_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
        keep: usize,
    ) -> Result<Vec<ProjectVersionCoordinate>> {
        coordinate::validate_pair(group_id, artifact_id)?;

        let mut releases: Vec<ProjectVersionCoordinate> = self
            .store
            .list_project_versions(group_id, artifact_id)
            .await?
            .into_iter()
            .filter(|v| !v.evicted && !v.coordinate.is_snapshot())
            .map(|v| v.coordinate)
            .collect();
        if releases.len() <= keep {
            return Ok(Vec::new());
        }
        releases.sort_by(|a, b| coordinate::version_precedence(&a.version_id, &b.version_id));
        let surplus = releases.len() - keep;

        let mut evicted = Vec::new();
        for coord in releases.into_iter().take(surplus) {
            if !self.tracker.claim(&coord).await? {
                tracing::warn!(coordinate = %coord, "Skipping eviction, refresh in flight");
                continue;
            }
            let result = self.store.set_evicted(&coord, true).await;
            self.release_purge_claim(&coord, &result).await;
            result?;
            tracing::info!(coordinate = %coord, "Evicted old project version");
            evicted.push(coord);
        }
        Ok(evicted)
    }

    /// Evict unused release versions fleet-wide. A version counts as
    /// unused when it has been untouched for longer than `retention` and
    /// its transitive report is absent or invalid, meaning nothing resolves
    /// through it. Returns the evicted coordinates.
    pub async fn evict_versions_not_used(
        &self,
        retention: Duration,
    ) -> Result<Vec<ProjectVersionCoordinate>> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::zero());

        let mut evicted = Vec::new();
        for (group_id, artifact_id) in self.store.list_all_projects().await? {
            let versions = self
                .store
                .list_project_versions(&group_id, &artifact_id)
                .await?;
            for version in versions {
                let resolvable = version
                    .transitive_report
                    .as_ref()
                    .is_some_and(|r| r.valid);
                if version.evicted
                    || version.coordinate.is_snapshot()
                    || version.updated_at >= cutoff
                    || resolvable
                {
                    continue;
                }
                if !self.tracker.claim(&version.coordinate).await? {
                    continue;
                }
                let result = self.store.set_evicted(&version.coordinate, true).await;
                self.release_purge_claim(&version.coordinate, &result).await;
                result?;
                tracing::info!(coordinate = %version.coordinate, "Evicted unused project version");
                evicted.push(version.coordinate);
            }
        }
        Ok(evicted)
    }

    /// Take the coordinate's refresh claim for the duration of a purge.
    /// Failing to claim means a live refresh holds the coordinate.
    async fn acquire_purge_claim(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        if !self.tracker.claim(coordinate).await? {
            return Err(AppError::Conflict(format!(
                "refresh in progress for {coordinate}"
            )));
        }
        Ok(())
    }

    /// Release the purge claim on every exit path, recording the outcome.
    async fn release_purge_claim(&self, coordinate: &ProjectVersionCoordinate, result: &Result<()>) {
        let error = result.as_ref().err().map(ToString::to_string);
        let outcome = match error {
            Some(_) => RefreshOutcome::Failed,
            None => RefreshOutcome::Completed,
        };
        if let Err(e) = self
            .tracker
            .release(coordinate, outcome, error.as_deref())
            .await
        {
            tracing::error!(coordinate = %coordinate, "Failed to release purge claim: {e}");
        }
    }

    async fn ensure_exists(&self, coordinate: &ProjectVersionCoordinate) -> Result<()> {
        if self.store.find_project_version(coordinate).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "project version {coordinate} not found"
            )));
        }
        Ok(())
    }
}
