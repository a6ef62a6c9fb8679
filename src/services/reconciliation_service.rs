//! Version reconciliation between store and repository.
//!
//! Read-only: comparison never mutates either side. Remediation is a
//! separate, explicit step driven by the orchestrator or an operator.

use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::repository::ArtifactRepository;
use crate::store::DepotStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MismatchKind {
    /// Published in the repository, absent from the store.
    MissingInStore,
    /// Stored but no longer published. Possible repository data loss.
    MissingInRepository,
    /// Stored with the excluded flag while still published.
    ExcludedButPresent,
}

#[derive(Debug, Clone, Serialize)]
pub struct VersionMismatch {
    pub coordinate: ProjectVersionCoordinate,
    pub kind: MismatchKind,
}

pub struct VersionsReconciliationService {
    store: Arc<dyn DepotStore>,
    repository: Arc<dyn ArtifactRepository>,
}

impl VersionsReconciliationService {
    pub fn new(store: Arc<dyn DepotStore>, repository: Arc<dyn ArtifactRepository>) -> Self {
        Self { store, repository }
    }

    /// Compare every stored project's version set against the repository.
    ///
    /// Snapshots are not compared: they are mutable aliases, not published
    /// versions, so their presence on either side is not a mismatch.
    /// Evicted versions are expected to be absent from the repository. A
    /// project whose repository listing is unavailable is skipped with a
    /// warning rather than failing the whole pass.
    pub async fn find_versions_mismatches(&self) -> Result<Vec<VersionMismatch>> {
        let mut mismatches = Vec::new();
        for (group_id, artifact_id) in self.store.list_all_projects().await? {
            match self.reconcile_project(&group_id, &artifact_id).await {
                Ok(found) => mismatches.extend(found),
                Err(AppError::RepositoryUnavailable(msg)) => {
                    tracing::warn!(
                        group_id,
                        artifact_id,
                        "Skipping reconciliation, repository unavailable: {msg}"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(mismatches)
    }

    async fn reconcile_project(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<VersionMismatch>> {
        let published: HashSet<String> = self
            .repository
            .find_versions(group_id, artifact_id)
            .await?
            .into_iter()
            .collect();
        let stored = self.store.list_project_versions(group_id, artifact_id).await?;

        let mut mismatches = Vec::new();
        let mut stored_versions = HashSet::new();
        for record in &stored {
            let version = &record.coordinate.version_id;
            stored_versions.insert(version.clone());
            if record.coordinate.is_snapshot() {
                continue;
            }
            let is_published = published.contains(version);
            if record.excluded && is_published {
                mismatches.push(VersionMismatch {
                    coordinate: record.coordinate.clone(),
                    kind: MismatchKind::ExcludedButPresent,
                });
            } else if !is_published && !record.evicted {
                mismatches.push(VersionMismatch {
                    coordinate: record.coordinate.clone(),
                    kind: MismatchKind::MissingInRepository,
                });
            }
        }

        for version in published {
            if version.ends_with(crate::models::coordinate::SNAPSHOT_SUFFIX) {
                continue;
            }
            if !stored_versions.contains(&version) {
                mismatches.push(VersionMismatch {
                    coordinate: ProjectVersionCoordinate::new(group_id, artifact_id, version),
                    kind: MismatchKind::MissingInStore,
                });
            }
        }
        Ok(mismatches)
    }
}
