//! Store-backed handler used for all built-in artifact types.
//!
//! Entities, versioned entities, file generations and artifact generations
//! all ingest the same way: write the published file set into the store,
//! skipping release files whose checksum already matches. The handler is
//! instantiated once per artifact type; bespoke types can implement
//! `ArtifactHandler` directly and register alongside these.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::handlers::{ArtifactHandler, EventResponse};
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::repository::{ArtifactType, FileHandle};
use crate::store::DepotStore;

pub struct StoredArtifactHandler {
    artifact_type: ArtifactType,
    store: Arc<dyn DepotStore>,
}

impl StoredArtifactHandler {
    pub fn new(artifact_type: ArtifactType, store: Arc<dyn DepotStore>) -> Self {
        Self {
            artifact_type,
            store,
        }
    }
}

#[async_trait]
impl ArtifactHandler for StoredArtifactHandler {
    fn artifact_type(&self) -> ArtifactType {
        self.artifact_type
    }

    async fn refresh_project_version_artifacts(
        &self,
        coordinate: &ProjectVersionCoordinate,
        files: &[FileHandle],
        full_update: bool,
    ) -> Result<EventResponse> {
        // Release versions are immutable: unchanged checksums can be
        // skipped. Snapshots are republished in place, so every file is
        // re-ingested on every refresh.
        let reuse_stored = !full_update && !coordinate.is_snapshot();
        let stored = if reuse_stored {
            self.store
                .stored_checksums(coordinate, self.artifact_type)
                .await?
        } else {
            Default::default()
        };

        let mut ingested = 0usize;
        let mut skipped = 0usize;
        for file in files {
            let unchanged = stored
                .get(&file.path)
                .is_some_and(|sum| !sum.is_empty() && *sum == file.checksum_sha256);
            if reuse_stored && unchanged {
                skipped += 1;
                continue;
            }
            self.store
                .upsert_artifact_file(coordinate, self.artifact_type, file)
                .await?;
            ingested += 1;
        }

        tracing::debug!(
            coordinate = %coordinate,
            artifact_type = %self.artifact_type,
            ingested,
            skipped,
            "Refreshed artifact files"
        );
        Ok(EventResponse::with_message(format!(
            "{}: ingested {ingested} file(s), skipped {skipped}",
            self.artifact_type
        )))
    }

    async fn delete(&self, coordinate: &ProjectVersionCoordinate) -> Result<u64> {
        self.store
            .delete_artifact_files(coordinate, self.artifact_type)
            .await
    }
}
