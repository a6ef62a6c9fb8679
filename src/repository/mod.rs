//! Remote artifact repository collaborator.

pub mod maven;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;

/// The artifact types this depot ingests for every project version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactType {
    Entities,
    VersionedEntities,
    FileGenerations,
    ArtifactGenerations,
}

impl ArtifactType {
    pub const ALL: [ArtifactType; 4] = [
        ArtifactType::Entities,
        ArtifactType::VersionedEntities,
        ArtifactType::FileGenerations,
        ArtifactType::ArtifactGenerations,
    ];

    /// Directory prefix the repository publishes this type's files under.
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactType::Entities => "entities",
            ArtifactType::VersionedEntities => "versioned-entities",
            ArtifactType::FileGenerations => "file-generations",
            ArtifactType::ArtifactGenerations => "artifact-generations",
        }
    }
}

impl std::fmt::Display for ArtifactType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file published by the remote repository for one project version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHandle {
    pub path: String,
    pub checksum_sha256: String,
    pub size_bytes: i64,
}

/// Read-only contract against the remote artifact repository.
///
/// Calls block on network I/O and may fail on transient unavailability;
/// such failures are retryable for the current unit, never fatal to the
/// process.
#[async_trait]
pub trait ArtifactRepository: Send + Sync {
    /// List the published files of one artifact type for a version.
    async fn find_files(
        &self,
        artifact_type: ArtifactType,
        group_id: &str,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<Vec<FileHandle>>;

    /// List every version the repository knows for a project.
    async fn find_versions(&self, group_id: &str, artifact_id: &str) -> Result<Vec<String>>;

    /// Direct dependencies declared in the version's descriptor.
    async fn find_dependencies(
        &self,
        group_id: &str,
        artifact_id: &str,
        version_id: &str,
    ) -> Result<Vec<ProjectVersionCoordinate>>;
}
