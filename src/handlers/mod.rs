//! Per-artifact-type refresh handlers.
//!
//! The orchestrator is closed for modification: new artifact types register
//! a handler into the `HandlerRegistry` at startup and are picked up by
//! every refresh operation. The registry is an explicit object owned by the
//! orchestrator, not a global.

pub mod artifact_handlers;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::repository::{ArtifactType, FileHandle};
use crate::store::DepotStore;

/// Accumulated response of one or more handler invocations.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventResponse {
    pub messages: Vec<String>,
}

impl EventResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            messages: vec![message.into()],
        }
    }

    pub fn merge(&mut self, other: EventResponse) {
        self.messages.extend(other.messages);
    }
}

/// Polymorphic refresh capability for one artifact type.
///
/// Handlers are independent and idempotent-by-rerun: a failed unit is
/// simply retried and re-applies.
#[async_trait]
pub trait ArtifactHandler: Send + Sync {
    fn artifact_type(&self) -> ArtifactType;

    /// Re-ingest the published files for one project version.
    ///
    /// When `full_update` is false, release-version files whose checksum
    /// matches stored content are skipped; snapshot versions are always
    /// re-ingested.
    async fn refresh_project_version_artifacts(
        &self,
        coordinate: &ProjectVersionCoordinate,
        files: &[FileHandle],
        full_update: bool,
    ) -> Result<EventResponse>;

    /// Remove everything this handler ingested for a coordinate.
    async fn delete(&self, coordinate: &ProjectVersionCoordinate) -> Result<u64>;
}

/// Registry of artifact-type handlers, built once at startup.
pub struct HandlerRegistry {
    handlers: Vec<Arc<dyn ArtifactHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// The full default handler set over a store.
    pub fn default_set(store: Arc<dyn DepotStore>) -> Self {
        let mut registry = Self::new();
        for artifact_type in ArtifactType::ALL {
            registry.register(Arc::new(artifact_handlers::StoredArtifactHandler::new(
                artifact_type,
                store.clone(),
            )));
        }
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ArtifactHandler>) {
        self.handlers.push(handler);
    }

    pub fn handlers(&self) -> &[Arc<dyn ArtifactHandler>] {
        &self.handlers
    }

    pub fn get(&self, artifact_type: ArtifactType) -> Option<&Arc<dyn ArtifactHandler>> {
        self.handlers
            .iter()
            .find(|h| h.artifact_type() == artifact_type)
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
