//! Shared fixtures for integration tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use metadata_depot::error::Result;
use metadata_depot::handlers::HandlerRegistry;
use metadata_depot::models::coordinate::ProjectVersionCoordinate;
use metadata_depot::repository::{ArtifactRepository, ArtifactType, FileHandle};
use metadata_depot::services::notification_queue::NotificationQueue;
use metadata_depot::services::refresh_orchestrator::RefreshOrchestrator;
use metadata_depot::services::refresh_status_tracker::RefreshStatusTracker;
use metadata_depot::store::memory::MemoryDepotStore;

/// In-memory repository double with call counting.
#[derive(Default)]
pub struct FakeRepository {
    files: Mutex<HashMap<(String, String, String), Vec<FileHandle>>>,
    versions: Mutex<HashMap<(String, String), Vec<String>>>,
    dependencies: Mutex<HashMap<(String, String, String), Vec<ProjectVersionCoordinate>>>,
    calls: AtomicUsize,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(g: &str, a: &str, v: &str) -> (String, String, String) {
        (g.to_string(), a.to_string(), v.to_string())
    }

    /// Register a version with one published entities file.
    pub fn publish(&self, g: &str, a: &str, v: &str) {
        self.files.lock().unwrap().insert(
            Self::key(g, a, v),
            vec![FileHandle {
                path: format!("entities/{a}-{v}.json"),
                checksum_sha256: format!("sha-{v}"),
                size_bytes: 64,
            }],
        );
        self.versions
            .lock()
            .unwrap()
            .entry((g.to_string(), a.to_string()))
            .or_default()
            .push(v.to_string());
    }

    pub fn declare_deps(&self, g: &str, a: &str, v: &str, deps: Vec<ProjectVersionCoordinate>) {
        self.dependencies
            .lock()
            .unwrap()
            .insert(Self::key(g, a, v), deps);
    }

    pub fn call_count(&self) -> usize {
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

pub struct Harness {
    pub store: Arc<MemoryDepotStore>,
    pub repository: Arc<FakeRepository>,
    pub tracker: RefreshStatusTracker,
    pub queue: NotificationQueue,
    pub orchestrator: Arc<RefreshOrchestrator>,
}

pub fn harness() -> Harness {
    let store: Arc<MemoryDepotStore> = Arc::new(MemoryDepotStore::new());
    let repository = Arc::new(FakeRepository::new());
    let registry = Arc::new(HandlerRegistry::default_set(store.clone()));
    let tracker = RefreshStatusTracker::new(store.clone(), Duration::from_secs(3600));
    let queue = NotificationQueue::new(store.clone(), 3);
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        store.clone(),
        repository.clone(),
        registry,
        tracker.clone(),
        4,
    ));
    Harness {
        store,
        repository,
        tracker,
        queue,
        orchestrator,
    }
}

pub fn coord(g: &str, a: &str, v: &str) -> ProjectVersionCoordinate {
    ProjectVersionCoordinate::new(g, a, v)
}
