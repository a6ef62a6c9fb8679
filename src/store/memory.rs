//! In-memory store.
//!
//! Used by tests and local development. A single mutex over the whole state
//! gives every operation the same atomicity the Postgres implementation
//! gets from conditional updates and `FOR UPDATE SKIP LOCKED`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::models::notification::{DeadLetter, MetadataNotification};
use crate::models::project_version::{StoreProjectVersionData, TransitiveDependencyReport};
use crate::models::refresh_status::{RefreshOutcome, RefreshStatus};
use crate::repository::{ArtifactType, FileHandle};
use crate::store::{DependencyMap, DepotStore};

#[derive(Default)]
struct Inner {
    project_versions: BTreeMap<ProjectVersionCoordinate, StoreProjectVersionData>,
    artifact_files:
        HashMap<(ProjectVersionCoordinate, ArtifactType), HashMap<String, FileHandle>>,
    refresh_status: HashMap<ProjectVersionCoordinate, RefreshStatus>,
    queue: Vec<MetadataNotification>,
    dead: Vec<DeadLetter>,
    leases: HashMap<String, chrono::DateTime<Utc>>,
}

/// In-memory `DepotStore` implementation.
#[derive(Default)]
pub struct MemoryDepotStore {
    inner: Mutex<Inner>,
}

impl MemoryDepotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepotStore for MemoryDepotStore {
    async fn upsert_project_version(&self, data: &StoreProjectVersionData) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .project_versions
            .insert(data.coordinate.clone(), data.clone());
        Ok(())
    }

    async fn find_project_version(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<StoreProjectVersionData>> {
        let inner = self.inner.lock().await;
        Ok(inner.project_versions.get(coordinate).cloned())
    }

    async fn list_project_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<StoreProjectVersionData>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .project_versions
            .values()
            .filter(|d| d.coordinate.group_id == group_id && d.coordinate.artifact_id == artifact_id)
            .cloned()
            .collect())
    }

    async fn list_all_projects(&self) -> Result<Vec<(String, String)>> {
        let inner = self.inner.lock().await;
        let mut pairs: Vec<(String, String)> = inner
            .project_versions
            .keys()
            .map(|c| (c.group_id.clone(), c.artifact_id.clone()))
            .collect();
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }

    async fn load_dependency_map(
        &self,
    ) -> Result<(DependencyMap, HashSet<ProjectVersionCoordinate>)> {
        let inner = self.inner.lock().await;
        let mut map = DependencyMap::new();
        let mut excluded = HashSet::new();
        for (coord, data) in &inner.project_versions {
            map.insert(coord.clone(), data.direct_dependencies.clone());
            if data.excluded {
                excluded.insert(coord.clone());
            }
        }
        Ok((map, excluded))
    }

    async fn save_transitive_report(
        &self,
        coordinate: &ProjectVersionCoordinate,
        report: &TransitiveDependencyReport,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(data) = inner.project_versions.get_mut(coordinate) {
            data.transitive_report = Some(report.clone());
            data.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_evicted(
        &self,
        coordinate: &ProjectVersionCoordinate,
        evicted: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(data) = inner.project_versions.get_mut(coordinate) {
            data.evicted = evicted;
            data.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn set_deprecated(
        &self,
        coordinate: &ProjectVersionCoordinate,
        deprecated: bool,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        if let Some(data) = inner.project_versions.get_mut(coordinate) {
            data.deprecated = deprecated;
            data.updated_at = Utc::now();
        }
        Ok(())
    }

    async fn delete_project_version(&self, coordinate: &ProjectVersionCoordinate) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner.project_versions.remove(coordinate).is_some())
    }

    async fn stored_checksums(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
    ) -> Result<HashMap<String, String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .artifact_files
            .get(&(coordinate.clone(), artifact_type))
            .map(|files| {
                files
                    .values()
                    .map(|f| (f.path.clone(), f.checksum_sha256.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn upsert_artifact_file(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
        file: &FileHandle,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .artifact_files
            .entry((coordinate.clone(), artifact_type))
            .or_default()
            .insert(file.path.clone(), file.clone());
        Ok(())
    }

    async fn delete_artifact_files(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
    ) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .artifact_files
            .remove(&(coordinate.clone(), artifact_type))
            .map(|files| files.len() as u64)
            .unwrap_or(0))
    }

    async fn compare_and_set_claim(
        &self,
        coordinate: &ProjectVersionCoordinate,
        abandon_after: Duration,
    ) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let status = inner
            .refresh_status
            .entry(coordinate.clone())
            .or_insert_with(|| RefreshStatus {
                coordinate: coordinate.clone(),
                in_progress: false,
                claimed_at: None,
                last_refresh_time: None,
                last_outcome: None,
                last_error: None,
                retry_count: 0,
                updated_at: now,
            });

        let abandoned = status
            .claimed_at
            .and_then(|t| now.signed_duration_since(t).to_std().ok())
            .map(|age| age > abandon_after)
            .unwrap_or(false);

        if status.in_progress && !abandoned {
            return Ok(false);
        }
        status.in_progress = true;
        status.claimed_at = Some(now);
        status.updated_at = now;
        Ok(true)
    }

    async fn release_claim(
        &self,
        coordinate: &ProjectVersionCoordinate,
        outcome: RefreshOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        if let Some(status) = inner.refresh_status.get_mut(coordinate) {
            status.in_progress = false;
            status.claimed_at = None;
            status.last_refresh_time = Some(now);
            status.last_outcome = Some(outcome);
            status.last_error = error.map(str::to_string);
            status.retry_count = match outcome {
                RefreshOutcome::Failed => status.retry_count + 1,
                RefreshOutcome::Completed => 0,
            };
            status.updated_at = now;
        }
        Ok(())
    }

    async fn find_refresh_status(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<RefreshStatus>> {
        let inner = self.inner.lock().await;
        Ok(inner.refresh_status.get(coordinate).cloned())
    }

    async fn push_notification(&self, notification: &MetadataNotification) -> Result<Uuid> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();

        // Upsert by event id when present, falling back to the coordinate:
        // re-pushing a dequeued event merges into any newer pending event
        // that took the coordinate's slot in the meantime.
        let existing = inner.queue.iter_mut().find(|n| match notification.event_id {
            Some(id) => n.event_id == Some(id) || n.coordinate == notification.coordinate,
            None => n.coordinate == notification.coordinate,
        });

        match existing {
            Some(pending) => {
                let id = pending.event_id.unwrap_or_else(Uuid::new_v4);
                let created = pending.created;
                let priority = pending.priority.min(notification.priority);
                *pending = notification.clone();
                pending.event_id = Some(id);
                pending.created = created;
                pending.priority = priority;
                pending.last_updated = now;
                Ok(id)
            }
            None => {
                let id = notification.event_id.unwrap_or_else(Uuid::new_v4);
                let mut fresh = notification.clone();
                fresh.event_id = Some(id);
                fresh.last_updated = now;
                inner.queue.push(fresh);
                Ok(id)
            }
        }
    }

    async fn claim_next_by_priority(&self) -> Result<Option<MetadataNotification>> {
        let mut inner = self.inner.lock().await;
        let next = inner
            .queue
            .iter()
            .enumerate()
            .min_by_key(|(_, n)| (n.priority.as_i32(), n.created, n.event_id))
            .map(|(i, _)| i);
        Ok(next.map(|i| inner.queue.remove(i)))
    }

    async fn queue_size(&self) -> Result<i64> {
        let inner = self.inner.lock().await;
        Ok(inner.queue.len() as i64)
    }

    async fn all_notifications(&self) -> Result<Vec<MetadataNotification>> {
        let inner = self.inner.lock().await;
        let mut all = inner.queue.clone();
        all.sort_by_key(|n| (n.priority.as_i32(), n.created));
        Ok(all)
    }

    async fn delete_all_notifications(&self) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let count = inner.queue.len() as u64;
        inner.queue.clear();
        Ok(count)
    }

    async fn push_dead_letter(&self, dead_letter: &DeadLetter) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.dead.push(dead_letter.clone());
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let inner = self.inner.lock().await;
        Ok(inner.dead.clone())
    }

    async fn acquire_schedule_lease(&self, name: &str, ttl: Duration) -> Result<bool> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        if let Some(expires) = inner.leases.get(name) {
            if *expires > now {
                return Ok(false);
            }
        }
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::zero());
        inner.leases.insert(name.to_string(), now + ttl);
        Ok(true)
    }

    async fn release_schedule_lease(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.leases.remove(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(v: &str) -> ProjectVersionCoordinate {
        ProjectVersionCoordinate::new("org.example", "depot", v)
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_released() {
        let store = MemoryDepotStore::new();
        let c = coord("1.0.0");
        assert!(store
            .compare_and_set_claim(&c, Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .compare_and_set_claim(&c, Duration::from_secs(60))
            .await
            .unwrap());

        store
            .release_claim(&c, RefreshOutcome::Completed, None)
            .await
            .unwrap();
        assert!(store
            .compare_and_set_claim(&c, Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn abandoned_claim_is_reclaimable() {
        let store = MemoryDepotStore::new();
        let c = coord("1.0.0");
        assert!(store
            .compare_and_set_claim(&c, Duration::from_secs(0))
            .await
            .unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Threshold of zero: the earlier claim is already abandoned.
        assert!(store
            .compare_and_set_claim(&c, Duration::from_secs(0))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn failed_release_increments_retry_count() {
        let store = MemoryDepotStore::new();
        let c = coord("1.0.0");
        store
            .compare_and_set_claim(&c, Duration::from_secs(60))
            .await
            .unwrap();
        store
            .release_claim(&c, RefreshOutcome::Failed, Some("boom"))
            .await
            .unwrap();
        let status = store.find_refresh_status(&c).await.unwrap().unwrap();
        assert_eq!(status.retry_count, 1);
        assert_eq!(status.last_error.as_deref(), Some("boom"));

        store
            .compare_and_set_claim(&c, Duration::from_secs(60))
            .await
            .unwrap();
        store
            .release_claim(&c, RefreshOutcome::Completed, None)
            .await
            .unwrap();
        let status = store.find_refresh_status(&c).await.unwrap().unwrap();
        assert_eq!(status.retry_count, 0);
    }

    #[tokio::test]
    async fn dequeue_orders_by_priority_then_age() {
        use crate::models::notification::{EventPriority, MetadataNotification};

        let store = MemoryDepotStore::new();
        let older_scheduled = MetadataNotification::new(
            coord("1.0.0"),
            "p",
            EventPriority::Scheduled,
            3,
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
        let newer_urgent =
            MetadataNotification::new(coord("2.0.0"), "p", EventPriority::UserTriggered, 3);

        store.push_notification(&older_scheduled).await.unwrap();
        store.push_notification(&newer_urgent).await.unwrap();

        let first = store.claim_next_by_priority().await.unwrap().unwrap();
        assert_eq!(first.coordinate, coord("2.0.0"));
        let second = store.claim_next_by_priority().await.unwrap().unwrap();
        assert_eq!(second.coordinate, coord("1.0.0"));
        assert!(store.claim_next_by_priority().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn push_same_coordinate_overwrites_pending() {
        use crate::models::notification::{EventPriority, MetadataNotification};

        let store = MemoryDepotStore::new();
        let first = MetadataNotification::new(coord("1.0.0"), "p", EventPriority::Scheduled, 3);
        let id1 = store.push_notification(&first).await.unwrap();

        let second =
            MetadataNotification::new(coord("1.0.0"), "p2", EventPriority::UserTriggered, 3);
        let id2 = store.push_notification(&second).await.unwrap();

        assert_eq!(id1, id2);
        assert_eq!(store.queue_size().await.unwrap(), 1);
        let pending = store.claim_next_by_priority().await.unwrap().unwrap();
        assert_eq!(pending.parent_event_id, "p2");
        assert_eq!(pending.priority, EventPriority::UserTriggered);
    }

    #[tokio::test]
    async fn repushed_event_merges_into_newer_pending_for_same_coordinate() {
        use crate::models::notification::{EventPriority, MetadataNotification};

        let store = MemoryDepotStore::new();
        let original = MetadataNotification::new(coord("1.0.0"), "p", EventPriority::Scheduled, 3);
        store.push_notification(&original).await.unwrap();
        let dequeued = store.claim_next_by_priority().await.unwrap().unwrap();

        // A fresh event for the same coordinate lands while the first is
        // being processed.
        let fresh = MetadataNotification::new(coord("1.0.0"), "p2", EventPriority::Scheduled, 3);
        let fresh_id = store.push_notification(&fresh).await.unwrap();

        // Re-pushing the dequeued event (retry path) merges instead of
        // duplicating the coordinate.
        let merged_id = store.push_notification(&dequeued).await.unwrap();
        assert_eq!(merged_id, fresh_id);
        assert_eq!(store.queue_size().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn schedule_lease_blocks_until_expiry() {
        let store = MemoryDepotStore::new();
        assert!(store
            .acquire_schedule_lease("sweep", Duration::from_secs(60))
            .await
            .unwrap());
        assert!(!store
            .acquire_schedule_lease("sweep", Duration::from_secs(60))
            .await
            .unwrap());

        store.release_schedule_lease("sweep").await.unwrap();
        assert!(store
            .acquire_schedule_lease("sweep", Duration::from_secs(60))
            .await
            .unwrap());
    }
}
