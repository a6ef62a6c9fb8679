//! Queue consumer loop.
//!
//! Drains the notification queue and drives each event through the
//! orchestrator. Multiple consumers can run against the same store; the
//! queue's atomic dequeue keeps them from colliding.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::models::notification::MetadataNotification;
use crate::services::notification_queue::NotificationQueue;
use crate::services::refresh_orchestrator::{RefreshDisposition, RefreshOrchestrator};

/// Process one dequeued event to completion.
///
/// Retryable failures (including a coordinate found busy) go back to the
/// queue with the retry count bumped. Permanent failures are dead-lettered
/// immediately.
pub async fn process_notification(
    queue: &NotificationQueue,
    orchestrator: &RefreshOrchestrator,
    notification: MetadataNotification,
) -> Result<()> {
    let outcome = orchestrator
        .refresh_version_for_project(
            &notification.coordinate,
            &notification.parent_event_id,
            notification.full_update,
            notification.transitive,
        )
        .await;

    match outcome {
        Ok(result) => match result.disposition {
            RefreshDisposition::Completed => {
                tracing::debug!(
                    coordinate = %notification.coordinate,
                    "Queued refresh completed"
                );
                Ok(())
            }
            RefreshDisposition::AlreadyInProgress => {
                queue
                    .retry(notification, "refresh already in progress")
                    .await
            }
            RefreshDisposition::Failed => {
                let reason = result
                    .messages
                    .first()
                    .map(String::as_str)
                    .unwrap_or("refresh failed");
                queue.retry(notification, reason).await
            }
        },
        Err(e) if e.is_retryable() => queue.retry(notification, &e.to_string()).await,
        Err(e) => {
            queue
                .complete_without_retry(notification, &e.to_string())
                .await
        }
    }
}

/// Spawn the polling consumer loop.
pub fn spawn_consumer(
    queue: NotificationQueue,
    orchestrator: Arc<RefreshOrchestrator>,
    poll_interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!(poll_secs = poll_interval.as_secs(), "Notification consumer started");
        loop {
            match queue.get_first_in_queue().await {
                Ok(Some(notification)) => {
                    if let Err(e) =
                        process_notification(&queue, &orchestrator, notification).await
                    {
                        tracing::error!("Notification processing failed: {e}");
                    }
                }
                Ok(None) => {
                    tokio::time::sleep(poll_interval).await;
                }
                Err(e) => {
                    tracing::error!("Queue poll failed: {e}");
                    tokio::time::sleep(poll_interval).await;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::HandlerRegistry;
    use crate::models::coordinate::ProjectVersionCoordinate;
    use crate::models::notification::EventPriority;
    use crate::repository::{ArtifactRepository, ArtifactType, FileHandle};
    use crate::services::refresh_status_tracker::RefreshStatusTracker;
    use crate::store::memory::MemoryDepotStore;
    use crate::store::DepotStore;
    use async_trait::async_trait;

    struct EmptyRepository;

    #[async_trait]
    impl ArtifactRepository for EmptyRepository {
        async fn find_files(
            &self,
            _t: ArtifactType,
            _g: &str,
            _a: &str,
            _v: &str,
        ) -> Result<Vec<FileHandle>> {
            Ok(Vec::new())
        }

        async fn find_versions(&self, _g: &str, _a: &str) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        async fn find_dependencies(
            &self,
            _g: &str,
            _a: &str,
            _v: &str,
        ) -> Result<Vec<ProjectVersionCoordinate>> {
            Ok(Vec::new())
        }
    }

    fn fixture() -> (Arc<MemoryDepotStore>, NotificationQueue, RefreshOrchestrator) {
        let store: Arc<MemoryDepotStore> = Arc::new(MemoryDepotStore::new());
        let queue = NotificationQueue::new(store.clone(), 2);
        let registry = Arc::new(HandlerRegistry::default_set(store.clone()));
        let tracker = RefreshStatusTracker::new(store.clone(), Duration::from_secs(3600));
        let orchestrator = RefreshOrchestrator::new(
            store.clone(),
            Arc::new(EmptyRepository),
            registry,
            tracker,
            2,
        );
        (store, queue, orchestrator)
    }

    fn event(coordinate: ProjectVersionCoordinate) -> MetadataNotification {
        MetadataNotification::new(coordinate, "test", EventPriority::UserTriggered, 2)
    }

    #[tokio::test]
    async fn completed_event_is_neither_requeued_nor_dead_lettered() {
        let (_store, queue, orchestrator) = fixture();
        let n = event(ProjectVersionCoordinate::new("org.example", "core", "1.0.0"));

        process_notification(&queue, &orchestrator, n).await.unwrap();
        assert_eq!(queue.size().await.unwrap(), 0);
        assert!(queue.dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_coordinate_is_dead_lettered_without_retry() {
        let (_store, queue, orchestrator) = fixture();
        let n = event(ProjectVersionCoordinate::new("bad group", "core", "1.0.0"));

        process_notification(&queue, &orchestrator, n).await.unwrap();
        assert_eq!(queue.size().await.unwrap(), 0);
        let dead = queue.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].reason.contains("invalid group id"));
    }

    #[tokio::test]
    async fn busy_coordinate_is_requeued() {
        let (store, queue, orchestrator) = fixture();
        let coord = ProjectVersionCoordinate::new("org.example", "core", "1.0.0");
        assert!(store
            .compare_and_set_claim(&coord, Duration::from_secs(3600))
            .await
            .unwrap());

        process_notification(&queue, &orchestrator, event(coord)).await.unwrap();
        let pending = queue.get_all().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].retries, 1);
    }

    #[tokio::test]
    async fn retries_exhaust_into_the_dead_letter_table() {
        let (store, queue, orchestrator) = fixture();
        let coord = ProjectVersionCoordinate::new("org.example", "core", "1.0.0");
        assert!(store
            .compare_and_set_claim(&coord, Duration::from_secs(3600))
            .await
            .unwrap());

        let mut n = event(coord);
        for _ in 0..2 {
            process_notification(&queue, &orchestrator, n).await.unwrap();
            match queue.get_first_in_queue().await.unwrap() {
                Some(requeued) => n = requeued,
                None => break,
            }
        }
        assert_eq!(queue.size().await.unwrap(), 0);
        assert_eq!(queue.dead_letters().await.unwrap().len(), 1);
    }
}
