//! Priority queue of pending refresh events.
//!
//! A thin service over the store's notification tables. All ordering and
//! exclusivity guarantees live in the store implementation; this layer adds
//! retry accounting and dead-lettering.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::notification::{DeadLetter, MetadataNotification};
use crate::store::DepotStore;

#[derive(Clone)]
pub struct NotificationQueue {
    store: Arc<dyn DepotStore>,
    max_retries: i32,
}

impl NotificationQueue {
    pub fn new(store: Arc<dyn DepotStore>, max_retries: i32) -> Self {
        Self { store, max_retries }
    }

    /// Default retry budget applied to events pushed without one.
    pub fn max_retries(&self) -> i32 {
        self.max_retries
    }

    /// Persist an event, returning its (possibly newly assigned) id.
    ///
    /// Re-pushing a coordinate that is already pending overwrites the
    /// pending instance rather than enqueueing a duplicate.
    pub async fn push(&self, notification: &MetadataNotification) -> Result<Uuid> {
        let event_id = self.store.push_notification(notification).await?;
        tracing::debug!(
            event_id = %event_id,
            coordinate = %notification.coordinate,
            parent_event_id = %notification.parent_event_id,
            priority = notification.priority.as_i32(),
            "Queued refresh event"
        );
        Ok(event_id)
    }

    /// Remove and return the highest-priority, oldest event, if any.
    ///
    /// Atomic at the store layer: concurrent consumers never receive the
    /// same event.
    pub async fn get_first_in_queue(&self) -> Result<Option<MetadataNotification>> {
        self.store.claim_next_by_priority().await
    }

    pub async fn size(&self) -> Result<i64> {
        self.store.queue_size().await
    }

    pub async fn get_all(&self) -> Result<Vec<MetadataNotification>> {
        self.store.all_notifications().await
    }

    pub async fn delete_all(&self) -> Result<u64> {
        self.store.delete_all_notifications().await
    }

    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        self.store.dead_letters().await
    }

    /// Requeue a failed event with its retry count bumped, or dead-letter
    /// it when the budget is spent.
    pub async fn retry(&self, notification: MetadataNotification, reason: &str) -> Result<()> {
        let mut notification = notification;
        notification.retries += 1;
        notification.last_updated = Utc::now();

        if notification.is_exhausted() {
            tracing::warn!(
                coordinate = %notification.coordinate,
                retries = notification.retries,
                "Retry budget exhausted, dead-lettering event: {reason}"
            );
            self.dead_letter(notification, reason).await
        } else {
            tracing::debug!(
                coordinate = %notification.coordinate,
                retries = notification.retries,
                "Requeueing failed event: {reason}"
            );
            self.push(&notification).await?;
            Ok(())
        }
    }

    /// Dead-letter an event immediately, bypassing remaining retries. Used
    /// for permanent failures where a retry cannot succeed.
    pub async fn complete_without_retry(
        &self,
        notification: MetadataNotification,
        reason: &str,
    ) -> Result<()> {
        let mut notification = notification;
        notification.retries = notification.max_retries;
        notification.last_updated = Utc::now();
        tracing::warn!(
            coordinate = %notification.coordinate,
            "Abandoning event without retry: {reason}"
        );
        self.dead_letter(notification, reason).await
    }

    async fn dead_letter(&self, notification: MetadataNotification, reason: &str) -> Result<()> {
        self.store
            .push_dead_letter(&DeadLetter {
                notification,
                reason: reason.to_string(),
                dead_lettered_at: Utc::now(),
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::coordinate::ProjectVersionCoordinate;
    use crate::models::notification::EventPriority;
    use crate::store::memory::MemoryDepotStore;

    fn queue(max_retries: i32) -> NotificationQueue {
        NotificationQueue::new(Arc::new(MemoryDepotStore::new()), max_retries)
    }

    fn event(version: &str, priority: EventPriority, max_retries: i32) -> MetadataNotification {
        MetadataNotification::new(
            ProjectVersionCoordinate::new("org.example", "core", version),
            format!("org.example_core_{version}"),
            priority,
            max_retries,
        )
    }

    #[tokio::test]
    async fn push_assigns_an_event_id() {
        let q = queue(3);
        let id = q.push(&event("1.0.0", EventPriority::Scheduled, 3)).await.unwrap();
        let all = q.get_all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].event_id, Some(id));
    }

    #[tokio::test]
    async fn dequeue_respects_priority_then_age() {
        let q = queue(3);
        q.push(&event("1.0.0", EventPriority::Consolidation, 3)).await.unwrap();
        q.push(&event("2.0.0", EventPriority::UserTriggered, 3)).await.unwrap();
        q.push(&event("3.0.0", EventPriority::Scheduled, 3)).await.unwrap();

        let order: Vec<String> = [
            q.get_first_in_queue().await.unwrap().unwrap(),
            q.get_first_in_queue().await.unwrap().unwrap(),
            q.get_first_in_queue().await.unwrap().unwrap(),
        ]
        .into_iter()
        .map(|n| n.coordinate.version_id)
        .collect();
        assert_eq!(order, ["2.0.0", "3.0.0", "1.0.0"]);
        assert!(q.get_first_in_queue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_requeues_with_incremented_count() {
        let q = queue(3);
        q.push(&event("1.0.0", EventPriority::Scheduled, 3)).await.unwrap();
        let taken = q.get_first_in_queue().await.unwrap().unwrap();

        q.retry(taken, "transient failure").await.unwrap();
        let requeued = q.get_first_in_queue().await.unwrap().unwrap();
        assert_eq!(requeued.retries, 1);
        assert!(q.dead_letters().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_retry_dead_letters() {
        let q = queue(1);
        q.push(&event("1.0.0", EventPriority::Scheduled, 1)).await.unwrap();
        let taken = q.get_first_in_queue().await.unwrap().unwrap();

        q.retry(taken, "still failing").await.unwrap();
        assert_eq!(q.size().await.unwrap(), 0);
        let dead = q.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].reason, "still failing");
        assert_eq!(dead[0].notification.retries, 1);
    }

    #[tokio::test]
    async fn complete_without_retry_skips_remaining_budget() {
        let q = queue(5);
        q.push(&event("1.0.0", EventPriority::Scheduled, 5)).await.unwrap();
        let taken = q.get_first_in_queue().await.unwrap().unwrap();

        q.complete_without_retry(taken, "invalid coordinate").await.unwrap();
        assert_eq!(q.size().await.unwrap(), 0);
        let dead = q.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert!(dead[0].notification.is_exhausted());
    }

    #[tokio::test]
    async fn delete_all_empties_the_queue() {
        let q = queue(3);
        q.push(&event("1.0.0", EventPriority::Scheduled, 3)).await.unwrap();
        q.push(&event("2.0.0", EventPriority::Scheduled, 3)).await.unwrap();
        assert_eq!(q.delete_all().await.unwrap(), 2);
        assert_eq!(q.size().await.unwrap(), 0);
    }
}
