//! Claim coordination for refresh units.
//!
//! One coordinate is refreshed by at most one worker at a time. The claim is
//! a conditional write in the store; this service carries the abandonment
//! window and exposes the status reads the rest of the system needs.

use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::models::refresh_status::{RefreshOutcome, RefreshStatus};
use crate::store::DepotStore;

#[derive(Clone)]
pub struct RefreshStatusTracker {
    store: Arc<dyn DepotStore>,
    /// Claims older than this are treated as abandoned and can be retaken.
    abandon_after: Duration,
}

impl RefreshStatusTracker {
    pub fn new(store: Arc<dyn DepotStore>, abandon_after: Duration) -> Self {
        Self {
            store,
            abandon_after,
        }
    }

    /// Try to take the refresh claim for a coordinate. Returns false when
    /// another live worker holds it.
    pub async fn claim(&self, coordinate: &ProjectVersionCoordinate) -> Result<bool> {
        let claimed = self
            .store
            .compare_and_set_claim(coordinate, self.abandon_after)
            .await?;
        if !claimed {
            tracing::debug!(coordinate = %coordinate, "Refresh already in progress elsewhere");
        }
        Ok(claimed)
    }

    /// Release a held claim, recording outcome and error text.
    pub async fn release(
        &self,
        coordinate: &ProjectVersionCoordinate,
        outcome: RefreshOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        self.store.release_claim(coordinate, outcome, error).await
    }

    pub async fn status(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<RefreshStatus>> {
        self.store.find_refresh_status(coordinate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryDepotStore;

    fn tracker(abandon_secs: u64) -> RefreshStatusTracker {
        RefreshStatusTracker::new(
            Arc::new(MemoryDepotStore::new()),
            Duration::from_secs(abandon_secs),
        )
    }

    fn coord() -> ProjectVersionCoordinate {
        ProjectVersionCoordinate::new("org.example", "core", "1.0.0")
    }

    #[tokio::test]
    async fn second_claim_is_rejected_until_release() {
        let t = tracker(3600);
        assert!(t.claim(&coord()).await.unwrap());
        assert!(!t.claim(&coord()).await.unwrap());

        t.release(&coord(), RefreshOutcome::Completed, None).await.unwrap();
        assert!(t.claim(&coord()).await.unwrap());
    }

    #[tokio::test]
    async fn status_tracks_the_claim() {
        let t = tracker(3600);
        assert!(t.status(&coord()).await.unwrap().is_none());

        t.claim(&coord()).await.unwrap();
        let held = t.status(&coord()).await.unwrap().unwrap();
        assert!(held.in_progress);
        assert!(held.claimed_at.is_some());

        t.release(&coord(), RefreshOutcome::Failed, Some("boom")).await.unwrap();
        let released = t.status(&coord()).await.unwrap().unwrap();
        assert!(!released.in_progress);
    }

    #[tokio::test]
    async fn release_records_outcome_and_error() {
        let t = tracker(3600);
        t.claim(&coord()).await.unwrap();
        t.release(&coord(), RefreshOutcome::Failed, Some("repository timeout"))
            .await
            .unwrap();

        let status = t.status(&coord()).await.unwrap().unwrap();
        assert!(!status.in_progress);
        assert_eq!(status.last_outcome, Some(RefreshOutcome::Failed));
        assert_eq!(status.last_error.as_deref(), Some("repository timeout"));
        assert_eq!(status.retry_count, 1);
    }

    #[tokio::test]
    async fn abandoned_claim_is_retaken() {
        // Zero-second abandonment window: any held claim is stale.
        let t = tracker(0);
        assert!(t.claim(&coord()).await.unwrap());
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(t.claim(&coord()).await.unwrap());
    }
}
