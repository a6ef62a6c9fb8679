//! API module - HTTP handlers and routes.

pub mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::config::Config;
use crate::services::notification_queue::NotificationQueue;
use crate::services::purge_service::ArtifactPurgeService;
use crate::services::reconciliation_service::VersionsReconciliationService;
use crate::services::refresh_orchestrator::RefreshOrchestrator;
use crate::services::refresh_status_tracker::RefreshStatusTracker;
use crate::services::scheduler::SweepScheduler;
use crate::store::DepotStore;

/// Application state shared across handlers
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DepotStore>,
    pub orchestrator: Arc<RefreshOrchestrator>,
    pub reconciliation: Arc<VersionsReconciliationService>,
    pub purge: Arc<ArtifactPurgeService>,
    pub queue: NotificationQueue,
    pub tracker: RefreshStatusTracker,
    pub scheduler: Arc<SweepScheduler>,
}

/// Shared application state type
pub type SharedState = Arc<AppState>;
