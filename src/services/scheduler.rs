//! Interval-driven sweep schedules.
//!
//! Each schedule enqueues refresh events instead of refreshing inline, so
//! sweep work flows through the same prioritized queue as user requests.
//! Single-instance schedules take a store-side lease before running, which
//! keeps replicas from running the same sweep concurrently.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::error::{AppError, Result};
use crate::models::coordinate::{ProjectVersionCoordinate, MASTER_SNAPSHOT};
use crate::models::notification::{EventPriority, MetadataNotification, ParentEvent};
use crate::models::schedule::ScheduleInfo;
use crate::services::notification_queue::NotificationQueue;
use crate::services::reconciliation_service::{MismatchKind, VersionsReconciliationService};
use crate::store::DepotStore;

pub const SNAPSHOT_SWEEP: &str = "snapshot-sweep";
pub const RECONCILE_SWEEP: &str = "reconcile-sweep";

/// Outcome of one schedule run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    /// The schedule is disabled and the run was not forced.
    Disabled,
    /// Another instance holds the schedule lease.
    LeaseHeldElsewhere,
    /// The sweep ran and enqueued this many events.
    Enqueued(usize),
}

pub struct SweepScheduler {
    store: Arc<dyn DepotStore>,
    queue: NotificationQueue,
    reconciliation: Arc<VersionsReconciliationService>,
    snapshot_schedule: ScheduleInfo,
    reconcile_schedule: ScheduleInfo,
    lease_ttl: Duration,
}

impl SweepScheduler {
    pub fn new(
        store: Arc<dyn DepotStore>,
        queue: NotificationQueue,
        reconciliation: Arc<VersionsReconciliationService>,
        snapshot_schedule: ScheduleInfo,
        reconcile_schedule: ScheduleInfo,
        lease_ttl: Duration,
    ) -> Self {
        Self {
            store,
            queue,
            reconciliation,
            snapshot_schedule,
            reconcile_schedule,
            lease_ttl,
        }
    }

    pub fn schedules(&self) -> [&ScheduleInfo; 2] {
        [&self.snapshot_schedule, &self.reconcile_schedule]
    }

    /// Run a schedule by name, as the API's manual trigger does.
    ///
    /// `force` bypasses the disabled flag, never the lease.
    pub async fn run_by_name(&self, name: &str, force: bool) -> Result<SweepOutcome> {
        match name {
            SNAPSHOT_SWEEP => self.run_snapshot_sweep(force).await,
            RECONCILE_SWEEP => self.run_reconcile_sweep(force).await,
            other => Err(AppError::NotFound(format!("unknown schedule '{other}'"))),
        }
    }

    /// Enqueue a refresh of the default snapshot of every stored project.
    pub async fn run_snapshot_sweep(&self, force: bool) -> Result<SweepOutcome> {
        let schedule = self.snapshot_schedule.clone();
        if schedule.disabled && !force {
            return Ok(SweepOutcome::Disabled);
        }
        if !self.try_acquire(&schedule).await? {
            return Ok(SweepOutcome::LeaseHeldElsewhere);
        }

        let run: Result<usize> = async {
            let parent = ParentEvent::UpdateAllProjectAllSnapshots.as_str();
            let mut enqueued = 0usize;
            for (group_id, artifact_id) in self.store.list_all_projects().await? {
                let coordinate =
                    ProjectVersionCoordinate::new(group_id, artifact_id, MASTER_SNAPSHOT);
                self.queue
                    .push(&MetadataNotification::new(
                        coordinate,
                        parent,
                        EventPriority::Scheduled,
                        self.queue.max_retries(),
                    ))
                    .await?;
                enqueued += 1;
            }
            Ok(enqueued)
        }
        .await;

        self.release(&schedule).await;
        let enqueued = run?;
        tracing::info!(schedule = %schedule.name, enqueued, "Snapshot sweep enqueued");
        Ok(SweepOutcome::Enqueued(enqueued))
    }

    /// Reconcile stored versions against the repository and enqueue a
    /// refresh for every version missing from the store. Other mismatch
    /// kinds are only logged; remediation there is an operator call.
    pub async fn run_reconcile_sweep(&self, force: bool) -> Result<SweepOutcome> {
        let schedule = self.reconcile_schedule.clone();
        if schedule.disabled && !force {
            return Ok(SweepOutcome::Disabled);
        }
        if !self.try_acquire(&schedule).await? {
            return Ok(SweepOutcome::LeaseHeldElsewhere);
        }

        let run: Result<usize> = async {
            let mut enqueued = 0usize;
            for mismatch in self.reconciliation.find_versions_mismatches().await? {
                if mismatch.kind != MismatchKind::MissingInStore {
                    tracing::warn!(
                        coordinate = %mismatch.coordinate,
                        kind = ?mismatch.kind,
                        "Version mismatch needs operator attention"
                    );
                    continue;
                }
                let coord = &mismatch.coordinate;
                let parent = ParentEvent::build(
                    Some(&coord.group_id),
                    Some(&coord.artifact_id),
                    Some(&coord.version_id),
                    None,
                );
                self.queue
                    .push(&MetadataNotification::new(
                        coord.clone(),
                        parent,
                        EventPriority::Scheduled,
                        self.queue.max_retries(),
                    ))
                    .await?;
                enqueued += 1;
            }
            Ok(enqueued)
        }
        .await;

        self.release(&schedule).await;
        let enqueued = run?;
        tracing::info!(schedule = %schedule.name, enqueued, "Reconcile sweep enqueued");
        Ok(SweepOutcome::Enqueued(enqueued))
    }

    async fn try_acquire(&self, schedule: &ScheduleInfo) -> Result<bool> {
        if !schedule.single_instance {
            return Ok(true);
        }
        self.store
            .acquire_schedule_lease(&schedule.name, self.lease_ttl)
            .await
    }

    async fn release(&self, schedule: &ScheduleInfo) {
        if !schedule.single_instance {
            return;
        }
        if let Err(e) = self.store.release_schedule_lease(&schedule.name).await {
            tracing::error!(schedule = %schedule.name, "Failed to release schedule lease: {e}");
        }
    }
}

/// Spawn one ticker task per schedule.
pub fn spawn_schedulers(scheduler: Arc<SweepScheduler>) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    for (name, frequency_secs) in scheduler
        .schedules()
        .into_iter()
        .map(|s| (s.name.clone(), s.frequency_secs))
    {
        let scheduler = scheduler.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(frequency_secs.max(1)));
            // First tick fires immediately; skip it so startup does not
            // trigger every sweep at once.
            ticker.tick().await;
            tracing::info!(schedule = %name, frequency_secs, "Schedule ticker started");
            loop {
                ticker.tick().await;
                match scheduler.run_by_name(&name, false).await {
                    Ok(outcome) => {
                        tracing::debug!(schedule = %name, ?outcome, "Schedule run finished")
                    }
                    Err(e) => tracing::error!(schedule = %name, "Schedule run failed: {e}"),
                }
            }
        }));
    }
    handles
}
