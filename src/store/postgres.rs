//! Postgres store.
//!
//! The claim and dequeue operations lean on Postgres-native atomicity: a
//! single conditional `INSERT ... ON CONFLICT DO UPDATE ... WHERE` for the
//! refresh claim, and `DELETE ... WHERE event_id = (SELECT ... FOR UPDATE
//! SKIP LOCKED)` for the queue, so concurrent workers on separate machines
//! cannot double-claim a coordinate or double-consume an event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use uuid::Uuid;

use crate::error::Result;
use crate::models::coordinate::ProjectVersionCoordinate;
use crate::models::notification::{DeadLetter, EventPriority, MetadataNotification};
use crate::models::project_version::{StoreProjectVersionData, TransitiveDependencyReport};
use crate::models::refresh_status::{RefreshOutcome, RefreshStatus};
use crate::repository::{ArtifactType, FileHandle};
use crate::store::{DependencyMap, DepotStore};

/// Postgres-backed `DepotStore`.
pub struct PgDepotStore {
    db: PgPool,
}

impl PgDepotStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

// ── Row types ───────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct ProjectVersionRow {
    group_id: String,
    artifact_id: String,
    version_id: String,
    direct_dependencies: serde_json::Value,
    excluded: bool,
    evicted: bool,
    deprecated: bool,
    transitive_report: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ProjectVersionRow {
    fn into_data(self) -> Result<StoreProjectVersionData> {
        let transitive_report = self
            .transitive_report
            .map(serde_json::from_value::<TransitiveDependencyReport>)
            .transpose()?;
        Ok(StoreProjectVersionData {
            coordinate: ProjectVersionCoordinate::new(
                self.group_id,
                self.artifact_id,
                self.version_id,
            ),
            direct_dependencies: serde_json::from_value(self.direct_dependencies)?,
            excluded: self.excluded,
            evicted: self.evicted,
            deprecated: self.deprecated,
            transitive_report,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefreshStatusRow {
    group_id: String,
    artifact_id: String,
    version_id: String,
    in_progress: bool,
    claimed_at: Option<DateTime<Utc>>,
    last_refresh_time: Option<DateTime<Utc>>,
    last_outcome: Option<String>,
    last_error: Option<String>,
    retry_count: i32,
    updated_at: DateTime<Utc>,
}

impl From<RefreshStatusRow> for RefreshStatus {
    fn from(row: RefreshStatusRow) -> Self {
        RefreshStatus {
            coordinate: ProjectVersionCoordinate::new(
                row.group_id,
                row.artifact_id,
                row.version_id,
            ),
            in_progress: row.in_progress,
            claimed_at: row.claimed_at,
            last_refresh_time: row.last_refresh_time,
            last_outcome: row.last_outcome.as_deref().and_then(RefreshOutcome::parse),
            last_error: row.last_error,
            retry_count: row.retry_count,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    event_id: Uuid,
    group_id: String,
    artifact_id: String,
    version_id: String,
    parent_event_id: String,
    priority: i32,
    retries: i32,
    max_retries: i32,
    full_update: bool,
    transitive: bool,
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
}

impl From<NotificationRow> for MetadataNotification {
    fn from(row: NotificationRow) -> Self {
        MetadataNotification {
            event_id: Some(row.event_id),
            coordinate: ProjectVersionCoordinate::new(
                row.group_id,
                row.artifact_id,
                row.version_id,
            ),
            parent_event_id: row.parent_event_id,
            priority: EventPriority::from_i32(row.priority),
            retries: row.retries,
            max_retries: row.max_retries,
            full_update: row.full_update,
            transitive: row.transitive,
            created: row.created,
            last_updated: row.last_updated,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DeadLetterRow {
    event_id: Uuid,
    group_id: String,
    artifact_id: String,
    version_id: String,
    parent_event_id: String,
    priority: i32,
    retries: i32,
    max_retries: i32,
    full_update: bool,
    transitive: bool,
    created: DateTime<Utc>,
    reason: String,
    dead_lettered_at: DateTime<Utc>,
}

impl From<DeadLetterRow> for DeadLetter {
    fn from(row: DeadLetterRow) -> Self {
        DeadLetter {
            notification: MetadataNotification {
                event_id: Some(row.event_id),
                coordinate: ProjectVersionCoordinate::new(
                    row.group_id,
                    row.artifact_id,
                    row.version_id,
                ),
                parent_event_id: row.parent_event_id,
                priority: EventPriority::from_i32(row.priority),
                retries: row.retries,
                max_retries: row.max_retries,
                full_update: row.full_update,
                transitive: row.transitive,
                created: row.created,
                last_updated: row.dead_lettered_at,
            },
            reason: row.reason,
            dead_lettered_at: row.dead_lettered_at,
        }
    }
}

const PROJECT_VERSION_COLUMNS: &str = "group_id, artifact_id, version_id, direct_dependencies, \
     excluded, evicted, deprecated, transitive_report, created_at, updated_at";

const NOTIFICATION_COLUMNS: &str = "event_id, group_id, artifact_id, version_id, parent_event_id, \
     priority, retries, max_retries, full_update, transitive, created, last_updated";

// ── Store implementation ────────────────────────────────────────────────────

#[async_trait]
impl DepotStore for PgDepotStore {
    async fn upsert_project_version(&self, data: &StoreProjectVersionData) -> Result<()> {
        let report = data
            .transitive_report
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO project_versions
                (group_id, artifact_id, version_id, direct_dependencies,
                 excluded, evicted, deprecated, transitive_report, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())
            ON CONFLICT (group_id, artifact_id, version_id) DO UPDATE SET
                direct_dependencies = EXCLUDED.direct_dependencies,
                excluded = EXCLUDED.excluded,
                evicted = EXCLUDED.evicted,
                deprecated = EXCLUDED.deprecated,
                transitive_report = EXCLUDED.transitive_report,
                updated_at = NOW()
            "#,
        )
        .bind(&data.coordinate.group_id)
        .bind(&data.coordinate.artifact_id)
        .bind(&data.coordinate.version_id)
        .bind(serde_json::to_value(&data.direct_dependencies)?)
        .bind(data.excluded)
        .bind(data.evicted)
        .bind(data.deprecated)
        .bind(report)
        .bind(data.created_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_project_version(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<StoreProjectVersionData>> {
        let row: Option<ProjectVersionRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_VERSION_COLUMNS} FROM project_versions \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3"
        ))
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .fetch_optional(&self.db)
        .await?;
        row.map(ProjectVersionRow::into_data).transpose()
    }

    async fn list_project_versions(
        &self,
        group_id: &str,
        artifact_id: &str,
    ) -> Result<Vec<StoreProjectVersionData>> {
        let rows: Vec<ProjectVersionRow> = sqlx::query_as(&format!(
            "SELECT {PROJECT_VERSION_COLUMNS} FROM project_versions \
             WHERE group_id = $1 AND artifact_id = $2 ORDER BY version_id"
        ))
        .bind(group_id)
        .bind(artifact_id)
        .fetch_all(&self.db)
        .await?;
        rows.into_iter().map(ProjectVersionRow::into_data).collect()
    }

    async fn list_all_projects(&self) -> Result<Vec<(String, String)>> {
        let pairs: Vec<(String, String)> = sqlx::query_as(
            "SELECT DISTINCT group_id, artifact_id FROM project_versions \
             ORDER BY group_id, artifact_id",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(pairs)
    }

    async fn load_dependency_map(
        &self,
    ) -> Result<(DependencyMap, HashSet<ProjectVersionCoordinate>)> {
        #[derive(sqlx::FromRow)]
        struct DepRow {
            group_id: String,
            artifact_id: String,
            version_id: String,
            direct_dependencies: serde_json::Value,
            excluded: bool,
        }

        let rows: Vec<DepRow> = sqlx::query_as(
            "SELECT group_id, artifact_id, version_id, direct_dependencies, excluded \
             FROM project_versions",
        )
        .fetch_all(&self.db)
        .await?;

        let mut map = DependencyMap::new();
        let mut excluded = HashSet::new();
        for row in rows {
            let coord =
                ProjectVersionCoordinate::new(row.group_id, row.artifact_id, row.version_id);
            map.insert(coord.clone(), serde_json::from_value(row.direct_dependencies)?);
            if row.excluded {
                excluded.insert(coord);
            }
        }
        Ok((map, excluded))
    }

    async fn save_transitive_report(
        &self,
        coordinate: &ProjectVersionCoordinate,
        report: &TransitiveDependencyReport,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE project_versions SET transitive_report = $4, updated_at = NOW() \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(serde_json::to_value(report)?)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn set_evicted(
        &self,
        coordinate: &ProjectVersionCoordinate,
        evicted: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE project_versions SET evicted = $4, updated_at = NOW() \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(evicted)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn set_deprecated(
        &self,
        coordinate: &ProjectVersionCoordinate,
        deprecated: bool,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE project_versions SET deprecated = $4, updated_at = NOW() \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(deprecated)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_project_version(&self, coordinate: &ProjectVersionCoordinate) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM project_versions \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn stored_checksums(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
    ) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT path, checksum_sha256 FROM artifact_files \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3 AND artifact_type = $4",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(artifact_type.as_str())
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().collect())
    }

    async fn upsert_artifact_file(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
        file: &FileHandle,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO artifact_files
                (group_id, artifact_id, version_id, artifact_type, path, checksum_sha256, size_bytes)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (group_id, artifact_id, version_id, artifact_type, path) DO UPDATE SET
                checksum_sha256 = EXCLUDED.checksum_sha256,
                size_bytes = EXCLUDED.size_bytes,
                updated_at = NOW()
            "#,
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(artifact_type.as_str())
        .bind(&file.path)
        .bind(&file.checksum_sha256)
        .bind(file.size_bytes)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_artifact_files(
        &self,
        coordinate: &ProjectVersionCoordinate,
        artifact_type: ArtifactType,
    ) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM artifact_files \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3 AND artifact_type = $4",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(artifact_type.as_str())
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    async fn compare_and_set_claim(
        &self,
        coordinate: &ProjectVersionCoordinate,
        abandon_after: Duration,
    ) -> Result<bool> {
        // One conditional upsert: the WHERE clause makes this a genuine
        // compare-and-set at the storage layer.
        let claimed: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO refresh_status
                (group_id, artifact_id, version_id, in_progress, claimed_at, updated_at)
            VALUES ($1, $2, $3, TRUE, NOW(), NOW())
            ON CONFLICT (group_id, artifact_id, version_id) DO UPDATE
            SET in_progress = TRUE, claimed_at = NOW(), updated_at = NOW()
            WHERE refresh_status.in_progress = FALSE
               OR refresh_status.claimed_at IS NULL
               OR refresh_status.claimed_at < NOW() - make_interval(secs => $4)
            RETURNING group_id
            "#,
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(abandon_after.as_secs_f64())
        .fetch_optional(&self.db)
        .await?;
        Ok(claimed.is_some())
    }

    async fn release_claim(
        &self,
        coordinate: &ProjectVersionCoordinate,
        outcome: RefreshOutcome,
        error: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE refresh_status
            SET in_progress = FALSE,
                claimed_at = NULL,
                last_refresh_time = NOW(),
                last_outcome = $4,
                last_error = $5,
                retry_count = CASE WHEN $4 = 'failed' THEN retry_count + 1 ELSE 0 END,
                updated_at = NOW()
            WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3
            "#,
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .bind(outcome.as_str())
        .bind(error)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn find_refresh_status(
        &self,
        coordinate: &ProjectVersionCoordinate,
    ) -> Result<Option<RefreshStatus>> {
        let row: Option<RefreshStatusRow> = sqlx::query_as(
            "SELECT group_id, artifact_id, version_id, in_progress, claimed_at, \
                    last_refresh_time, last_outcome, last_error, retry_count, updated_at \
             FROM refresh_status \
             WHERE group_id = $1 AND artifact_id = $2 AND version_id = $3",
        )
        .bind(&coordinate.group_id)
        .bind(&coordinate.artifact_id)
        .bind(&coordinate.version_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(RefreshStatus::from))
    }

    async fn push_notification(&self, notification: &MetadataNotification) -> Result<Uuid> {
        if let Some(id) = notification.event_id {
            let upserted: std::result::Result<(Uuid,), sqlx::Error> = sqlx::query_as(
                r#"
                INSERT INTO metadata_notifications
                    (event_id, group_id, artifact_id, version_id, parent_event_id,
                     priority, retries, max_retries, full_update, transitive)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (event_id) DO UPDATE SET
                    parent_event_id = EXCLUDED.parent_event_id,
                    priority = LEAST(metadata_notifications.priority, EXCLUDED.priority),
                    retries = EXCLUDED.retries,
                    max_retries = EXCLUDED.max_retries,
                    full_update = EXCLUDED.full_update,
                    transitive = EXCLUDED.transitive,
                    last_updated = NOW()
                RETURNING event_id
                "#,
            )
            .bind(id)
            .bind(&notification.coordinate.group_id)
            .bind(&notification.coordinate.artifact_id)
            .bind(&notification.coordinate.version_id)
            .bind(&notification.parent_event_id)
            .bind(notification.priority.as_i32())
            .bind(notification.retries)
            .bind(notification.max_retries)
            .bind(notification.full_update)
            .bind(notification.transitive)
            .fetch_one(&self.db)
            .await;

            match upserted {
                Ok((event_id,)) => return Ok(event_id),
                // Re-pushing a dequeued event can race a newer pending event
                // that already owns the coordinate's unique slot. Merge into
                // that pending row instead of surfacing the violation.
                Err(e)
                    if e.as_database_error()
                        .is_some_and(|db| db.is_unique_violation()) => {}
                Err(e) => return Err(e.into()),
            }
        }

        let (event_id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO metadata_notifications
                (group_id, artifact_id, version_id, parent_event_id,
                 priority, retries, max_retries, full_update, transitive)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (group_id, artifact_id, version_id) DO UPDATE SET
                parent_event_id = EXCLUDED.parent_event_id,
                priority = LEAST(metadata_notifications.priority, EXCLUDED.priority),
                retries = EXCLUDED.retries,
                max_retries = EXCLUDED.max_retries,
                full_update = EXCLUDED.full_update,
                transitive = EXCLUDED.transitive,
                last_updated = NOW()
            RETURNING event_id
            "#,
        )
        .bind(&notification.coordinate.group_id)
        .bind(&notification.coordinate.artifact_id)
        .bind(&notification.coordinate.version_id)
        .bind(&notification.parent_event_id)
        .bind(notification.priority.as_i32())
        .bind(notification.retries)
        .bind(notification.max_retries)
        .bind(notification.full_update)
        .bind(notification.transitive)
        .fetch_one(&self.db)
        .await?;
        Ok(event_id)
    }

    async fn claim_next_by_priority(&self) -> Result<Option<MetadataNotification>> {
        let row: Option<NotificationRow> = sqlx::query_as(&format!(
            r#"
            DELETE FROM metadata_notifications
            WHERE event_id = (
                SELECT event_id FROM metadata_notifications
                ORDER BY priority ASC, created ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            RETURNING {NOTIFICATION_COLUMNS}
            "#
        ))
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(MetadataNotification::from))
    }

    async fn queue_size(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM metadata_notifications")
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }

    async fn all_notifications(&self) -> Result<Vec<MetadataNotification>> {
        let rows: Vec<NotificationRow> = sqlx::query_as(&format!(
            "SELECT {NOTIFICATION_COLUMNS} FROM metadata_notifications \
             ORDER BY priority ASC, created ASC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(MetadataNotification::from).collect())
    }

    async fn delete_all_notifications(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM metadata_notifications")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }

    async fn push_dead_letter(&self, dead_letter: &DeadLetter) -> Result<()> {
        let n = &dead_letter.notification;
        sqlx::query(
            r#"
            INSERT INTO dead_letters
                (event_id, group_id, artifact_id, version_id, parent_event_id,
                 priority, retries, max_retries, full_update, transitive,
                 created, reason, dead_lettered_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(n.event_id.unwrap_or_else(Uuid::new_v4))
        .bind(&n.coordinate.group_id)
        .bind(&n.coordinate.artifact_id)
        .bind(&n.coordinate.version_id)
        .bind(&n.parent_event_id)
        .bind(n.priority.as_i32())
        .bind(n.retries)
        .bind(n.max_retries)
        .bind(n.full_update)
        .bind(n.transitive)
        .bind(n.created)
        .bind(&dead_letter.reason)
        .bind(dead_letter.dead_lettered_at)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        let rows: Vec<DeadLetterRow> = sqlx::query_as(
            "SELECT event_id, group_id, artifact_id, version_id, parent_event_id, \
                    priority, retries, max_retries, full_update, transitive, \
                    created, reason, dead_lettered_at \
             FROM dead_letters ORDER BY dead_lettered_at DESC",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(DeadLetter::from).collect())
    }

    async fn acquire_schedule_lease(&self, name: &str, ttl: Duration) -> Result<bool> {
        let acquired: Option<(String,)> = sqlx::query_as(
            r#"
            INSERT INTO schedule_instances (name, expires)
            VALUES ($1, NOW() + make_interval(secs => $2))
            ON CONFLICT (name) DO UPDATE
            SET expires = NOW() + make_interval(secs => $2)
            WHERE schedule_instances.expires < NOW()
            RETURNING name
            "#,
        )
        .bind(name)
        .bind(ttl.as_secs_f64())
        .fetch_optional(&self.db)
        .await?;
        Ok(acquired.is_some())
    }

    async fn release_schedule_lease(&self, name: &str) -> Result<()> {
        sqlx::query("DELETE FROM schedule_instances WHERE name = $1")
            .bind(name)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
