use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgListener, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::core::start_of_business_day;
use crate::models::{MatchBuckets, MatchRecord, MatchStatus};

/// Postgres channel carrying match-record change notifications.
const MATCH_CHANNEL: &str = "match_records_changed";

/// Errors that can occur when interacting with the match lifecycle store
#[derive(Debug, Error)]
pub enum MatchStoreError {
    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrateError(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid notification payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),
}

/// Operation carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// One insert/update/delete event on a tenant's match records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchChange {
    #[serde(rename = "tenantId")]
    pub tenant_id: Uuid,
    pub op: ChangeOp,
    #[serde(rename = "recordId")]
    pub record_id: Uuid,
    #[serde(default)]
    pub status: Option<MatchStatus>,
}

/// Live stream of change events for a single tenant. Dropping the stream
/// aborts the listener task.
pub struct MatchChangeStream {
    pub rx: mpsc::Receiver<MatchChange>,
    task: JoinHandle<()>,
}

impl Drop for MatchChangeStream {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Match lifecycle store backed by Postgres.
///
/// Persists `MatchRecord` rows and exposes the tenant- and status-scoped
/// reads the dispatch board is built from. Status transitions are initiated
/// by dispatcher action; the store applies them, it never computes them.
pub struct MatchStore {
    pool: PgPool,
}

impl MatchStore {
    /// Connect and run pending migrations.
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, MatchStoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(5))
            .idle_timeout(Duration::from_secs(600))
            .test_before_acquire(true)
            .connect(database_url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Persist the `active` record for a (plan, load) pair the dispatcher
    /// acted on.
    ///
    /// `ON CONFLICT DO NOTHING` keeps the at-most-one-live-record invariant:
    /// acting twice on the same pair is a no-op. Returns whether a row was
    /// inserted.
    pub async fn record_match(
        &self,
        tenant_id: Uuid,
        plan_id: Uuid,
        load_id: Uuid,
    ) -> Result<bool, MatchStoreError> {
        let query = r#"
            INSERT INTO match_records (id, tenant_id, plan_id, load_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'active', NOW(), NOW())
            ON CONFLICT (plan_id, load_id) DO NOTHING
        "#;

        let result = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(tenant_id)
            .bind(plan_id)
            .bind(load_id)
            .execute(&self.pool)
            .await?;

        tracing::debug!(
            %tenant_id,
            %plan_id,
            %load_id,
            inserted = result.rows_affected() > 0,
            "Recorded match"
        );

        Ok(result.rows_affected() > 0)
    }

    /// Apply a dispatcher-initiated status transition. Tenant-guarded in the
    /// WHERE clause so a mis-scoped id can never touch another tenant's row;
    /// such an id looks identical to a nonexistent one and reports not found.
    pub async fn set_status(
        &self,
        tenant_id: Uuid,
        record_id: Uuid,
        status: MatchStatus,
    ) -> Result<(), MatchStoreError> {
        let query = r#"
            UPDATE match_records
            SET status = $3, updated_at = NOW()
            WHERE id = $1 AND tenant_id = $2
        "#;

        let result = sqlx::query(query)
            .bind(record_id)
            .bind(tenant_id)
            .bind(status)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            tracing::warn!(%tenant_id, %record_id, "Status transition matched no row");
            return Err(MatchStoreError::NotFound(format!(
                "match record {} for tenant {}",
                record_id, tenant_id
            )));
        }

        Ok(())
    }

    /// One status partition for a tenant, optionally bounded to rows updated
    /// at or after `since`.
    pub async fn get_by_status(
        &self,
        tenant_id: Uuid,
        status: MatchStatus,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<MatchRecord>, MatchStoreError> {
        let rows = match since {
            Some(bound) => {
                let query = r#"
                    SELECT id, tenant_id, plan_id, load_id, status, created_at, updated_at
                    FROM match_records
                    WHERE tenant_id = $1 AND status = $2 AND updated_at >= $3
                    ORDER BY updated_at DESC
                "#;
                sqlx::query(query)
                    .bind(tenant_id)
                    .bind(status)
                    .bind(bound)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let query = r#"
                    SELECT id, tenant_id, plan_id, load_id, status, created_at, updated_at
                    FROM match_records
                    WHERE tenant_id = $1 AND status = $2
                    ORDER BY updated_at DESC
                "#;
                sqlx::query(query)
                    .bind(tenant_id)
                    .bind(status)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let records = rows
            .iter()
            .map(|row| MatchRecord {
                id: row.get("id"),
                tenant_id: row.get("tenant_id"),
                plan_id: row.get("plan_id"),
                load_id: row.get("load_id"),
                status: row.get("status"),
                created_at: row.get("created_at"),
                updated_at: row.get("updated_at"),
            })
            .collect();

        Ok(records)
    }

    /// All seven status partitions for a tenant.
    ///
    /// The Eastern-midnight bound is computed once and shared by the
    /// day-boxed partitions (skipped, booked, expired); the seven reads are
    /// issued concurrently over the pool.
    pub async fn buckets(
        &self,
        tenant_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<MatchBuckets, MatchStoreError> {
        let day_start = start_of_business_day(now);

        let (active, skipped, bid, undecided, waitlist, booked, expired) = tokio::join!(
            self.get_by_status(tenant_id, MatchStatus::Active, None),
            self.get_by_status(tenant_id, MatchStatus::Skipped, Some(day_start)),
            self.get_by_status(tenant_id, MatchStatus::Bid, None),
            self.get_by_status(tenant_id, MatchStatus::Undecided, None),
            self.get_by_status(tenant_id, MatchStatus::Waitlist, None),
            self.get_by_status(tenant_id, MatchStatus::Booked, Some(day_start)),
            self.get_by_status(tenant_id, MatchStatus::Expired, Some(day_start)),
        );

        Ok(MatchBuckets {
            active: active?,
            skipped: skipped?,
            bid: bid?,
            undecided: undecided?,
            waitlist: waitlist?,
            booked: booked?,
            expired: expired?,
        })
    }

    /// Subscribe to change notifications for one tenant.
    ///
    /// Events for any other tenant are logged and dropped before they reach
    /// the receiver, even though the trigger payload is already scoped.
    pub async fn listen(&self, tenant_id: Uuid) -> Result<MatchChangeStream, MatchStoreError> {
        let mut listener = PgListener::connect_with(&self.pool).await?;
        listener.listen(MATCH_CHANNEL).await?;

        let (tx, rx) = mpsc::channel(64);

        let task = tokio::spawn(async move {
            loop {
                let notification = match listener.recv().await {
                    Ok(n) => n,
                    Err(e) => {
                        // PgListener re-establishes its connection itself;
                        // log and keep receiving.
                        tracing::warn!("Match change listener error: {}", e);
                        tokio::time::sleep(Duration::from_secs(1)).await;
                        continue;
                    }
                };

                let change: MatchChange = match serde_json::from_str(notification.payload()) {
                    Ok(c) => c,
                    Err(e) => {
                        tracing::warn!("Dropping malformed match change payload: {}", e);
                        continue;
                    }
                };

                if change.tenant_id != tenant_id {
                    tracing::warn!(
                        expected = %tenant_id,
                        got = %change.tenant_id,
                        "Dropping match change for another tenant"
                    );
                    continue;
                }

                if tx.send(change).await.is_err() {
                    // Subscriber went away; stop listening.
                    break;
                }
            }
        });

        Ok(MatchChangeStream { rx, task })
    }

    /// Health check for the database connection
    pub async fn health_check(&self) -> Result<bool, MatchStoreError> {
        sqlx::query("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|_| true)
            .map_err(Into::into)
    }
}
