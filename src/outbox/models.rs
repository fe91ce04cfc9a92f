use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, PgExecutor, PgPool};
use std::time::Duration;

use crate::error::Result;

/// OutboxEvent is a domain change waiting to be relayed to the broker
/// Maps to `outbox_events` table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OutboxEvent {
    pub id: i64,
    /// Id of the row this event describes
    pub aggregate_id: String,
    /// Aggregate kind, e.g. "Event"
    pub aggregate_type: String,
    /// e.g. "access_control.event_created"
    pub event_type: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    pub processed: bool,
    pub processed_at: Option<DateTime<Utc>>,
}

/// New OutboxEvent for creation (without generated fields)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOutboxEvent {
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: Value,
}

/// Outbox entry whose aggregate id is only known once the aggregate is saved
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxDraft {
    pub aggregate_type: String,
    pub event_type: String,
    pub payload: Value,
}

impl OutboxDraft {
    pub fn new(aggregate_type: &str, event_type: &str, payload: Value) -> Self {
        Self {
            aggregate_type: aggregate_type.to_string(),
            event_type: event_type.to_string(),
            payload,
        }
    }

    pub fn for_aggregate(self, aggregate_id: impl Into<String>) -> NewOutboxEvent {
        NewOutboxEvent {
            aggregate_id: aggregate_id.into(),
            aggregate_type: self.aggregate_type,
            event_type: self.event_type,
            payload: self.payload,
        }
    }
}

const OUTBOX_COLUMNS: &str =
    "id, aggregate_id, aggregate_type, event_type, payload, created_at, processed, processed_at";

impl OutboxEvent {
    /// Insert an outbox row; pass a transaction to keep it atomic with the aggregate
    pub async fn create<'e, E>(executor: E, new_event: &NewOutboxEvent) -> Result<OutboxEvent>
    where
        E: PgExecutor<'e>,
    {
        let sql = format!(
            r#"
            INSERT INTO outbox_events (aggregate_id, aggregate_type, event_type, payload)
            VALUES ($1, $2, $3, $4)
            RETURNING {OUTBOX_COLUMNS}
            "#
        );
        let event = sqlx::query_as::<_, OutboxEvent>(&sql)
            .bind(&new_event.aggregate_id)
            .bind(&new_event.aggregate_type)
            .bind(&new_event.event_type)
            .bind(&new_event.payload)
            .fetch_one(executor)
            .await?;

        Ok(event)
    }
}

/// Storage seam for the relay paths
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Unprocessed events at least `min_age` old, oldest first
    async fn fetch_unprocessed(&self, limit: i64, min_age: Duration) -> Result<Vec<OutboxEvent>>;

    /// The event with `id` if it exists and is still unprocessed
    async fn find_unprocessed(&self, id: i64) -> Result<Option<OutboxEvent>>;

    /// Mark events processed; returns how many rows changed
    async fn mark_processed(&self, ids: &[i64], at: DateTime<Utc>) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct PgOutboxStore {
    pool: PgPool,
}

impl PgOutboxStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl OutboxStore for PgOutboxStore {
    async fn fetch_unprocessed(&self, limit: i64, min_age: Duration) -> Result<Vec<OutboxEvent>> {
        let sql = format!(
            r#"
            SELECT {OUTBOX_COLUMNS}
            FROM outbox_events
            WHERE processed = false
              AND created_at <= NOW() - make_interval(secs => $2)
            ORDER BY created_at
            LIMIT $1
            "#
        );
        let events = sqlx::query_as::<_, OutboxEvent>(&sql)
            .bind(limit)
            .bind(min_age.as_secs_f64())
            .fetch_all(&self.pool)
            .await?;

        Ok(events)
    }

    async fn find_unprocessed(&self, id: i64) -> Result<Option<OutboxEvent>> {
        let sql = format!(
            r#"
            SELECT {OUTBOX_COLUMNS}
            FROM outbox_events
            WHERE id = $1 AND processed = false
            "#
        );
        let event = sqlx::query_as::<_, OutboxEvent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(event)
    }

    async fn mark_processed(&self, ids: &[i64], at: DateTime<Utc>) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let result = sqlx::query(
            r#"
            UPDATE outbox_events
            SET processed = true, processed_at = $2
            WHERE id = ANY($1) AND processed = false
            "#,
        )
        .bind(ids)
        .bind(at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
