use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{FailoverEvent, FailoverOutcome},
    Error, Result,
};

const EVENT_COLUMNS: &str = "id, node_id, status, details, server_count, created_at";

/// Append-only failover event log
#[derive(Clone)]
pub struct FailoverEventRepository {
    pool: PgPool,
}

impl FailoverEventRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Append one event. Rows are never updated afterwards.
    pub async fn append(
        &self,
        node_id: i64,
        outcome: FailoverOutcome,
        details: Value,
        server_count: i32,
    ) -> Result<FailoverEvent> {
        let row = sqlx::query(&format!(
            r"
            INSERT INTO failover_events (node_id, status, details, server_count, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            RETURNING {EVENT_COLUMNS}
            ",
        ))
        .bind(node_id)
        .bind(outcome.as_str())
        .bind(details)
        .bind(server_count)
        .fetch_one(&self.pool)
        .await?;

        row_to_event(&row)
    }

    /// Events for one node since a cutoff, used by the repeated-failure trigger
    pub async fn count_since(&self, node_id: i64, since: DateTime<Utc>) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM failover_events WHERE node_id = $1 AND created_at >= $2",
        )
        .bind(node_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn list_for_node(&self, node_id: i64, limit: i64) -> Result<Vec<FailoverEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM failover_events WHERE node_id = $1 \
             ORDER BY created_at DESC LIMIT $2"
        ))
        .bind(node_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    pub async fn list_recent(&self, limit: i64) -> Result<Vec<FailoverEvent>> {
        let rows = sqlx::query(&format!(
            "SELECT {EVENT_COLUMNS} FROM failover_events ORDER BY created_at DESC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &PgRow) -> Result<FailoverEvent> {
    let status: String = row.try_get("status")?;

    Ok(FailoverEvent {
        id: row.try_get("id")?,
        node_id: row.try_get("node_id")?,
        status: FailoverOutcome::from_str(&status).map_err(Error::Internal)?,
        details: row.try_get("details")?,
        server_count: row.try_get("server_count")?,
        created_at: row.try_get("created_at")?,
    })
}
