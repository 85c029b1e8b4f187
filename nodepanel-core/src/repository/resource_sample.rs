use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{ResourceSample, ResourceSnapshot},
    Result,
};

/// Append-only telemetry time series
///
/// Read paths must tolerate gaps: samples are sparse when a node was offline
/// during part of the window.
#[derive(Clone)]
pub struct ResourceSampleRepository {
    pool: PgPool,
}

impl ResourceSampleRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, node_id: i64, snapshot: &ResourceSnapshot) -> Result<i64> {
        let value = serde_json::to_value(snapshot)?;
        let id: i64 = sqlx::query_scalar(
            r"
            INSERT INTO resource_samples (node_id, snapshot, created_at)
            VALUES ($1, $2, NOW())
            RETURNING id
            ",
        )
        .bind(node_id)
        .bind(value)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Samples for one node since a cutoff, oldest first
    pub async fn history_since(
        &self,
        node_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Vec<ResourceSample>> {
        let rows = sqlx::query(
            r"
            SELECT id, node_id, snapshot, created_at
            FROM resource_samples
            WHERE node_id = $1 AND created_at >= $2
            ORDER BY created_at ASC
            ",
        )
        .bind(node_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_sample).collect()
    }

    /// Most recent N samples for one node, newest first
    pub async fn latest(&self, node_id: i64, limit: i64) -> Result<Vec<ResourceSample>> {
        let rows = sqlx::query(
            r"
            SELECT id, node_id, snapshot, created_at
            FROM resource_samples
            WHERE node_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            ",
        )
        .bind(node_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_sample).collect()
    }

    /// Retention sweep: delete everything older than the cutoff, oldest rows
    /// first by definition. Returns the number of rows removed.
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM resource_samples WHERE created_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

fn row_to_sample(row: &PgRow) -> Result<ResourceSample> {
    let snapshot: serde_json::Value = row.try_get("snapshot")?;

    Ok(ResourceSample {
        id: row.try_get("id")?,
        node_id: row.try_get("node_id")?,
        snapshot: serde_json::from_value(snapshot)?,
        created_at: row.try_get("created_at")?,
    })
}
