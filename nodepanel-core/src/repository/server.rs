use std::collections::HashMap;
use std::str::FromStr;

use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{Server, ServerCounts, ServerStatus},
    Error, Result,
};

const SERVER_COLUMNS: &str = "id, name, node_id, status, created_at, updated_at";

/// Server assignment repository
#[derive(Clone)]
pub struct ServerRepository {
    pool: PgPool,
}

impl ServerRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, server_id: i64) -> Result<Option<Server>> {
        let row = sqlx::query(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE id = $1"
        ))
        .bind(server_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_server(&r)).transpose()
    }

    /// All servers currently owned by a node, in stable id order
    pub async fn list_by_node(&self, node_id: i64) -> Result<Vec<Server>> {
        let rows = sqlx::query(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE node_id = $1 ORDER BY id"
        ))
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_server).collect()
    }

    /// Servers with no owning node
    pub async fn list_unassigned(&self) -> Result<Vec<Server>> {
        let rows = sqlx::query(&format!(
            "SELECT {SERVER_COLUMNS} FROM servers WHERE node_id IS NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_server).collect()
    }

    /// Per-node running/total counts in one grouped query
    pub async fn counts_by_node(&self) -> Result<HashMap<i64, ServerCounts>> {
        let rows = sqlx::query(
            r"
            SELECT node_id,
                   COUNT(*) AS total,
                   COUNT(*) FILTER (WHERE status = 'running') AS running
            FROM servers
            WHERE node_id IS NOT NULL
            GROUP BY node_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let node_id: i64 = row.try_get("node_id")?;
            counts.insert(
                node_id,
                ServerCounts {
                    total: row.try_get("total")?,
                    running: row.try_get("running")?,
                },
            );
        }
        Ok(counts)
    }

    /// Move ownership of a server to another node (or unassign with None).
    /// This only moves the pointer; it never touches the remote process.
    pub async fn assign_node(&self, server_id: i64, node_id: Option<i64>) -> Result<()> {
        let result =
            sqlx::query("UPDATE servers SET node_id = $2, updated_at = NOW() WHERE id = $1")
                .bind(server_id)
                .bind(node_id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Server {server_id} not found")));
        }
        Ok(())
    }

    pub async fn update_status(&self, server_id: i64, status: ServerStatus) -> Result<()> {
        sqlx::query("UPDATE servers SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(server_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_server(row: &PgRow) -> Result<Server> {
    let status: String = row.try_get("status")?;

    Ok(Server {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        node_id: row.try_get("node_id")?,
        status: ServerStatus::from_str(&status).map_err(Error::Internal)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
