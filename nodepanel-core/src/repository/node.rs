use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::{
    models::{
        NewNode, Node, NodeCapabilities, NodeStatus, ResourceSnapshot, SshCredentials,
        TransportKind,
    },
    Error, Result,
};

const NODE_COLUMNS: &str = "id, name, address, port, status, last_seen, transport, agent_token, \
                            ssh_credentials, resources, capabilities, created_at, updated_at";

/// Node registry repository
///
/// The nodes table is the shared mutable state of the control plane: four
/// independent loops read-then-write it without a shared lock, so every
/// update here is a single statement (last-writer-wins on the row).
#[derive(Clone)]
pub struct NodeRepository {
    pool: PgPool,
}

impl NodeRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Register a new node. Used by the explicit add path, discovery, and
    /// agent-initiated enrollment; deduplicates on (address, port).
    pub async fn register(&self, new: &NewNode) -> Result<Node> {
        let ssh = new
            .ssh
            .as_ref()
            .map(serde_json::to_value)
            .transpose()?;
        let capabilities = serde_json::to_value(&new.capabilities)?;

        let row = sqlx::query(&format!(
            r"
            INSERT INTO nodes (name, address, port, status, transport, agent_token, ssh_credentials, capabilities, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW(), NOW())
            RETURNING {NODE_COLUMNS}
            ",
        ))
        .bind(&new.name)
        .bind(&new.address)
        .bind(i32::from(new.port))
        .bind(NodeStatus::Unknown.as_str())
        .bind(new.transport.as_str())
        .bind(new.agent_token.as_ref())
        .bind(ssh)
        .bind(capabilities)
        .fetch_one(&self.pool)
        .await?;

        row_to_node(&row)
    }

    pub async fn get_by_id(&self, node_id: i64) -> Result<Option<Node>> {
        let row = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE id = $1"
        ))
        .bind(node_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_node(&r)).transpose()
    }

    pub async fn get_by_endpoint(&self, address: &str, port: u16) -> Result<Option<Node>> {
        let row = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE address = $1 AND port = $2"
        ))
        .bind(address)
        .bind(i32::from(port))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_node(&r)).transpose()
    }

    /// All nodes in registry (insertion) order
    pub async fn list_all(&self) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_node).collect()
    }

    pub async fn list_by_status(&self, statuses: &[NodeStatus]) -> Result<Vec<Node>> {
        let status_strs: Vec<&str> = statuses.iter().map(NodeStatus::as_str).collect();
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE status = ANY($1) ORDER BY id"
        ))
        .bind(&status_strs)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_node).collect()
    }

    /// Online nodes excluding one id, the candidate set for failover targets
    pub async fn list_online_excluding(&self, node_id: i64) -> Result<Vec<Node>> {
        let rows = sqlx::query(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes WHERE status = $1 AND id <> $2 ORDER BY id"
        ))
        .bind(NodeStatus::Online.as_str())
        .bind(node_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_node).collect()
    }

    pub async fn update_status(&self, node_id: i64, status: NodeStatus) -> Result<()> {
        sqlx::query("UPDATE nodes SET status = $2, updated_at = NOW() WHERE id = $1")
            .bind(node_id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a successful probe: status, last_seen, denormalized telemetry
    /// and refreshed capability hints in one write.
    pub async fn record_probe_success(
        &self,
        node_id: i64,
        seen_at: DateTime<Utc>,
        resources: Option<&ResourceSnapshot>,
        capabilities: &NodeCapabilities,
    ) -> Result<()> {
        let resources = resources.map(serde_json::to_value).transpose()?;
        let capabilities = serde_json::to_value(capabilities)?;

        sqlx::query(
            r"
            UPDATE nodes
            SET status = $2, last_seen = $3,
                resources = COALESCE($4, resources),
                capabilities = $5,
                updated_at = NOW()
            WHERE id = $1
            ",
        )
        .bind(node_id)
        .bind(NodeStatus::Online.as_str())
        .bind(seen_at)
        .bind(resources)
        .bind(capabilities)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a failed probe. `last_seen` records the failure time, not the
    /// last success.
    pub async fn record_probe_failure(
        &self,
        node_id: i64,
        status: NodeStatus,
        seen_at: DateTime<Utc>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE nodes SET status = $2, last_seen = $3, updated_at = NOW() WHERE id = $1",
        )
        .bind(node_id)
        .bind(status.as_str())
        .bind(seen_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Overwrite the denormalized telemetry snapshot
    pub async fn update_resources(
        &self,
        node_id: i64,
        snapshot: &ResourceSnapshot,
    ) -> Result<()> {
        let resources = serde_json::to_value(snapshot)?;
        sqlx::query("UPDATE nodes SET resources = $2, updated_at = NOW() WHERE id = $1")
            .bind(node_id)
            .bind(resources)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Delete a node. Refused while any server still references it: orphaned
    /// pointers are only ever created by out-of-band deletions, never here.
    pub async fn delete(&self, node_id: i64) -> Result<()> {
        let referencing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM servers WHERE node_id = $1")
                .bind(node_id)
                .fetch_one(&self.pool)
                .await?;

        if referencing > 0 {
            return Err(Error::InvalidInput(format!(
                "Node {node_id} still owns {referencing} server(s); reassign them first"
            )));
        }

        let result = sqlx::query("DELETE FROM nodes WHERE id = $1")
            .bind(node_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("Node {node_id} not found")));
        }
        Ok(())
    }
}

fn row_to_node(row: &PgRow) -> Result<Node> {
    let status: String = row.try_get("status")?;
    let transport: String = row.try_get("transport")?;
    let ssh: Option<serde_json::Value> = row.try_get("ssh_credentials")?;
    let resources: Option<serde_json::Value> = row.try_get("resources")?;
    let capabilities: serde_json::Value = row.try_get("capabilities")?;
    let port: i32 = row.try_get("port")?;

    Ok(Node {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        port: u16::try_from(port)
            .map_err(|_| Error::Internal(format!("node port out of range: {port}")))?,
        status: NodeStatus::from_str(&status).map_err(Error::Internal)?,
        last_seen: row.try_get("last_seen")?,
        transport: TransportKind::from_str(&transport).map_err(Error::Internal)?,
        agent_token: row.try_get("agent_token")?,
        ssh: ssh
            .map(serde_json::from_value::<SshCredentials>)
            .transpose()?,
        resources: resources
            .map(serde_json::from_value::<ResourceSnapshot>)
            .transpose()?,
        capabilities: serde_json::from_value(capabilities)?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
