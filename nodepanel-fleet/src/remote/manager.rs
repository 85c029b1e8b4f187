//! Operational front door for executing work against nodes
//!
//! Other components and external callers go through [`NodeManager`] to run
//! single or bulk operations over the remote execution channel. Bulk
//! operations run sequentially per node and collect partial failures instead
//! of aborting.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};

use nodepanel_core::models::{Node, NodeStatus, ResourceSnapshot, TransportKind};
use nodepanel_core::repository::NodeRepository;

use crate::error::{Error, Result};
use crate::remote::agent::{AgentClient, AgentServer};
use crate::remote::ssh::SshChannel;

/// One operation against a node's remote execution channel
#[derive(Debug, Clone)]
pub enum NodeOperation {
    Health,
    Stats,
    ListServers,
    StartServer { server_id: String },
    StopServer { server_id: String },
    RestartServer { server_id: String },
    CreateServer { config: Value },
    UpdateServer { server_id: String, config: Value },
    DeleteServer { server_id: String },
    ServerLogs { server_id: String, lines: u32 },
    ListBackups,
    TriggerBackup { backup_id: String },
    NetworkStatus,
    Execute { command: String },
}

impl NodeOperation {
    /// Probe-class operations are allowed against nodes in any status; they
    /// are how an operator inspects a node that is not (yet) online.
    #[must_use]
    pub const fn is_probe(&self) -> bool {
        matches!(self, Self::Health | Self::Stats | Self::ListServers)
    }

    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Stats => "stats",
            Self::ListServers => "list_servers",
            Self::StartServer { .. } => "start_server",
            Self::StopServer { .. } => "stop_server",
            Self::RestartServer { .. } => "restart_server",
            Self::CreateServer { .. } => "create_server",
            Self::UpdateServer { .. } => "update_server",
            Self::DeleteServer { .. } => "delete_server",
            Self::ServerLogs { .. } => "server_logs",
            Self::ListBackups => "list_backups",
            Self::TriggerBackup { .. } => "trigger_backup",
            Self::NetworkStatus => "network_status",
            Self::Execute { .. } => "execute",
        }
    }
}

/// Aggregated outcome of a bulk operation: per-node results and per-node
/// errors, both collected, neither aborting the other
#[derive(Debug, Default)]
pub struct BulkReport {
    pub results: Vec<(i64, Value)>,
    pub errors: Vec<(i64, String)>,
}

impl BulkReport {
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.results.len()
    }

    #[must_use]
    pub fn failed(&self) -> usize {
        self.errors.len()
    }
}

/// Per-target outcome of a configuration sync
#[derive(Debug)]
pub struct SyncReport {
    pub master_id: i64,
    pub created: Vec<(i64, usize)>,
    pub updated: Vec<(i64, usize)>,
    pub errors: Vec<(i64, String)>,
}

/// Front door for remote execution against registered nodes
pub struct NodeManager {
    nodes: NodeRepository,
    agent: AgentClient,
    ssh: Arc<dyn SshChannel>,
}

impl NodeManager {
    pub fn new(nodes: NodeRepository, agent: AgentClient, ssh: Arc<dyn SshChannel>) -> Self {
        Self { nodes, agent, ssh }
    }

    async fn load_node(&self, node_id: i64) -> Result<Node> {
        self.nodes
            .get_by_id(node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Node {node_id} not found")))
    }

    /// Execute one operation against one node
    pub async fn execute(&self, node_id: i64, op: &NodeOperation) -> Result<Value> {
        let node = self.load_node(node_id).await?;
        self.execute_on(&node, op).await
    }

    /// Execute against an already-loaded node row
    pub async fn execute_on(&self, node: &Node, op: &NodeOperation) -> Result<Value> {
        if !op.is_probe() && !node.status.is_placeable() {
            return Err(Error::Precondition(format!(
                "Node {} is {}, not online; refusing {}",
                node.id,
                node.status,
                op.name()
            )));
        }

        match node.transport {
            TransportKind::Ssh => self.execute_ssh(node, op).await,
            TransportKind::Http => self.execute_http(node, op).await,
        }
    }

    /// SSH-transport nodes only serve liveness+stats and a server listing
    async fn execute_ssh(&self, node: &Node, op: &NodeOperation) -> Result<Value> {
        match op {
            NodeOperation::Health | NodeOperation::Stats => {
                let probe = self.ssh.probe(node).await?;
                Ok(serde_json::to_value(probe.snapshot)?)
            }
            NodeOperation::ListServers => {
                let servers = self.ssh.list_servers(node).await?;
                Ok(serde_json::to_value(servers)?)
            }
            other => Err(Error::Precondition(format!(
                "Operation {} is not available over SSH transport (node {})",
                other.name(),
                node.id
            ))),
        }
    }

    async fn execute_http(&self, node: &Node, op: &NodeOperation) -> Result<Value> {
        match op {
            NodeOperation::Health => Ok(serde_json::to_value(self.agent.health(node).await?)?),
            NodeOperation::Stats => {
                Ok(serde_json::to_value(self.agent.system_stats(node).await?)?)
            }
            NodeOperation::ListServers => {
                Ok(serde_json::to_value(self.agent.list_servers(node).await?)?)
            }
            NodeOperation::StartServer { server_id } => {
                self.agent.start_server(node, server_id).await
            }
            NodeOperation::StopServer { server_id } => self.agent.stop_server(node, server_id).await,
            NodeOperation::RestartServer { server_id } => {
                self.agent.restart_server(node, server_id).await
            }
            NodeOperation::CreateServer { config } => self.agent.create_server(node, config).await,
            NodeOperation::UpdateServer { server_id, config } => {
                self.agent.update_server(node, server_id, config).await
            }
            NodeOperation::DeleteServer { server_id } => {
                self.agent.delete_server(node, server_id).await?;
                Ok(Value::Null)
            }
            NodeOperation::ServerLogs { server_id, lines } => {
                let logs = self.agent.server_logs(node, server_id, *lines).await?;
                Ok(Value::String(logs))
            }
            NodeOperation::ListBackups => self.agent.list_backups(node).await,
            NodeOperation::TriggerBackup { backup_id } => {
                self.agent.trigger_backup(node, backup_id).await
            }
            NodeOperation::NetworkStatus => self.agent.network_status(node).await,
            NodeOperation::Execute { command } => self.agent.execute(node, command).await,
        }
    }

    /// Execute one operation against many nodes, sequentially per node.
    /// Partial failure of one node never aborts the remaining nodes.
    pub async fn execute_bulk(&self, node_ids: &[i64], op: &NodeOperation) -> BulkReport {
        let mut report = BulkReport::default();

        for &node_id in node_ids {
            match self.execute(node_id, op).await {
                Ok(value) => report.results.push((node_id, value)),
                Err(e) => {
                    tracing::warn!(node_id, op = op.name(), error = %e, "Bulk operation failed for node");
                    report.errors.push((node_id, e.to_string()));
                }
            }
        }

        report
    }

    /// Push the master node's server configurations onto target nodes:
    /// servers missing on a target are created, existing ones (matched by
    /// name) are updated in place. Per-target errors are collected.
    pub async fn sync_server_configurations(
        &self,
        master_id: i64,
        target_ids: &[i64],
    ) -> Result<SyncReport> {
        let master = self.load_node(master_id).await?;
        if master.transport != TransportKind::Http {
            return Err(Error::Precondition(format!(
                "Master node {master_id} must use HTTP transport for config sync"
            )));
        }
        let master_servers = self.agent.list_servers(&master).await?;

        let mut report = SyncReport {
            master_id,
            created: Vec::new(),
            updated: Vec::new(),
            errors: Vec::new(),
        };

        for &target_id in target_ids {
            if target_id == master_id {
                continue;
            }
            match self.sync_one_target(&master_servers, target_id).await {
                Ok((created, updated)) => {
                    report.created.push((target_id, created));
                    report.updated.push((target_id, updated));
                }
                Err(e) => {
                    tracing::warn!(target_id, error = %e, "Config sync failed for target node");
                    report.errors.push((target_id, e.to_string()));
                }
            }
        }

        Ok(report)
    }

    async fn sync_one_target(
        &self,
        master_servers: &[AgentServer],
        target_id: i64,
    ) -> Result<(usize, usize)> {
        let target = self.load_node(target_id).await?;
        if !target.status.is_placeable() {
            return Err(Error::Precondition(format!(
                "Target node {target_id} is {}, not online",
                target.status
            )));
        }

        let existing = self.agent.list_servers(&target).await?;
        let by_name: HashMap<&str, &AgentServer> =
            existing.iter().map(|s| (s.name.as_str(), s)).collect();

        let mut created = 0;
        let mut updated = 0;
        for server in master_servers {
            let config = server
                .config
                .clone()
                .unwrap_or_else(|| json!({ "name": server.name }));
            match by_name.get(server.name.as_str()) {
                Some(current) => {
                    self.agent
                        .update_server(&target, &current.id, &config)
                        .await?;
                    updated += 1;
                }
                None => {
                    self.agent.create_server(&target, &config).await?;
                    created += 1;
                }
            }
        }

        Ok((created, updated))
    }

    /// Pull a fresh telemetry snapshot from each listed node, honoring its
    /// transport. Errors are collected per node.
    pub async fn collect_metrics(
        &self,
        node_ids: &[i64],
    ) -> (Vec<(i64, ResourceSnapshot)>, Vec<(i64, String)>) {
        let mut metrics = Vec::new();
        let mut errors = Vec::new();

        for &node_id in node_ids {
            let result = async {
                let node = self.load_node(node_id).await?;
                match node.transport {
                    TransportKind::Http => self.agent.system_stats(&node).await,
                    TransportKind::Ssh => Ok(self.ssh.probe(&node).await?.snapshot),
                }
            }
            .await;

            match result {
                Ok(snapshot) => metrics.push((node_id, snapshot)),
                Err(e) => errors.push((node_id, e.to_string())),
            }
        }

        (metrics, errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use chrono::Utc;
    use sqlx::PgPool;

    use crate::remote::ssh::{MockSshChannel, SshProbe};
    use nodepanel_core::models::NodeCapabilities;

    fn ssh_node(status: NodeStatus) -> Node {
        Node {
            id: 3,
            name: "node-3".to_string(),
            address: "10.0.0.3".to_string(),
            port: 22,
            status,
            last_seen: None,
            transport: TransportKind::Ssh,
            agent_token: None,
            ssh: None,
            resources: None,
            capabilities: NodeCapabilities::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn manager_with(ssh: MockSshChannel) -> NodeManager {
        // Lazy pool: never connects, the SSH paths under test stay off the
        // registry entirely.
        let pool = PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        NodeManager::new(
            NodeRepository::new(pool),
            AgentClient::new(Duration::from_secs(1)),
            Arc::new(ssh),
        )
    }

    #[tokio::test]
    async fn test_ssh_transport_serves_probe_operations() {
        let mut ssh = MockSshChannel::new();
        ssh.expect_probe().times(1).returning(|_| {
            Ok(SshProbe {
                snapshot: ResourceSnapshot::default(),
                latency_ms: Some(4),
            })
        });
        let manager = manager_with(ssh);

        let node = ssh_node(NodeStatus::Online);
        let value = manager
            .execute_on(&node, &NodeOperation::Stats)
            .await
            .unwrap();
        assert!(value.is_object());
    }

    #[tokio::test]
    async fn test_ssh_transport_refuses_lifecycle_operations() {
        // Non-probe operations must surface the capability gap without ever
        // touching the channel.
        let mut ssh = MockSshChannel::new();
        ssh.expect_probe().never();
        ssh.expect_list_servers().never();
        let manager = manager_with(ssh);

        let node = ssh_node(NodeStatus::Online);
        let err = manager
            .execute_on(
                &node,
                &NodeOperation::StartServer {
                    server_id: "s1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_probe_class_operations() {
        assert!(NodeOperation::Health.is_probe());
        assert!(NodeOperation::Stats.is_probe());
        assert!(NodeOperation::ListServers.is_probe());
        assert!(!NodeOperation::NetworkStatus.is_probe());
        assert!(!NodeOperation::StartServer {
            server_id: "s1".to_string()
        }
        .is_probe());
        assert!(!NodeOperation::Execute {
            command: "uptime".to_string()
        }
        .is_probe());
    }

    #[test]
    fn test_bulk_report_counts() {
        let report = BulkReport {
            results: vec![(1, Value::Null), (2, Value::Null)],
            errors: vec![(3, "connection refused".to_string())],
        };
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.failed(), 1);
    }
}
