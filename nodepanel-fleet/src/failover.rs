//! Failover detection, execution, and manual recovery
//!
//! Drives off the registry view the health monitor maintains; this
//! controller never probes nodes itself except during explicit recovery.
//! Failover moves ownership pointers only — migrated servers are not
//! restarted on their new node.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use nodepanel_core::config::FailoverConfig;
use nodepanel_core::models::{
    FailoverEvent, FailoverOutcome, Node, NodeStatus, Server, ServerStatus,
};
use nodepanel_core::repository::{FailoverEventRepository, NodeRepository, ServerRepository};

use crate::error::{Error, Result};
use crate::remote::agent::AgentClient;

/// Trigger check, pure over the registry row and the trailing event count:
/// the node has not been seen for longer than the offline window, or it is
/// `failing` and has failed over repeatedly inside the event window.
#[must_use]
pub fn should_failover(
    node: &Node,
    recent_events: i64,
    config: &FailoverConfig,
    now: DateTime<Utc>,
) -> bool {
    let stale = node
        .last_seen
        .is_some_and(|seen| (now - seen).num_seconds() > config.offline_after_seconds);

    stale || (node.status == NodeStatus::Failing && recent_events >= config.event_threshold)
}

/// Round-robin spread of a failed node's servers across the targets,
/// order-stable for equal input order
pub fn plan_migration(servers: &[Server], targets: &[Node]) -> Result<Vec<(i64, i64)>> {
    if targets.is_empty() {
        return Err(Error::Precondition(
            "No target nodes available for migration".to_string(),
        ));
    }

    Ok(servers
        .iter()
        .enumerate()
        .map(|(i, server)| (server.id, targets[i % targets.len()].id))
        .collect())
}

/// Outcome of one failover attempt
#[derive(Debug)]
pub struct FailoverReport {
    pub node_id: i64,
    pub outcome: FailoverOutcome,
    pub migrated: usize,
    pub failed: usize,
    pub target_nodes: usize,
    pub message: String,
}

/// Snapshot of failover state for operators
#[derive(Debug)]
pub struct FailoverStatus {
    pub failed_nodes: Vec<Node>,
    pub watched_nodes: Vec<Node>,
    pub recent_events: Vec<FailoverEvent>,
}

/// Failover controller service
pub struct FailoverController {
    nodes: NodeRepository,
    servers: ServerRepository,
    events: FailoverEventRepository,
    agent: AgentClient,
    config: FailoverConfig,
    cancel_token: CancellationToken,
}

impl FailoverController {
    #[must_use]
    pub fn new(
        nodes: NodeRepository,
        servers: ServerRepository,
        events: FailoverEventRepository,
        config: FailoverConfig,
    ) -> Self {
        Self {
            nodes,
            servers,
            events,
            agent: AgentClient::new(Duration::from_secs(5)),
            config,
            cancel_token: CancellationToken::new(),
        }
    }

    /// One pass over every `offline`/`failing` node, executing failover for
    /// each node whose trigger condition holds. Per-node failures are
    /// isolated and logged.
    pub async fn monitor_and_failover(&self) -> Result<Vec<FailoverReport>> {
        let candidates = self
            .nodes
            .list_by_status(&[NodeStatus::Offline, NodeStatus::Failing])
            .await?;
        let now = Utc::now();
        let window = now - chrono::Duration::hours(self.config.event_window_hours);
        let mut reports = Vec::new();

        for node in candidates {
            let recent_events = self.events.count_since(node.id, window).await?;
            if !should_failover(&node, recent_events, &self.config, now) {
                continue;
            }

            match self.execute_failover(node.id).await {
                Ok(report) => {
                    tracing::info!(
                        node_id = report.node_id,
                        outcome = %report.outcome,
                        migrated = report.migrated,
                        "Failover executed"
                    );
                    reports.push(report);
                }
                Err(e) => {
                    tracing::error!(node_id = node.id, error = %e, "Failover attempt failed");
                }
            }
        }

        Ok(reports)
    }

    /// Migrate the node's servers to healthy nodes and mark it `failed`.
    /// No remote stop is attempted against the dead node.
    pub async fn execute_failover(&self, node_id: i64) -> Result<FailoverReport> {
        let node = self
            .nodes
            .get_by_id(node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Node {node_id} not found")))?;

        let servers = self.servers.list_by_node(node.id).await?;
        if servers.is_empty() {
            let message = "No servers assigned; nothing to migrate".to_string();
            self.events
                .append(
                    node.id,
                    FailoverOutcome::Completed,
                    json!({ "reason": message }),
                    0,
                )
                .await?;
            return Ok(FailoverReport {
                node_id: node.id,
                outcome: FailoverOutcome::Completed,
                migrated: 0,
                failed: 0,
                target_nodes: 0,
                message,
            });
        }

        let targets = self.nodes.list_online_excluding(node.id).await?;
        if targets.is_empty() {
            let message = "no available nodes".to_string();
            self.events
                .append(
                    node.id,
                    FailoverOutcome::Failed,
                    json!({ "reason": message, "server_count": servers.len() }),
                    servers.len() as i32,
                )
                .await?;
            return Ok(FailoverReport {
                node_id: node.id,
                outcome: FailoverOutcome::Failed,
                migrated: 0,
                failed: servers.len(),
                target_nodes: 0,
                message,
            });
        }

        // Best-effort registry-side stop; the dead node cannot be reached
        for server in &servers {
            if let Err(e) = self
                .servers
                .update_status(server.id, ServerStatus::Stopped)
                .await
            {
                tracing::warn!(server_id = server.id, error = %e, "Could not mark server stopped");
            }
        }

        let mut migrated = 0;
        let mut failed = 0;
        for (server_id, target_id) in plan_migration(&servers, &targets)? {
            match self.servers.assign_node(server_id, Some(target_id)).await {
                Ok(()) => migrated += 1,
                Err(e) => {
                    tracing::warn!(server_id, target_id, error = %e, "Server migration failed");
                    failed += 1;
                }
            }
        }

        let outcome = if failed == 0 {
            FailoverOutcome::Completed
        } else if migrated > 0 {
            FailoverOutcome::Partial
        } else {
            FailoverOutcome::Error
        };

        self.events
            .append(
                node.id,
                outcome,
                json!({
                    "migrated": migrated,
                    "failed": failed,
                    "target_nodes": targets.len(),
                }),
                servers.len() as i32,
            )
            .await?;
        self.nodes
            .update_status(node.id, NodeStatus::Failed)
            .await?;

        Ok(FailoverReport {
            node_id: node.id,
            outcome,
            migrated,
            failed,
            target_nodes: targets.len(),
            message: format!("Migrated {migrated}/{} servers", servers.len()),
        })
    }

    /// Manual recovery: one HTTP reachability probe. Success brings the node
    /// back `online`; failure leaves status untouched and surfaces the
    /// error. Previously migrated servers stay where failover put them.
    pub async fn recover_node(&self, node_id: i64) -> Result<Node> {
        let node = self
            .nodes
            .get_by_id(node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Node {node_id} not found")))?;

        self.agent.health(&node).await?;

        let now = Utc::now();
        self.nodes
            .record_probe_success(node.id, now, None, &node.capabilities)
            .await?;
        tracing::info!(node_id, "Node manually recovered");

        self.nodes
            .get_by_id(node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Node {node_id} not found")))
    }

    /// Failed and watched nodes plus the recent event log
    pub async fn status(&self) -> Result<FailoverStatus> {
        let failed_nodes = self.nodes.list_by_status(&[NodeStatus::Failed]).await?;
        let watched_nodes = self
            .nodes
            .list_by_status(&[NodeStatus::Offline, NodeStatus::Failing])
            .await?;
        let recent_events = self.events.list_recent(20).await?;

        Ok(FailoverStatus {
            failed_nodes,
            watched_nodes,
            recent_events,
        })
    }

    /// Start the periodic monitoring loop
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let controller = Arc::clone(self);
        let cancel_token = self.cancel_token.clone();
        let mut timer = interval(Duration::from_secs(self.config.interval_seconds));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        tracing::info!("Failover controller shutting down");
                        return;
                    }
                    _ = timer.tick() => {
                        match controller.monitor_and_failover().await {
                            Ok(reports) if !reports.is_empty() => {
                                tracing::info!(count = reports.len(), "Failover cycle acted on nodes");
                            }
                            Ok(_) => {}
                            Err(e) => {
                                tracing::error!(error = %e, "Failover cycle failed");
                            }
                        }
                    }
                }
            }
        })
    }

    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}
