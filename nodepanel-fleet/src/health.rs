//! Node health monitoring
//!
//! Probes every registered node on a fixed interval, flips status between
//! online/failing/offline, and persists telemetry plus `last_seen`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tokio::sync::RwLock;
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use nodepanel_core::config::HealthConfig;
use nodepanel_core::models::{Node, NodeStatus, ResourceSnapshot, TransportKind};
use nodepanel_core::repository::NodeRepository;

use crate::error::{Error, Result};
use crate::remote::agent::AgentClient;
use crate::remote::ssh::SshChannel;

/// Which channel produced a successful probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeTransport {
    Http,
    Ssh,
    /// HTTP probing failed and the configured SSH credentials answered
    SshFallback,
}

/// Outcome of probing a single node
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    pub node_id: i64,
    pub status: NodeStatus,
    pub transport: Option<ProbeTransport>,
    pub latency_ms: Option<u64>,
    pub telemetry: Option<ResourceSnapshot>,
    pub agent_version: Option<String>,
    pub error: Option<String>,
}

/// Aggregate of one full-fleet sweep. The sweep is not atomic across nodes:
/// each node's registry row is written as its probe completes.
#[derive(Debug, Clone)]
pub struct CheckAllReport {
    pub outcomes: Vec<ProbeOutcome>,
    pub online: usize,
    pub offline: usize,
    pub total: usize,
    pub checked_at: DateTime<Utc>,
}

/// Fleet status counts for dashboards
#[derive(Debug, Clone, Default)]
pub struct HealthSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub failing: usize,
    pub failed: usize,
    pub unknown: usize,
    pub last_check: Option<DateTime<Utc>>,
}

/// Next status after a terminal probe failure.
///
/// A node that was online first drops to `failing` (soft pre-failure marker);
/// any further failure lands on `offline`. `failed` is never overwritten here,
/// it requires manual recovery.
#[must_use]
pub const fn status_after_failure(previous: NodeStatus) -> NodeStatus {
    match previous {
        NodeStatus::Online => NodeStatus::Failing,
        NodeStatus::Failed => NodeStatus::Failed,
        _ => NodeStatus::Offline,
    }
}

/// Probe one node per the transport rules:
/// SSH-transport nodes get a single SSH probe (no HTTP attempt). HTTP nodes
/// get up to `http_attempts` attempts with linear backoff, then one SSH
/// fallback if credentials are configured.
pub async fn probe_node(
    agent: &AgentClient,
    ssh: &dyn SshChannel,
    config: &HealthConfig,
    node: &Node,
) -> ProbeOutcome {
    if node.transport == TransportKind::Ssh {
        return probe_over_ssh(ssh, node, ProbeTransport::Ssh).await;
    }

    let mut last_error: Option<Error> = None;
    for attempt in 1..=config.http_attempts {
        let started = Instant::now();
        match agent.health(node).await {
            Ok(health) => {
                let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
                // Telemetry is best-effort on a liveness probe
                let telemetry = agent.system_stats(node).await.ok();
                return ProbeOutcome {
                    node_id: node.id,
                    status: NodeStatus::Online,
                    transport: Some(ProbeTransport::Http),
                    latency_ms: Some(latency_ms),
                    telemetry,
                    agent_version: health.version,
                    error: None,
                };
            }
            Err(e) => {
                tracing::debug!(
                    node_id = node.id,
                    attempt,
                    error = %e,
                    "HTTP health probe attempt failed"
                );
                last_error = Some(e);
                if attempt < config.http_attempts {
                    tokio::time::sleep(Duration::from_secs(u64::from(attempt))).await;
                }
            }
        }
    }

    if node.has_ssh() {
        let outcome = probe_over_ssh(ssh, node, ProbeTransport::SshFallback).await;
        if outcome.status == NodeStatus::Online {
            return outcome;
        }
    }

    ProbeOutcome {
        node_id: node.id,
        status: NodeStatus::Offline,
        transport: None,
        latency_ms: None,
        telemetry: None,
        agent_version: None,
        error: last_error.map(|e| e.to_string()),
    }
}

async fn probe_over_ssh(
    ssh: &dyn SshChannel,
    node: &Node,
    transport: ProbeTransport,
) -> ProbeOutcome {
    match ssh.probe(node).await {
        Ok(probe) => ProbeOutcome {
            node_id: node.id,
            status: NodeStatus::Online,
            transport: Some(transport),
            latency_ms: probe.latency_ms,
            telemetry: Some(probe.snapshot),
            agent_version: None,
            error: None,
        },
        Err(e) => {
            tracing::debug!(node_id = node.id, error = %e, "SSH probe failed");
            ProbeOutcome {
                node_id: node.id,
                status: NodeStatus::Offline,
                transport: None,
                latency_ms: None,
                telemetry: None,
                agent_version: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// Health monitor service
///
/// Explicitly constructed with its own state and lifecycle; no module-level
/// singletons or global timer handles.
pub struct HealthMonitor {
    nodes: NodeRepository,
    agent: AgentClient,
    ssh: Arc<dyn SshChannel>,
    config: HealthConfig,
    cancel_token: CancellationToken,
    last_check: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl HealthMonitor {
    #[must_use]
    pub fn new(nodes: NodeRepository, ssh: Arc<dyn SshChannel>, config: HealthConfig) -> Self {
        let agent = AgentClient::new(Duration::from_secs(config.probe_timeout_seconds));
        Self {
            nodes,
            agent,
            ssh,
            config,
            cancel_token: CancellationToken::new(),
            last_check: Arc::new(RwLock::new(None)),
        }
    }

    /// Probe one node and persist the result.
    ///
    /// Success updates `last_seen` to probe completion time and stores
    /// telemetry; a terminal failure also updates `last_seen` (recording the
    /// failure time, not the last success) and demotes the status.
    pub async fn check_health(&self, node: &Node) -> Result<ProbeOutcome> {
        let outcome = probe_node(&self.agent, self.ssh.as_ref(), &self.config, node).await;
        self.persist_outcome(node, &outcome).await?;
        Ok(outcome)
    }

    async fn persist_outcome(&self, node: &Node, outcome: &ProbeOutcome) -> Result<()> {
        // Terminal nodes keep their status until manual recovery; their
        // telemetry is still refreshed on a successful probe.
        let now = Utc::now();

        if outcome.status == NodeStatus::Online {
            let mut capabilities = node.capabilities.clone();
            capabilities.response_time_ms = outcome.latency_ms;
            if let Some(version) = &outcome.agent_version {
                capabilities.agent_version = Some(version.clone());
            }

            if node.status.is_terminal() {
                if let Some(telemetry) = &outcome.telemetry {
                    self.nodes.update_resources(node.id, telemetry).await?;
                }
            } else {
                self.nodes
                    .record_probe_success(node.id, now, outcome.telemetry.as_ref(), &capabilities)
                    .await?;
            }
        } else if !node.status.is_terminal() {
            let next = status_after_failure(node.status);
            if next != node.status {
                tracing::warn!(
                    node_id = node.id,
                    from = %node.status,
                    to = %next,
                    error = outcome.error.as_deref().unwrap_or("unknown"),
                    "Node probe failed"
                );
            }
            self.nodes.record_probe_failure(node.id, next, now).await?;
        }

        Ok(())
    }

    /// Probe the whole fleet in batches of `probe_concurrency`; batches run
    /// sequentially, probes within a batch concurrently.
    pub async fn check_all(&self) -> Result<CheckAllReport> {
        let nodes = self.nodes.list_all().await?;
        let total = nodes.len();
        let mut outcomes = Vec::with_capacity(total);

        for batch in nodes.chunks(self.config.probe_concurrency.max(1)) {
            let results = join_all(batch.iter().map(|node| self.check_health(node))).await;
            for result in results {
                match result {
                    Ok(outcome) => outcomes.push(outcome),
                    Err(e) => tracing::error!(error = %e, "Failed to persist probe outcome"),
                }
            }
        }

        let checked_at = Utc::now();
        *self.last_check.write().await = Some(checked_at);

        let online = outcomes
            .iter()
            .filter(|o| o.status == NodeStatus::Online)
            .count();
        let offline = outcomes.len() - online;

        Ok(CheckAllReport {
            outcomes,
            online,
            offline,
            total,
            checked_at,
        })
    }

    /// Probe a single node by id, outside the periodic sweep
    pub async fn force_check(&self, node_id: i64) -> Result<ProbeOutcome> {
        let node = self
            .nodes
            .get_by_id(node_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("Node {node_id} not found")))?;
        self.check_health(&node).await
    }

    /// Fleet status counts from the registry plus the last sweep time
    pub async fn summary(&self) -> Result<HealthSummary> {
        let nodes = self.nodes.list_all().await?;
        let mut summary = HealthSummary {
            total: nodes.len(),
            last_check: *self.last_check.read().await,
            ..HealthSummary::default()
        };
        for node in &nodes {
            match node.status {
                NodeStatus::Online => summary.online += 1,
                NodeStatus::Offline => summary.offline += 1,
                NodeStatus::Failing => summary.failing += 1,
                NodeStatus::Failed => summary.failed += 1,
                NodeStatus::Unknown => summary.unknown += 1,
            }
        }
        Ok(summary)
    }

    /// Start the periodic sweep loop.
    ///
    /// Returns the `JoinHandle` so the caller can detect task completion.
    /// Use `shutdown()` to stop gracefully. Errors are logged and the loop
    /// continues on the next tick.
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let cancel_token = self.cancel_token.clone();
        let mut timer = interval(Duration::from_secs(self.config.interval_seconds));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        tracing::info!("Health monitor shutting down");
                        return;
                    }
                    _ = timer.tick() => {
                        match monitor.check_all().await {
                            Ok(report) => {
                                tracing::debug!(
                                    online = report.online,
                                    offline = report.offline,
                                    total = report.total,
                                    "Health sweep completed"
                                );
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Health sweep failed");
                            }
                        }
                    }
                }
            }
        })
    }

    /// Gracefully stop the sweep loop
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::ssh::test_support::ScriptedSshChannel;
    use crate::remote::ssh::UnconfiguredSshChannel;
    use nodepanel_core::models::{CpuTelemetry, NodeCapabilities, SshCredentials};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn http_node(address: String, port: u16, status: NodeStatus) -> Node {
        Node {
            id: 7,
            name: "node-7".to_string(),
            address,
            port,
            status,
            last_seen: None,
            transport: TransportKind::Http,
            agent_token: None,
            ssh: None,
            resources: None,
            capabilities: NodeCapabilities::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn fast_config() -> HealthConfig {
        HealthConfig {
            interval_seconds: 30,
            probe_timeout_seconds: 1,
            http_attempts: 1,
            probe_concurrency: 5,
        }
    }

    fn cpu_snapshot(usage: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            cpu: Some(CpuTelemetry {
                usage_percent: usage,
                cores: None,
                load_average: None,
            }),
            ..ResourceSnapshot::default()
        }
    }

    #[test]
    fn test_status_after_failure_transitions() {
        // An online node drops to failing first, then offline
        assert_eq!(status_after_failure(NodeStatus::Online), NodeStatus::Failing);
        assert_eq!(status_after_failure(NodeStatus::Failing), NodeStatus::Offline);
        assert_eq!(status_after_failure(NodeStatus::Offline), NodeStatus::Offline);
        assert_eq!(status_after_failure(NodeStatus::Unknown), NodeStatus::Offline);
        // failed is terminal until manual recovery
        assert_eq!(status_after_failure(NodeStatus::Failed), NodeStatus::Failed);
    }

    #[tokio::test]
    async fn test_http_probe_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "version": "2.0.1",
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/system/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cpu": { "usage_percent": 10.0 },
            })))
            .mount(&server)
            .await;

        let addr = server.address();
        let node = http_node(addr.ip().to_string(), addr.port(), NodeStatus::Unknown);
        let agent = AgentClient::new(Duration::from_secs(1));
        let ssh = UnconfiguredSshChannel;

        let outcome = probe_node(&agent, &ssh, &fast_config(), &node).await;
        assert_eq!(outcome.status, NodeStatus::Online);
        assert_eq!(outcome.transport, Some(ProbeTransport::Http));
        assert_eq!(outcome.agent_version.as_deref(), Some("2.0.1"));
        assert!(outcome.telemetry.is_some());
        assert!(outcome.latency_ms.is_some());
    }

    #[tokio::test]
    async fn test_http_probe_failure_without_ssh_goes_offline() {
        let server = MockServer::start().await;
        let addr = *server.address();
        drop(server);

        let node = http_node(addr.ip().to_string(), addr.port(), NodeStatus::Online);
        let agent = AgentClient::new(Duration::from_secs(1));
        let ssh = UnconfiguredSshChannel;

        let outcome = probe_node(&agent, &ssh, &fast_config(), &node).await;
        assert_eq!(outcome.status, NodeStatus::Offline);
        assert!(outcome.transport.is_none());
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn test_http_failure_falls_back_to_ssh() {
        let server = MockServer::start().await;
        let addr = *server.address();
        drop(server);

        let mut node = http_node(addr.ip().to_string(), addr.port(), NodeStatus::Online);
        node.ssh = Some(SshCredentials::default());

        let agent = AgentClient::new(Duration::from_secs(1));
        let ssh = ScriptedSshChannel::reachable(cpu_snapshot(33.0));

        let outcome = probe_node(&agent, &ssh, &fast_config(), &node).await;
        assert_eq!(outcome.status, NodeStatus::Online);
        assert_eq!(outcome.transport, Some(ProbeTransport::SshFallback));
        assert_eq!(
            outcome.telemetry.as_ref().and_then(ResourceSnapshot::cpu_percent),
            Some(33.0)
        );
        assert_eq!(ssh.probes.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_ssh_transport_node_skips_http() {
        // An SSH-transport node never touches HTTP: no server is running at
        // the address, yet the probe succeeds through the channel.
        let mut node = http_node("127.0.0.1".to_string(), 1, NodeStatus::Unknown);
        node.transport = TransportKind::Ssh;
        node.ssh = Some(SshCredentials::default());

        let agent = AgentClient::new(Duration::from_secs(1));
        let ssh = ScriptedSshChannel::reachable(cpu_snapshot(5.0));

        let outcome = probe_node(&agent, &ssh, &fast_config(), &node).await;
        assert_eq!(outcome.status, NodeStatus::Online);
        assert_eq!(outcome.transport, Some(ProbeTransport::Ssh));
    }

    #[tokio::test]
    async fn test_ssh_transport_failure_has_no_fallback() {
        let mut node = http_node("127.0.0.1".to_string(), 1, NodeStatus::Online);
        node.transport = TransportKind::Ssh;
        node.ssh = Some(SshCredentials::default());

        let agent = AgentClient::new(Duration::from_secs(1));
        let ssh = ScriptedSshChannel::unreachable();

        let outcome = probe_node(&agent, &ssh, &fast_config(), &node).await;
        assert_eq!(outcome.status, NodeStatus::Offline);
        assert_eq!(ssh.probes.load(std::sync::atomic::Ordering::Relaxed), 1);
    }

    #[tokio::test]
    #[ignore = "Requires Postgres"]
    async fn test_check_all_persists_outcomes() {
        // Integration test placeholder
    }
}
