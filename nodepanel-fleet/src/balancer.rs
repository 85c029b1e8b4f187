//! Load-aware placement of servers onto nodes
//!
//! Stateless scoring over the current registry view plus four placement
//! strategies. Applying a plan only rewrites each server's owning node;
//! starting or stopping the underlying process is the caller's concern.

use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Serialize};

use nodepanel_core::config::BalancerConfig;
use nodepanel_core::models::{Node, NodeStatus, ResourceSnapshot, Server, ServerCounts};
use nodepanel_core::repository::{NodeRepository, ServerRepository};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    RoundRobin,
    LeastConnections,
    ResourceBased,
    Weighted,
}

impl Strategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RoundRobin => "round_robin",
            Self::LeastConnections => "least_connections",
            Self::ResourceBased => "resource_based",
            Self::Weighted => "weighted",
        }
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "round_robin" => Ok(Self::RoundRobin),
            "least_connections" => Ok(Self::LeastConnections),
            "resource_based" => Ok(Self::ResourceBased),
            "weighted" => Ok(Self::Weighted),
            _ => Err(format!("Unknown balancing strategy: {s}")),
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Stand-in load factor when network telemetry carries no usable percent;
/// it keeps the blend from swinging purely on CPU and memory.
const NETWORK_BASELINE_PERCENT: f64 = 50.0;

/// 0-100 availability score, higher = more room. Two-tier penalties per
/// metric; absent metrics contribute no penalty.
#[must_use]
pub fn resource_score(snapshot: &ResourceSnapshot) -> f64 {
    let mut score = 100.0;

    if let Some(cpu) = snapshot.cpu_percent() {
        if cpu > 80.0 {
            score -= 2.0 * (cpu - 80.0);
        } else if cpu > 60.0 {
            score -= cpu - 60.0;
        }
    }

    if let Some(memory) = snapshot.memory_percent() {
        if memory > 80.0 {
            score -= 2.0 * (memory - 80.0);
        } else if memory > 60.0 {
            score -= memory - 60.0;
        }
    }

    if let Some(disk) = snapshot.max_disk_percent() {
        if disk > 90.0 {
            score -= 3.0 * (disk - 90.0);
        } else if disk > 75.0 {
            score -= disk - 75.0;
        }
    }

    score.clamp(0.0, 100.0)
}

/// Weighted blend of CPU (0.4), memory (0.3), running/total server ratio
/// (0.2), and a fixed network baseline (0.1). Only present factors
/// contribute; the blend is renormalized by the weights actually used.
#[must_use]
pub fn load_percentage(snapshot: Option<&ResourceSnapshot>, counts: ServerCounts) -> Option<f64> {
    let mut weighted_sum = 0.0;
    let mut weight_used = 0.0;

    if let Some(cpu) = snapshot.and_then(ResourceSnapshot::cpu_percent) {
        weighted_sum += 0.4 * cpu;
        weight_used += 0.4;
    }
    if let Some(memory) = snapshot.and_then(ResourceSnapshot::memory_percent) {
        weighted_sum += 0.3 * memory;
        weight_used += 0.3;
    }
    if counts.total > 0 {
        let ratio = counts.running as f64 / counts.total as f64 * 100.0;
        weighted_sum += 0.2 * ratio;
        weight_used += 0.2;
    }
    weighted_sum += 0.1 * NETWORK_BASELINE_PERCENT;
    weight_used += 0.1;

    if weight_used <= 0.1 && snapshot.is_none() && counts.total == 0 {
        // Baseline alone says nothing about the node
        return None;
    }
    Some(weighted_sum / weight_used)
}

/// Placement weight for the probabilistic strategy. Starts at 1.0, scaled by
/// availability when both CPU and memory are known, nudged by observed
/// response time and the coarse "reports a version" bonus. Floor of 0.1.
#[must_use]
pub fn node_weight(node: &Node) -> f64 {
    let mut weight = 1.0;

    if let Some(snapshot) = &node.resources {
        if snapshot.cpu_percent().is_some() && snapshot.memory_percent().is_some() {
            weight *= resource_score(snapshot) / 50.0;
        }
    }

    if let Some(rt) = node.capabilities.response_time_ms {
        if rt < 50 {
            weight *= 1.2;
        } else if rt > 200 {
            weight *= 0.8;
        }
    }

    if node.capabilities.agent_version.is_some() {
        weight *= 1.1;
    }

    weight.max(0.1)
}

/// Fresh per-node metrics computed by `analyze`
#[derive(Debug, Clone, Serialize)]
pub struct NodeMetrics {
    pub node_id: i64,
    pub name: String,
    pub load_percentage: Option<f64>,
    pub resource_score: f64,
    pub weight: f64,
    pub running_servers: i64,
    pub total_servers: i64,
}

impl NodeMetrics {
    fn from_node(node: &Node, counts: ServerCounts) -> Self {
        Self {
            node_id: node.id,
            name: node.name.clone(),
            load_percentage: load_percentage(node.resources.as_ref(), counts),
            resource_score: node
                .resources
                .as_ref()
                .map_or(100.0, resource_score),
            weight: node_weight(node),
            running_servers: counts.running,
            total_servers: counts.total,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LoadAnalysis {
    pub nodes: Vec<NodeMetrics>,
    #[serde(skip)]
    pub unassigned_servers: Vec<Server>,
}

impl LoadAnalysis {
    /// Population standard deviation of the known load percentages
    #[must_use]
    pub fn load_stddev(&self) -> Option<f64> {
        let loads: Vec<f64> = self.nodes.iter().filter_map(|n| n.load_percentage).collect();
        if loads.is_empty() {
            return None;
        }
        let mean = loads.iter().sum::<f64>() / loads.len() as f64;
        let variance =
            loads.iter().map(|l| (l - mean).powi(2)).sum::<f64>() / loads.len() as f64;
        Some(variance.sqrt())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Rebalance,
    Overload,
    Underutilized,
}

/// Ordered so that a max over recommendations picks the most urgent one
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub severity: Severity,
    pub node_id: Option<i64>,
    pub message: String,
    pub suggested_strategy: Strategy,
}

/// One server-to-node placement decided by a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub server_id: i64,
    pub node_id: i64,
}

#[derive(Debug, Serialize)]
pub struct BalancePlan {
    pub strategy: Strategy,
    pub assignments: Vec<Assignment>,
}

/// Plan placements without touching the registry. `nodes` must be in
/// registry order; ties break toward the earlier node.
pub fn plan_assignments<R: Rng>(
    strategy: Strategy,
    servers: &[Server],
    nodes: &[NodeMetrics],
    rng: &mut R,
) -> Result<Vec<Assignment>> {
    if nodes.is_empty() {
        return Err(Error::Precondition(
            "No online nodes available for placement".to_string(),
        ));
    }

    let assignments = match strategy {
        Strategy::RoundRobin => servers
            .iter()
            .enumerate()
            .map(|(i, server)| Assignment {
                server_id: server.id,
                node_id: nodes[i % nodes.len()].node_id,
            })
            .collect(),
        Strategy::LeastConnections => {
            let mut counts: Vec<i64> = nodes.iter().map(|n| n.running_servers).collect();
            servers
                .iter()
                .map(|server| {
                    // Re-evaluate the minimum after every assignment
                    let (idx, _) = counts
                        .iter()
                        .enumerate()
                        .min_by_key(|(_, c)| **c)
                        .unwrap_or((0, &0));
                    counts[idx] += 1;
                    Assignment {
                        server_id: server.id,
                        node_id: nodes[idx].node_id,
                    }
                })
                .collect()
        }
        Strategy::ResourceBased => {
            let mut scores: Vec<f64> = nodes.iter().map(|n| n.resource_score).collect();
            servers
                .iter()
                .map(|server| {
                    let (idx, _) = scores
                        .iter()
                        .enumerate()
                        .fold((0, f64::MIN), |best, (i, s)| {
                            if *s > best.1 {
                                (i, *s)
                            } else {
                                best
                            }
                        });
                    scores[idx] *= 0.95;
                    Assignment {
                        server_id: server.id,
                        node_id: nodes[idx].node_id,
                    }
                })
                .collect()
        }
        Strategy::Weighted => {
            let mut weights: Vec<f64> = nodes.iter().map(|n| n.weight).collect();
            servers
                .iter()
                .map(|server| {
                    let total: f64 = weights.iter().sum();
                    let mut roll = rng.random_range(0.0..total);
                    let mut idx = weights.len() - 1;
                    for (i, w) in weights.iter().enumerate() {
                        if roll < *w {
                            idx = i;
                            break;
                        }
                        roll -= w;
                    }
                    weights[idx] *= 0.98;
                    Assignment {
                        server_id: server.id,
                        node_id: nodes[idx].node_id,
                    }
                })
                .collect()
        }
    };

    Ok(assignments)
}

/// Stateless scoring and placement service over the node registry
pub struct LoadBalancer {
    nodes: NodeRepository,
    servers: ServerRepository,
    default_strategy: Strategy,
}

impl LoadBalancer {
    #[must_use]
    pub fn new(nodes: NodeRepository, servers: ServerRepository, config: &BalancerConfig) -> Self {
        // Config validation rejects unknown names up front; the fallback
        // only covers a balancer constructed around it.
        let default_strategy = config
            .default_strategy
            .parse()
            .unwrap_or(Strategy::ResourceBased);
        Self {
            nodes,
            servers,
            default_strategy,
        }
    }

    /// Strategy used when a caller does not request one explicitly
    #[must_use]
    pub const fn default_strategy(&self) -> Strategy {
        self.default_strategy
    }

    /// Place with the configured default strategy
    pub async fn balance_default(&self, servers: Option<Vec<Server>>) -> Result<BalancePlan> {
        self.balance(self.default_strategy, servers).await
    }

    /// Compute fresh metrics for every online node plus the set of servers
    /// awaiting placement. Nodes that never passed a probe are excluded.
    pub async fn analyze(&self) -> Result<LoadAnalysis> {
        let nodes = self.nodes.list_by_status(&[NodeStatus::Online]).await?;
        let counts = self.servers.counts_by_node().await?;
        let unassigned_servers = self.servers.list_unassigned().await?;

        let metrics = nodes
            .iter()
            .map(|node| {
                NodeMetrics::from_node(node, counts.get(&node.id).copied().unwrap_or_default())
            })
            .collect();

        Ok(LoadAnalysis {
            nodes: metrics,
            unassigned_servers,
        })
    }

    /// Place the given servers (or every unassigned server when None) and
    /// write the resulting ownership onto each server row.
    pub async fn balance(
        &self,
        strategy: Strategy,
        servers: Option<Vec<Server>>,
    ) -> Result<BalancePlan> {
        let analysis = self.analyze().await?;
        let servers = match servers {
            Some(servers) => servers,
            None => analysis.unassigned_servers.clone(),
        };

        let mut rng = rand::rng();
        let assignments = plan_assignments(strategy, &servers, &analysis.nodes, &mut rng)?;

        for assignment in &assignments {
            self.servers
                .assign_node(assignment.server_id, Some(assignment.node_id))
                .await?;
        }

        tracing::info!(
            strategy = %strategy,
            assigned = assignments.len(),
            "Applied load-balancing plan"
        );
        Ok(BalancePlan {
            strategy,
            assignments,
        })
    }

    /// Flag imbalance, overload, and waste in the current distribution
    pub async fn recommend(&self) -> Result<Vec<Recommendation>> {
        let analysis = self.analyze().await?;
        Ok(Self::recommendations_for(&analysis))
    }

    fn recommendations_for(analysis: &LoadAnalysis) -> Vec<Recommendation> {
        let mut recommendations = Vec::new();

        if let Some(stddev) = analysis.load_stddev() {
            if stddev > 20.0 {
                recommendations.push(Recommendation {
                    kind: RecommendationKind::Rebalance,
                    severity: Severity::High,
                    node_id: None,
                    message: format!(
                        "Load spread across nodes is uneven (stddev {stddev:.1} points)"
                    ),
                    suggested_strategy: Strategy::ResourceBased,
                });
            }
        }

        for node in &analysis.nodes {
            if let Some(load) = node.load_percentage {
                if load > 80.0 {
                    recommendations.push(Recommendation {
                        kind: RecommendationKind::Overload,
                        severity: Severity::Critical,
                        node_id: Some(node.node_id),
                        message: format!("Node {} is at {load:.1}% load", node.name),
                        suggested_strategy: Strategy::ResourceBased,
                    });
                }
            }
        }

        if !analysis.unassigned_servers.is_empty() {
            for node in &analysis.nodes {
                if node.load_percentage.is_some_and(|load| load < 20.0) {
                    recommendations.push(Recommendation {
                        kind: RecommendationKind::Underutilized,
                        severity: Severity::Medium,
                        node_id: Some(node.node_id),
                        message: format!(
                            "Node {} is under 20% load while {} servers await placement",
                            node.name,
                            analysis.unassigned_servers.len()
                        ),
                        suggested_strategy: Strategy::LeastConnections,
                    });
                }
            }
        }

        recommendations
    }

    /// Execute the single most urgent recommendation's suggested strategy
    /// over the unassigned servers. Returns None when nothing needs doing.
    pub async fn auto_balance(&self) -> Result<Option<(Recommendation, BalancePlan)>> {
        let recommendations = self.recommend().await?;
        let Some(top) = recommendations.into_iter().max_by_key(|r| r.severity) else {
            return Ok(None);
        };

        tracing::info!(
            kind = ?top.kind,
            severity = ?top.severity,
            strategy = %top.suggested_strategy,
            "Auto-balance acting on recommendation"
        );
        let plan = self.balance(top.suggested_strategy, None).await?;
        Ok(Some((top, plan)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use nodepanel_core::models::{
        CpuTelemetry, DiskMount, DiskTelemetry, MemoryTelemetry, NodeCapabilities, ServerStatus,
        TransportKind,
    };
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn snapshot(cpu: f64, memory: f64, disk: f64) -> ResourceSnapshot {
        ResourceSnapshot {
            cpu: Some(CpuTelemetry {
                usage_percent: cpu,
                cores: None,
                load_average: None,
            }),
            memory: Some(MemoryTelemetry {
                total_bytes: 1000,
                used_bytes: 500,
                usage_percent: memory,
            }),
            disk: Some(DiskTelemetry {
                mounts: vec![DiskMount {
                    mount: "/".to_string(),
                    total_bytes: 1000,
                    used_bytes: 500,
                    usage_percent: disk,
                }],
            }),
            network: None,
            system: None,
        }
    }

    fn metrics(node_id: i64, score: f64, running: i64, weight: f64) -> NodeMetrics {
        NodeMetrics {
            node_id,
            name: format!("node-{node_id}"),
            load_percentage: Some(50.0),
            resource_score: score,
            weight,
            running_servers: running,
            total_servers: running,
        }
    }

    fn server(id: i64) -> Server {
        Server {
            id,
            name: format!("srv-{id}"),
            node_id: None,
            status: ServerStatus::Stopped,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn test_node(id: i64, resources: Option<ResourceSnapshot>) -> Node {
        Node {
            id,
            name: format!("node-{id}"),
            address: "10.0.0.1".to_string(),
            port: 8080,
            status: NodeStatus::Online,
            last_seen: None,
            transport: TransportKind::Http,
            agent_token: None,
            ssh: None,
            resources,
            capabilities: NodeCapabilities::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_configured_default_strategy_is_used() {
        let pool = sqlx::PgPool::connect_lazy("postgresql://localhost/unused").unwrap();
        let config = BalancerConfig {
            default_strategy: "least_connections".to_string(),
        };
        let balancer = LoadBalancer::new(
            NodeRepository::new(pool.clone()),
            ServerRepository::new(pool),
            &config,
        );
        assert_eq!(balancer.default_strategy(), Strategy::LeastConnections);
    }

    #[test]
    fn test_strategy_parse_roundtrip() {
        for strategy in [
            Strategy::RoundRobin,
            Strategy::LeastConnections,
            Strategy::ResourceBased,
            Strategy::Weighted,
        ] {
            assert_eq!(strategy.as_str().parse::<Strategy>().unwrap(), strategy);
        }
        assert!("fastest".parse::<Strategy>().is_err());
    }

    #[test]
    fn test_resource_score_high_cpu_only() {
        // 100 - 2*(95-80) = 70, memory/disk in the free band
        assert_eq!(resource_score(&snapshot(95.0, 50.0, 50.0)), 70.0);
    }

    #[test]
    fn test_resource_score_soft_tier_and_clamp() {
        // 100 - (70-60) = 90
        assert_eq!(resource_score(&snapshot(70.0, 50.0, 50.0)), 90.0);
        // All metrics pinned: 100 - 40 - 40 - 30 clamps to 0
        assert_eq!(resource_score(&snapshot(100.0, 100.0, 100.0)), 0.0);
        assert_eq!(resource_score(&ResourceSnapshot::default()), 100.0);
    }

    #[test]
    fn test_load_percentage_renormalizes_missing_factors() {
        // Only CPU + baseline present: (0.4*60 + 0.1*50) / 0.5 = 58
        let snap = ResourceSnapshot {
            cpu: Some(CpuTelemetry {
                usage_percent: 60.0,
                cores: None,
                load_average: None,
            }),
            ..ResourceSnapshot::default()
        };
        let load = load_percentage(Some(&snap), ServerCounts::default()).unwrap();
        assert!((load - 58.0).abs() < 1e-9);
        assert!(load_percentage(None, ServerCounts::default()).is_none());
    }

    #[test]
    fn test_node_weight_bonuses_and_floor() {
        let mut node = test_node(1, Some(snapshot(50.0, 50.0, 50.0)));
        node.capabilities.response_time_ms = Some(20);
        node.capabilities.agent_version = Some("1.0.0".to_string());
        // 1.0 * (100/50) * 1.2 * 1.1
        assert!((node_weight(&node) - 2.64).abs() < 1e-9);

        let mut slow = test_node(2, Some(snapshot(100.0, 100.0, 100.0)));
        slow.capabilities.response_time_ms = Some(500);
        // score 0 => 0 * 0.8, floored at 0.1
        assert_eq!(node_weight(&slow), 0.1);
    }

    #[test]
    fn test_round_robin_cycles_in_registry_order() {
        let nodes = vec![metrics(1, 100.0, 0, 1.0), metrics(2, 100.0, 0, 1.0)];
        let servers: Vec<Server> = (1..=4).map(server).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_assignments(Strategy::RoundRobin, &servers, &nodes, &mut rng).unwrap();
        let targets: Vec<i64> = plan.iter().map(|a| a.node_id).collect();
        assert_eq!(targets, vec![1, 2, 1, 2]);
    }

    #[test]
    fn test_least_connections_never_skews_by_more_than_one() {
        let nodes = vec![metrics(1, 100.0, 0, 1.0), metrics(2, 100.0, 0, 1.0)];
        let servers: Vec<Server> = (1..=5).map(server).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let plan =
            plan_assignments(Strategy::LeastConnections, &servers, &nodes, &mut rng).unwrap();

        let mut counts: HashMap<i64, i64> = HashMap::new();
        for assignment in &plan {
            *counts.entry(assignment.node_id).or_default() += 1;
            let a = counts.get(&1).copied().unwrap_or(0);
            let b = counts.get(&2).copied().unwrap_or(0);
            assert!((a - b).abs() <= 1);
        }
        let a = counts.get(&1).copied().unwrap_or(0);
        let b = counts.get(&2).copied().unwrap_or(0);
        assert_eq!(a + b, 5);
        assert_eq!(a.max(b), 3);
    }

    #[test]
    fn test_least_connections_respects_existing_counts() {
        let nodes = vec![metrics(1, 100.0, 4, 1.0), metrics(2, 100.0, 0, 1.0)];
        let servers: Vec<Server> = (1..=3).map(server).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let plan =
            plan_assignments(Strategy::LeastConnections, &servers, &nodes, &mut rng).unwrap();
        assert!(plan.iter().all(|a| a.node_id == 2));
    }

    #[test]
    fn test_resource_based_decays_the_leader() {
        // A starts at 100, B at 90; A's effective score crosses below 90
        // after three assignments (100 -> 95 -> 90.25 -> 85.7)
        let nodes = vec![metrics(1, 100.0, 0, 1.0), metrics(2, 90.0, 0, 1.0)];
        let servers: Vec<Server> = (1..=4).map(server).collect();
        let mut rng = StdRng::seed_from_u64(7);
        let plan = plan_assignments(Strategy::ResourceBased, &servers, &nodes, &mut rng).unwrap();
        let targets: Vec<i64> = plan.iter().map(|a| a.node_id).collect();
        assert_eq!(targets, vec![1, 1, 1, 2]);
    }

    #[test]
    fn test_weighted_prefers_the_heavier_node() {
        let nodes = vec![metrics(1, 100.0, 0, 10.0), metrics(2, 100.0, 0, 0.1)];
        let servers: Vec<Server> = (1..=20).map(server).collect();
        let mut rng = StdRng::seed_from_u64(42);
        let plan = plan_assignments(Strategy::Weighted, &servers, &nodes, &mut rng).unwrap();
        let to_first = plan.iter().filter(|a| a.node_id == 1).count();
        assert!(to_first > 10, "expected the 100:1 weight to dominate, got {to_first}");
    }

    #[test]
    fn test_empty_node_set_is_a_precondition_error() {
        let servers = vec![server(1)];
        let mut rng = StdRng::seed_from_u64(7);
        let err = plan_assignments(Strategy::RoundRobin, &servers, &[], &mut rng).unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn test_recommendations_severity_ordering() {
        let analysis = LoadAnalysis {
            nodes: vec![
                NodeMetrics {
                    load_percentage: Some(95.0),
                    ..metrics(1, 20.0, 5, 1.0)
                },
                NodeMetrics {
                    load_percentage: Some(10.0),
                    ..metrics(2, 100.0, 0, 1.0)
                },
            ],
            unassigned_servers: vec![server(1)],
        };

        let recommendations = LoadBalancer::recommendations_for(&analysis);
        assert!(recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::Rebalance));
        assert!(recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::Overload && r.severity == Severity::Critical));
        assert!(recommendations
            .iter()
            .any(|r| r.kind == RecommendationKind::Underutilized));

        let top = recommendations.iter().max_by_key(|r| r.severity).unwrap();
        assert_eq!(top.kind, RecommendationKind::Overload);
    }

    #[test]
    fn test_no_recommendations_when_balanced() {
        let analysis = LoadAnalysis {
            nodes: vec![
                NodeMetrics {
                    load_percentage: Some(50.0),
                    ..metrics(1, 90.0, 2, 1.0)
                },
                NodeMetrics {
                    load_percentage: Some(55.0),
                    ..metrics(2, 90.0, 2, 1.0)
                },
            ],
            unassigned_servers: Vec::new(),
        };
        assert!(LoadBalancer::recommendations_for(&analysis).is_empty());
    }
}
