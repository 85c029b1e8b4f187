//! Resource telemetry collection, alerting, and trend analysis
//!
//! Pulls detailed stats from online HTTP-transport nodes on a timer, appends
//! to the time series, overwrites each node's denormalized snapshot, and
//! sweeps the series down to the retention window. SSH-only nodes are not
//! polled by this component; their telemetry only arrives via health probes.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;

use nodepanel_core::config::ResourceConfig;
use nodepanel_core::models::{
    NodeStatus, ResourceSample, ResourceSnapshot, TransportKind,
};
use nodepanel_core::repository::{NodeRepository, ResourceSampleRepository};

use crate::error::Result;
use crate::remote::agent::AgentClient;

/// Number of samples per window when comparing trends
const TREND_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertLevel {
    Warning,
    Critical,
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertMetric {
    Cpu,
    Memory,
    /// Per-mount disk usage; carries the mount point
    Disk(String),
}

impl std::fmt::Display for AlertMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Memory => write!(f, "memory"),
            Self::Disk(mount) => write!(f, "disk:{mount}"),
        }
    }
}

/// One threshold breach in a snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceAlert {
    pub metric: AlertMetric,
    pub level: AlertLevel,
    pub value: f64,
    pub threshold: f64,
}

/// Alert generation is a pure function of a snapshot; each metric yields at
/// most one alert (critical shadows warning), but multiple metrics may alert
/// at once.
#[must_use]
pub fn alerts_for(snapshot: &ResourceSnapshot) -> Vec<ResourceAlert> {
    let mut alerts = Vec::new();

    if let Some(cpu) = snapshot.cpu_percent() {
        if cpu > 90.0 {
            alerts.push(ResourceAlert {
                metric: AlertMetric::Cpu,
                level: AlertLevel::Critical,
                value: cpu,
                threshold: 90.0,
            });
        } else if cpu > 75.0 {
            alerts.push(ResourceAlert {
                metric: AlertMetric::Cpu,
                level: AlertLevel::Warning,
                value: cpu,
                threshold: 75.0,
            });
        }
    }

    if let Some(memory) = snapshot.memory_percent() {
        if memory > 90.0 {
            alerts.push(ResourceAlert {
                metric: AlertMetric::Memory,
                level: AlertLevel::Critical,
                value: memory,
                threshold: 90.0,
            });
        } else if memory > 80.0 {
            alerts.push(ResourceAlert {
                metric: AlertMetric::Memory,
                level: AlertLevel::Warning,
                value: memory,
                threshold: 80.0,
            });
        }
    }

    if let Some(disk) = &snapshot.disk {
        for mount in &disk.mounts {
            if mount.usage_percent > 95.0 {
                alerts.push(ResourceAlert {
                    metric: AlertMetric::Disk(mount.mount.clone()),
                    level: AlertLevel::Critical,
                    value: mount.usage_percent,
                    threshold: 95.0,
                });
            } else if mount.usage_percent > 85.0 {
                alerts.push(ResourceAlert {
                    metric: AlertMetric::Disk(mount.mount.clone()),
                    level: AlertLevel::Warning,
                    value: mount.usage_percent,
                    threshold: 85.0,
                });
            }
        }
    }

    alerts
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Trend {
    pub direction: TrendDirection,
    /// Percent change relative to the older window's mean (0 when that mean
    /// is 0)
    pub change_percent: f64,
    pub recent_mean: f64,
    pub previous_mean: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Compare the mean of the most recent `TREND_WINDOW` values against the
/// mean of the preceding window. `values` must be newest-first. Returns
/// None when there is no preceding window to compare against.
#[must_use]
pub fn trend_of(values: &[f64]) -> Option<Trend> {
    if values.len() <= TREND_WINDOW {
        return None;
    }

    let recent = &values[..TREND_WINDOW.min(values.len())];
    let previous = &values[TREND_WINDOW..(2 * TREND_WINDOW).min(values.len())];

    let recent_mean = mean(recent);
    let previous_mean = mean(previous);

    let direction = if recent_mean > previous_mean {
        TrendDirection::Increasing
    } else if recent_mean < previous_mean {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    };

    let change_percent = if previous_mean == 0.0 {
        0.0
    } else {
        (recent_mean - previous_mean) / previous_mean * 100.0
    };

    Some(Trend {
        direction,
        change_percent,
        recent_mean,
        previous_mean,
    })
}

/// Per-node outcome of one collection cycle
#[derive(Debug)]
pub struct NodeCollection {
    pub node_id: i64,
    pub name: String,
    pub collected: bool,
    pub alerts: Vec<ResourceAlert>,
    pub error: Option<String>,
}

#[derive(Debug)]
pub struct CollectionReport {
    pub collected: usize,
    pub total: usize,
    /// Rows removed by the retention sweep run alongside this cycle
    pub swept: u64,
    pub per_node: Vec<NodeCollection>,
}

#[derive(Debug)]
pub struct NodeResourceStatus {
    pub node_id: i64,
    pub name: String,
    pub status: NodeStatus,
    pub snapshot: Option<ResourceSnapshot>,
    pub alerts: Vec<ResourceAlert>,
}

#[derive(Debug, Default)]
pub struct FleetResourceSummary {
    pub avg_cpu_percent: Option<f64>,
    pub avg_memory_percent: Option<f64>,
    pub critical_alerts: usize,
    pub warning_alerts: usize,
}

#[derive(Debug)]
pub struct CurrentStatus {
    pub nodes: Vec<NodeResourceStatus>,
    pub summary: FleetResourceSummary,
}

#[derive(Debug)]
pub struct NodeReport {
    pub node_id: i64,
    pub name: String,
    pub samples: usize,
    pub avg_cpu_percent: Option<f64>,
    pub max_cpu_percent: Option<f64>,
    pub avg_memory_percent: Option<f64>,
    pub max_memory_percent: Option<f64>,
    pub cpu_trend: Option<Trend>,
    pub memory_trend: Option<Trend>,
}

#[derive(Debug)]
pub struct ResourceReport {
    pub range_hours: i64,
    pub generated_at: DateTime<Utc>,
    pub nodes: Vec<NodeReport>,
}

/// Resource monitor service
pub struct ResourceMonitor {
    nodes: NodeRepository,
    samples: ResourceSampleRepository,
    agent: AgentClient,
    config: ResourceConfig,
    cancel_token: CancellationToken,
}

impl ResourceMonitor {
    #[must_use]
    pub fn new(
        nodes: NodeRepository,
        samples: ResourceSampleRepository,
        config: ResourceConfig,
    ) -> Self {
        Self {
            nodes,
            samples,
            agent: AgentClient::new(Duration::from_secs(10)),
            config,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Pull stats from every online HTTP node, then run the retention sweep.
    /// Per-node failures are isolated; they never abort the cycle.
    pub async fn collect_all(&self) -> Result<CollectionReport> {
        let nodes = self.nodes.list_by_status(&[NodeStatus::Online]).await?;
        let total = nodes.len();
        let mut per_node = Vec::with_capacity(total);
        let mut collected = 0;

        for node in &nodes {
            if node.transport != TransportKind::Http {
                continue;
            }

            match self.collect_one(node.id, node).await {
                Ok(alerts) => {
                    for alert in &alerts {
                        tracing::warn!(
                            node_id = node.id,
                            metric = %alert.metric,
                            level = %alert.level,
                            value = alert.value,
                            "Resource threshold breached"
                        );
                    }
                    collected += 1;
                    per_node.push(NodeCollection {
                        node_id: node.id,
                        name: node.name.clone(),
                        collected: true,
                        alerts,
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(node_id = node.id, error = %e, "Telemetry collection failed");
                    per_node.push(NodeCollection {
                        node_id: node.id,
                        name: node.name.clone(),
                        collected: false,
                        alerts: Vec::new(),
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let cutoff = Utc::now() - chrono::Duration::days(self.config.effective_retention_days());
        let swept = self.samples.delete_older_than(cutoff).await?;
        if swept > 0 {
            tracing::debug!(swept, "Retention sweep removed old resource samples");
        }

        Ok(CollectionReport {
            collected,
            total,
            swept,
            per_node,
        })
    }

    async fn collect_one(
        &self,
        node_id: i64,
        node: &nodepanel_core::models::Node,
    ) -> Result<Vec<ResourceAlert>> {
        let snapshot = self.agent.system_stats(node).await?;
        self.samples.insert(node_id, &snapshot).await?;
        self.nodes.update_resources(node_id, &snapshot).await?;
        Ok(alerts_for(&snapshot))
    }

    /// Time series for one node over the trailing window. Gaps are expected
    /// when the node was offline during part of the window.
    pub async fn history(&self, node_id: i64, hours: i64) -> Result<Vec<ResourceSample>> {
        let since = Utc::now() - chrono::Duration::hours(hours);
        Ok(self.samples.history_since(node_id, since).await?)
    }

    /// Latest snapshot and alerts per node, with fleet-wide averages
    pub async fn current_status(&self) -> Result<CurrentStatus> {
        let nodes = self.nodes.list_all().await?;
        let mut statuses = Vec::with_capacity(nodes.len());
        let mut summary = FleetResourceSummary::default();
        let mut cpu_values = Vec::new();
        let mut memory_values = Vec::new();

        for node in nodes {
            let alerts = node.resources.as_ref().map(alerts_for).unwrap_or_default();
            for alert in &alerts {
                match alert.level {
                    AlertLevel::Critical => summary.critical_alerts += 1,
                    AlertLevel::Warning => summary.warning_alerts += 1,
                }
            }
            if node.status == NodeStatus::Online {
                if let Some(cpu) = node.resources.as_ref().and_then(ResourceSnapshot::cpu_percent)
                {
                    cpu_values.push(cpu);
                }
                if let Some(memory) = node
                    .resources
                    .as_ref()
                    .and_then(ResourceSnapshot::memory_percent)
                {
                    memory_values.push(memory);
                }
            }
            statuses.push(NodeResourceStatus {
                node_id: node.id,
                name: node.name,
                status: node.status,
                snapshot: node.resources,
                alerts,
            });
        }

        if !cpu_values.is_empty() {
            summary.avg_cpu_percent = Some(mean(&cpu_values));
        }
        if !memory_values.is_empty() {
            summary.avg_memory_percent = Some(mean(&memory_values));
        }

        Ok(CurrentStatus {
            nodes: statuses,
            summary,
        })
    }

    /// Per-node usage statistics and trends over a range
    pub async fn report(&self, range_hours: i64) -> Result<ResourceReport> {
        let nodes = self.nodes.list_all().await?;
        let since = Utc::now() - chrono::Duration::hours(range_hours);
        let mut reports = Vec::with_capacity(nodes.len());

        for node in nodes {
            let history = self.samples.history_since(node.id, since).await?;

            let cpu_series: Vec<f64> = history
                .iter()
                .filter_map(|s| s.snapshot.cpu_percent())
                .collect();
            let memory_series: Vec<f64> = history
                .iter()
                .filter_map(|s| s.snapshot.memory_percent())
                .collect();

            // History is oldest-first; trends want newest-first
            let cpu_newest_first: Vec<f64> = cpu_series.iter().rev().copied().collect();
            let memory_newest_first: Vec<f64> = memory_series.iter().rev().copied().collect();

            reports.push(NodeReport {
                node_id: node.id,
                name: node.name,
                samples: history.len(),
                avg_cpu_percent: (!cpu_series.is_empty()).then(|| mean(&cpu_series)),
                max_cpu_percent: cpu_series.iter().copied().fold(None, |acc: Option<f64>, v| {
                    Some(acc.map_or(v, |a| a.max(v)))
                }),
                avg_memory_percent: (!memory_series.is_empty()).then(|| mean(&memory_series)),
                max_memory_percent: memory_series
                    .iter()
                    .copied()
                    .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v)))),
                cpu_trend: trend_of(&cpu_newest_first),
                memory_trend: trend_of(&memory_newest_first),
            });
        }

        Ok(ResourceReport {
            range_hours,
            generated_at: Utc::now(),
            nodes: reports,
        })
    }

    /// Start the periodic collection loop
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let monitor = Arc::clone(self);
        let cancel_token = self.cancel_token.clone();
        let mut timer = interval(Duration::from_secs(self.config.interval_seconds));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        tracing::info!("Resource monitor shutting down");
                        return;
                    }
                    _ = timer.tick() => {
                        match monitor.collect_all().await {
                            Ok(report) => {
                                tracing::debug!(
                                    collected = report.collected,
                                    total = report.total,
                                    swept = report.swept,
                                    "Telemetry collection cycle completed"
                                );
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Telemetry collection cycle failed");
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

#[cfg(test)]
mod tests {
    use super::*;
    use nodepanel_core::models::{
        CpuTelemetry, DiskMount, DiskTelemetry, MemoryTelemetry,
    };

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

    #[test]
    fn test_cpu_critical_has_no_warning_duplicate() {
        let alerts = alerts_for(&snapshot(91.0, 50.0, 50.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].metric, AlertMetric::Cpu);
        assert_eq!(alerts[0].level, AlertLevel::Critical);
    }

    #[test]
    fn test_cpu_warning_band() {
        let alerts = alerts_for(&snapshot(80.0, 50.0, 50.0));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].level, AlertLevel::Warning);
        assert_eq!(alerts[0].threshold, 75.0);
    }

    #[test]
    fn test_multiple_metrics_alert_together() {
        let alerts = alerts_for(&snapshot(95.0, 85.0, 96.0));
        assert_eq!(alerts.len(), 3);
        assert!(alerts
            .iter()
            .any(|a| a.metric == AlertMetric::Cpu && a.level == AlertLevel::Critical));
        assert!(alerts
            .iter()
            .any(|a| a.metric == AlertMetric::Memory && a.level == AlertLevel::Warning));
        assert!(alerts.iter().any(
            |a| a.metric == AlertMetric::Disk("/".to_string()) && a.level == AlertLevel::Critical
        ));
    }

    #[test]
    fn test_quiet_snapshot_has_no_alerts() {
        assert!(alerts_for(&snapshot(50.0, 50.0, 50.0)).is_empty());
        assert!(alerts_for(&ResourceSnapshot::default()).is_empty());
    }

    #[test]
    fn test_trend_increasing() {
        // newest-first: recent window all 80, previous window all 40
        let mut values = vec![80.0; 10];
        values.extend(vec![40.0; 10]);
        let trend = trend_of(&values).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert!((trend.change_percent - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trend_decreasing_with_partial_previous_window() {
        // 10 recent at 20, only 4 previous at 40
        let mut values = vec![20.0; 10];
        values.extend(vec![40.0; 4]);
        let trend = trend_of(&values).unwrap();
        assert_eq!(trend.direction, TrendDirection::Decreasing);
        assert!((trend.change_percent - (-50.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn test_trend_needs_preceding_window() {
        assert!(trend_of(&[50.0; 10]).is_none());
        assert!(trend_of(&[]).is_none());
    }

    #[test]
    fn test_trend_zero_previous_mean_reports_zero_change() {
        let mut values = vec![10.0; 10];
        values.extend(vec![0.0; 10]);
        let trend = trend_of(&values).unwrap();
        assert_eq!(trend.direction, TrendDirection::Increasing);
        assert_eq!(trend.change_percent, 0.0);
    }
}
