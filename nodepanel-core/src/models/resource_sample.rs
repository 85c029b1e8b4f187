use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// CPU telemetry as reported by the agent stats endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuTelemetry {
    pub usage_percent: f64,
    pub cores: Option<u32>,
    pub load_average: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryTelemetry {
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub usage_percent: f64,
}

/// One mounted filesystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMount {
    pub mount: String,
    pub total_bytes: u64,
    pub used_bytes: u64,
    pub usage_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiskTelemetry {
    pub mounts: Vec<DiskMount>,
}

impl DiskTelemetry {
    /// Highest per-mount usage, used for scoring and alerting
    #[must_use]
    pub fn max_usage_percent(&self) -> Option<f64> {
        self.mounts
            .iter()
            .map(|m| m.usage_percent)
            .fold(None, |acc, v| Some(acc.map_or(v, |a: f64| a.max(v))))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkTelemetry {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemTelemetry {
    pub uptime_seconds: u64,
    pub hostname: Option<String>,
    pub agent_version: Option<String>,
}

/// Normalized telemetry snapshot
///
/// All sections are optional: agents may omit fields, and SSH probes only
/// recover a subset. Consumers must only use the factors that are present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSnapshot {
    pub cpu: Option<CpuTelemetry>,
    pub memory: Option<MemoryTelemetry>,
    pub disk: Option<DiskTelemetry>,
    pub network: Option<NetworkTelemetry>,
    pub system: Option<SystemTelemetry>,
}

impl ResourceSnapshot {
    #[must_use]
    pub fn cpu_percent(&self) -> Option<f64> {
        self.cpu.as_ref().map(|c| c.usage_percent)
    }

    #[must_use]
    pub fn memory_percent(&self) -> Option<f64> {
        self.memory.as_ref().map(|m| m.usage_percent)
    }

    #[must_use]
    pub fn max_disk_percent(&self) -> Option<f64> {
        self.disk.as_ref().and_then(DiskTelemetry::max_usage_percent)
    }
}

/// One row of the append-only telemetry time series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceSample {
    pub id: i64,
    pub node_id: i64,
    pub snapshot: ResourceSnapshot,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_disk_usage() {
        let disk = DiskTelemetry {
            mounts: vec![
                DiskMount {
                    mount: "/".to_string(),
                    total_bytes: 100,
                    used_bytes: 40,
                    usage_percent: 40.0,
                },
                DiskMount {
                    mount: "/data".to_string(),
                    total_bytes: 100,
                    used_bytes: 96,
                    usage_percent: 96.0,
                },
            ],
        };
        assert_eq!(disk.max_usage_percent(), Some(96.0));
        assert_eq!(DiskTelemetry::default().max_usage_percent(), None);
    }

    #[test]
    fn test_snapshot_tolerates_missing_sections() {
        let snapshot: ResourceSnapshot = serde_json::from_str("{}").unwrap();
        assert!(snapshot.cpu_percent().is_none());
        assert!(snapshot.memory_percent().is_none());
        assert!(snapshot.max_disk_percent().is_none());
    }
}
