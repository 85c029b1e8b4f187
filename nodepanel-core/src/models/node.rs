use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;

use super::resource_sample::ResourceSnapshot;

/// Node lifecycle status
///
/// `Unknown` is the initial state before any probe has completed. `Failing`
/// marks a node that was online and has started losing probes; `Failed` is
/// terminal until manual recovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    Unknown,
    Online,
    Offline,
    Failing,
    Failed,
}

impl NodeStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Failing => "failing",
            Self::Failed => "failed",
        }
    }

    /// Whether the node may receive workload placements.
    ///
    /// Nodes that have never completed a probe (`Unknown`) must never be a
    /// load-balancing or failover target.
    #[must_use]
    pub const fn is_placeable(&self) -> bool {
        matches!(self, Self::Online)
    }

    /// Whether the failover controller should evaluate this node
    #[must_use]
    pub const fn is_failover_candidate(&self) -> bool {
        matches!(self, Self::Offline | Self::Failing)
    }

    /// Terminal states require manual recovery
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl FromStr for NodeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unknown" => Ok(Self::Unknown),
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "failing" => Ok(Self::Failing),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Unknown node status: {s}")),
        }
    }
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transport used to reach a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// HTTP agent API, optionally authenticated with a bearer token
    Http,
    /// SSH session (probe + server listing only)
    Ssh,
}

impl TransportKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Ssh => "ssh",
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "http" => Ok(Self::Http),
            "ssh" => Ok(Self::Ssh),
            _ => Err(format!("Unknown transport: {s}")),
        }
    }
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// SSH connection parameters, stored as JSONB on the node row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshCredentials {
    pub username: String,
    pub port: u16,
    /// Password auth (mutually exclusive with `private_key` in practice,
    /// though the schema does not enforce it)
    pub password: Option<String>,
    /// PEM-encoded private key
    pub private_key: Option<String>,
    /// Trusted host-key fingerprint; a mismatch is surfaced as a structured
    /// error for an explicit user trust decision
    pub host_fingerprint: Option<String>,
}

impl Default for SshCredentials {
    fn default() -> Self {
        Self {
            username: "root".to_string(),
            port: 22,
            password: None,
            private_key: None,
            host_fingerprint: None,
        }
    }
}

/// Free-form node metadata used as load-balancing weighting hints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeCapabilities {
    /// Observed agent response time from the most recent probe
    pub response_time_ms: Option<u64>,
    /// Agent version reported by the health endpoint
    pub agent_version: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// A managed host running an agent (or reachable via SSH)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: i64,
    pub name: String,
    pub address: String,
    pub port: u16,
    pub status: NodeStatus,
    /// Most recent confirmed probe completion time (success or failure)
    pub last_seen: Option<DateTime<Utc>>,
    pub transport: TransportKind,
    /// Bearer token for the HTTP agent API
    pub agent_token: Option<String>,
    pub ssh: Option<SshCredentials>,
    /// Denormalized last telemetry snapshot for fast reads; the full series
    /// lives in `resource_samples`
    pub resources: Option<ResourceSnapshot>,
    pub capabilities: NodeCapabilities,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    /// Base URL of the node's HTTP agent API
    #[must_use]
    pub fn agent_base_url(&self) -> String {
        format!("http://{}:{}", self.address, self.port)
    }

    /// Whether SSH credentials are configured (enables probe fallback)
    #[must_use]
    pub const fn has_ssh(&self) -> bool {
        self.ssh.is_some()
    }

    /// Seconds since the node was last seen, if ever
    #[must_use]
    pub fn seconds_since_seen(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_seen
            .map(|seen| now.signed_duration_since(seen).num_seconds())
    }
}

/// Fields for registering a new node (explicit add, discovery, or enrollment)
#[derive(Debug, Clone)]
pub struct NewNode {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub transport: TransportKind,
    pub agent_token: Option<String>,
    pub ssh: Option<SshCredentials>,
    pub capabilities: NodeCapabilities,
}

impl NewNode {
    #[must_use]
    pub fn http(name: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
            port,
            transport: TransportKind::Http,
            agent_token: None,
            ssh: None,
            capabilities: NodeCapabilities::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            NodeStatus::Unknown,
            NodeStatus::Online,
            NodeStatus::Offline,
            NodeStatus::Failing,
            NodeStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<NodeStatus>().unwrap(), status);
        }
        assert!("bogus".parse::<NodeStatus>().is_err());
    }

    #[test]
    fn test_only_online_is_placeable() {
        assert!(NodeStatus::Online.is_placeable());
        assert!(!NodeStatus::Unknown.is_placeable());
        assert!(!NodeStatus::Offline.is_placeable());
        assert!(!NodeStatus::Failing.is_placeable());
        assert!(!NodeStatus::Failed.is_placeable());
    }

    #[test]
    fn test_failover_candidates() {
        assert!(NodeStatus::Offline.is_failover_candidate());
        assert!(NodeStatus::Failing.is_failover_candidate());
        assert!(!NodeStatus::Online.is_failover_candidate());
        assert!(!NodeStatus::Failed.is_failover_candidate());
    }

    #[test]
    fn test_agent_base_url() {
        let node = Node {
            id: 1,
            name: "node-1".to_string(),
            address: "10.0.0.5".to_string(),
            port: 8080,
            status: NodeStatus::Online,
            last_seen: None,
            transport: TransportKind::Http,
            agent_token: None,
            ssh: None,
            resources: None,
            capabilities: NodeCapabilities::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(node.agent_base_url(), "http://10.0.0.5:8080");
    }
}
