use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Hosted server process state, as this core tracks it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Running,
    Stopped,
    Unknown,
}

impl ServerStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Unknown => "unknown",
        }
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "stopped" => Ok(Self::Stopped),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!("Unknown server status: {s}")),
        }
    }
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hosted server process/container and its owning node
///
/// `node_id` may dangle if the referenced node is later deleted; orphaned
/// servers stay operable and are handled by explicit reassignment, never a
/// foreign-key cascade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Server {
    pub id: i64,
    pub name: String,
    pub node_id: Option<i64>,
    pub status: ServerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Server {
    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.status, ServerStatus::Running)
    }

    #[must_use]
    pub const fn is_assigned(&self) -> bool {
        self.node_id.is_some()
    }
}

/// Per-node running/total server counts, grouped in one query for scoring
#[derive(Debug, Clone, Copy, Default)]
pub struct ServerCounts {
    pub total: i64,
    pub running: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ServerStatus::Running,
            ServerStatus::Stopped,
            ServerStatus::Unknown,
        ] {
            assert_eq!(status.as_str().parse::<ServerStatus>().unwrap(), status);
        }
    }
}
