use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

/// Outcome of a single failover attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailoverOutcome {
    /// Every owned server was reassigned
    Completed,
    /// Some servers were reassigned, some were not
    Partial,
    /// Nothing could be reassigned (e.g. no available nodes)
    Failed,
    /// The attempt itself errored
    Error,
}

impl FailoverOutcome {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Error => "error",
        }
    }
}

impl FromStr for FailoverOutcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "partial" => Ok(Self::Partial),
            "failed" => Ok(Self::Failed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Unknown failover outcome: {s}")),
        }
    }
}

impl std::fmt::Display for FailoverOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Append-only record of one failover attempt
///
/// Doubles as the audit log and as the signal source for "has this node
/// failed repeatedly in the trailing window". Never mutated after insert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailoverEvent {
    pub id: i64,
    pub node_id: i64,
    pub status: FailoverOutcome,
    pub details: Value,
    pub server_count: i32,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_roundtrip() {
        for outcome in [
            FailoverOutcome::Completed,
            FailoverOutcome::Partial,
            FailoverOutcome::Failed,
            FailoverOutcome::Error,
        ] {
            assert_eq!(
                outcome.as_str().parse::<FailoverOutcome>().unwrap(),
                outcome
            );
        }
    }
}
