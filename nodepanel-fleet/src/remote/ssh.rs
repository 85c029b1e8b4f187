//! SSH side of the remote execution channel
//!
//! The wire-level SSH protocol is deliberately outside this crate; callers
//! inject an implementation of [`SshChannel`]. Through this channel only
//! liveness+stats and a server listing are obtainable — every other agent
//! operation is HTTP-only, a known capability gap that is surfaced as a
//! precondition error rather than silently patched.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use nodepanel_core::models::{Node, ResourceSnapshot};

use crate::error::{Error, Result};
use crate::remote::agent::AgentServer;

/// Result of an SSH liveness+stats probe
#[derive(Debug, Clone)]
pub struct SshProbe {
    pub snapshot: ResourceSnapshot,
    /// Round-trip time of the probe command
    pub latency_ms: Option<u64>,
}

/// Abstract SSH execution channel
///
/// Implementations must verify the node's trusted host-key fingerprint and
/// fail with [`Error::HostKeyMismatch`] on a mismatch; that error is meant
/// for an explicit user trust decision and must not be auto-retried.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait SshChannel: Send + Sync {
    /// Liveness + stats probe over SSH
    async fn probe(&self, node: &Node) -> Result<SshProbe>;

    /// List server processes visible over SSH
    async fn list_servers(&self, node: &Node) -> Result<Vec<AgentServer>>;
}

/// Channel used when no SSH backend is wired in
///
/// Probes fail with a precondition error, which the health monitor treats
/// the same as any probe failure: the node goes offline.
pub struct UnconfiguredSshChannel;

#[async_trait]
impl SshChannel for UnconfiguredSshChannel {
    async fn probe(&self, node: &Node) -> Result<SshProbe> {
        Err(Error::Precondition(format!(
            "no SSH channel configured (node {})",
            node.id
        )))
    }

    async fn list_servers(&self, node: &Node) -> Result<Vec<AgentServer>> {
        Err(Error::Precondition(format!(
            "no SSH channel configured (node {})",
            node.id
        )))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted channel for tests: succeeds or fails unconditionally
    pub struct ScriptedSshChannel {
        pub snapshot: Option<ResourceSnapshot>,
        pub probes: AtomicU32,
    }

    impl ScriptedSshChannel {
        pub fn reachable(snapshot: ResourceSnapshot) -> Self {
            Self {
                snapshot: Some(snapshot),
                probes: AtomicU32::new(0),
            }
        }

        pub fn unreachable() -> Self {
            Self {
                snapshot: None,
                probes: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SshChannel for ScriptedSshChannel {
        async fn probe(&self, _node: &Node) -> Result<SshProbe> {
            self.probes.fetch_add(1, Ordering::Relaxed);
            match &self.snapshot {
                Some(snapshot) => Ok(SshProbe {
                    snapshot: snapshot.clone(),
                    latency_ms: Some(12),
                }),
                None => Err(Error::Transport("connection refused".to_string())),
            }
        }

        async fn list_servers(&self, _node: &Node) -> Result<Vec<AgentServer>> {
            Ok(Vec::new())
        }
    }
}
