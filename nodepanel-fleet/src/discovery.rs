//! Opportunistic discovery of unregistered agent endpoints
//!
//! Sweeps a configured CIDR range for hosts answering on the agent port,
//! confirms each candidate with a health request, and registers endpoints
//! the registry has not seen. Newly registered nodes start `unknown` and
//! stay out of placement until the health monitor confirms them.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use ipnet::IpNet;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout};
use tokio_util::sync::CancellationToken;

use nodepanel_core::config::DiscoveryConfig;
use nodepanel_core::models::NewNode;
use nodepanel_core::repository::NodeRepository;

use crate::error::{Error, Result};
use crate::remote::agent::AgentHealth;

/// Upper bound on hosts per sweep; larger ranges are a configuration error
/// rather than an hours-long scan.
const MAX_SCAN_HOSTS: usize = 4096;

/// An endpoint that answered the agent health check
#[derive(Debug, Clone)]
pub struct DiscoveredEndpoint {
    pub address: IpAddr,
    pub port: u16,
    pub agent_version: Option<String>,
}

#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub scanned: usize,
    pub responsive: usize,
    pub registered: Vec<i64>,
    pub already_known: usize,
}

/// Expand a CIDR into the host addresses a sweep will probe
pub fn scan_targets(cidr: &str) -> Result<Vec<IpAddr>> {
    let net: IpNet = cidr
        .parse()
        .map_err(|e| Error::Configuration(format!("Invalid discovery CIDR {cidr}: {e}")))?;

    let hosts: Vec<IpAddr> = match net {
        IpNet::V4(net) => net.hosts().map(IpAddr::V4).collect(),
        IpNet::V6(_) => {
            return Err(Error::Configuration(
                "IPv6 ranges are not supported for discovery".to_string(),
            ));
        }
    };

    if hosts.len() > MAX_SCAN_HOSTS {
        return Err(Error::Configuration(format!(
            "Discovery range {cidr} spans {} hosts; the sweep cap is {MAX_SCAN_HOSTS}",
            hosts.len()
        )));
    }

    Ok(hosts)
}

/// Network discovery service
pub struct Discovery {
    nodes: NodeRepository,
    http: reqwest::Client,
    config: DiscoveryConfig,
    cancel_token: CancellationToken,
}

impl Discovery {
    #[must_use]
    pub fn new(nodes: NodeRepository, config: DiscoveryConfig) -> Self {
        Self {
            nodes,
            http: reqwest::Client::new(),
            config,
            cancel_token: CancellationToken::new(),
        }
    }

    /// One full sweep: scan, confirm, register. Unresponsive hosts are
    /// silently skipped; registry failures are isolated per endpoint.
    pub async fn run_cycle(&self) -> Result<DiscoveryReport> {
        if !self.config.enabled {
            return Ok(DiscoveryReport::default());
        }
        let Some(cidr) = &self.config.cidr else {
            return Err(Error::Configuration(
                "Discovery is enabled but no CIDR range is configured".to_string(),
            ));
        };

        let endpoints = self.scan(cidr, self.config.agent_port).await?;
        let mut report = DiscoveryReport {
            scanned: scan_targets(cidr)?.len(),
            responsive: endpoints.len(),
            ..DiscoveryReport::default()
        };

        for endpoint in endpoints {
            let address = endpoint.address.to_string();
            if self
                .nodes
                .get_by_endpoint(&address, endpoint.port)
                .await?
                .is_some()
            {
                report.already_known += 1;
                continue;
            }

            let new_node = NewNode::http(
                format!("discovered-{address}"),
                address.clone(),
                endpoint.port,
            );
            match self.nodes.register(&new_node).await {
                Ok(node) => {
                    tracing::info!(
                        node_id = node.id,
                        %address,
                        port = endpoint.port,
                        "Registered discovered agent endpoint"
                    );
                    report.registered.push(node.id);
                }
                Err(e) => {
                    tracing::warn!(%address, error = %e, "Could not register discovered endpoint");
                }
            }
        }

        Ok(report)
    }

    /// Probe the range for agent endpoints, bounded fan-out per batch
    pub async fn scan(&self, cidr: &str, port: u16) -> Result<Vec<DiscoveredEndpoint>> {
        let targets = scan_targets(cidr)?;
        let mut endpoints = Vec::new();

        for batch in targets.chunks(self.config.scan_concurrency) {
            let probes = batch
                .iter()
                .map(|&address| self.probe_endpoint(address, port));
            for endpoint in join_all(probes).await.into_iter().flatten() {
                endpoints.push(endpoint);
            }
        }

        Ok(endpoints)
    }

    /// TCP connect, then an agent health request to weed out unrelated
    /// services listening on the same port
    async fn probe_endpoint(&self, address: IpAddr, port: u16) -> Option<DiscoveredEndpoint> {
        let connect_timeout = Duration::from_millis(self.config.connect_timeout_millis);
        let socket = SocketAddr::new(address, port);
        timeout(connect_timeout, TcpStream::connect(socket))
            .await
            .ok()?
            .ok()?;

        let health: AgentHealth = self
            .http
            .get(format!("http://{address}:{port}/health"))
            .timeout(Duration::from_secs(2))
            .send()
            .await
            .ok()?
            .error_for_status()
            .ok()?
            .json()
            .await
            .ok()?;

        tracing::debug!(%address, port, status = %health.status, "Agent endpoint responded");
        Some(DiscoveredEndpoint {
            address,
            port,
            agent_version: health.version,
        })
    }

    /// Start the periodic sweep loop
    pub fn start(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let discovery = Arc::clone(self);
        let cancel_token = self.cancel_token.clone();
        let mut timer = interval(Duration::from_secs(self.config.interval_seconds));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel_token.cancelled() => {
                        tracing::info!("Discovery shutting down");
                        return;
                    }
                    _ = timer.tick() => {
                        match discovery.run_cycle().await {
                            Ok(report) => {
                                tracing::debug!(
                                    scanned = report.scanned,
                                    responsive = report.responsive,
                                    registered = report.registered.len(),
                                    "Discovery sweep completed"
                                );
                            }
                            Err(e) => {
                                tracing::error!(error = %e, "Discovery sweep failed");
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

    #[test]
    fn test_scan_targets_excludes_network_and_broadcast() {
        let hosts = scan_targets("192.168.1.0/30").unwrap();
        assert_eq!(
            hosts,
            vec![
                "192.168.1.1".parse::<IpAddr>().unwrap(),
                "192.168.1.2".parse::<IpAddr>().unwrap(),
            ]
        );
    }

    #[test]
    fn test_scan_targets_single_host_range() {
        let hosts = scan_targets("127.0.0.1/32").unwrap();
        assert_eq!(hosts, vec!["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }

    #[test]
    fn test_scan_targets_rejects_huge_and_invalid_ranges() {
        assert!(matches!(
            scan_targets("10.0.0.0/8"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            scan_targets("not-a-cidr"),
            Err(Error::Configuration(_))
        ));
        assert!(matches!(
            scan_targets("fd00::/64"),
            Err(Error::Configuration(_))
        ));
    }
}
