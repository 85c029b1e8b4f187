//! Wiring and lifecycle for the fleet control loops
//!
//! Each service owns its own state and cancellation; this facade only
//! constructs them against shared repositories and fans out start/shutdown.

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::task::JoinHandle;

use nodepanel_core::repository::{
    FailoverEventRepository, NodeRepository, ResourceSampleRepository, ServerRepository,
};
use nodepanel_core::Config;

use crate::balancer::LoadBalancer;
use crate::discovery::Discovery;
use crate::failover::FailoverController;
use crate::health::HealthMonitor;
use crate::remote::{AgentClient, NodeManager, SshChannel};
use crate::resources::ResourceMonitor;

/// All fleet services, wired against one pool and one SSH channel
pub struct FleetServices {
    pub health: Arc<HealthMonitor>,
    pub resources: Arc<ResourceMonitor>,
    pub failover: Arc<FailoverController>,
    pub discovery: Arc<Discovery>,
    pub balancer: Arc<LoadBalancer>,
    pub manager: Arc<NodeManager>,
}

impl FleetServices {
    #[must_use]
    pub fn new(pool: PgPool, config: &Config, ssh: Arc<dyn SshChannel>) -> Self {
        let nodes = NodeRepository::new(pool.clone());
        let servers = ServerRepository::new(pool.clone());
        let events = FailoverEventRepository::new(pool.clone());
        let samples = ResourceSampleRepository::new(pool);

        let health = Arc::new(HealthMonitor::new(
            nodes.clone(),
            Arc::clone(&ssh),
            config.health.clone(),
        ));
        let resources = Arc::new(ResourceMonitor::new(
            nodes.clone(),
            samples,
            config.resources.clone(),
        ));
        let failover = Arc::new(FailoverController::new(
            nodes.clone(),
            servers.clone(),
            events,
            config.failover.clone(),
        ));
        let discovery = Arc::new(Discovery::new(nodes.clone(), config.discovery.clone()));
        let balancer = Arc::new(LoadBalancer::new(nodes.clone(), servers, &config.balancer));
        let manager = Arc::new(NodeManager::new(
            nodes,
            AgentClient::new(Duration::from_secs(10)),
            ssh,
        ));

        Self {
            health,
            resources,
            failover,
            discovery,
            balancer,
            manager,
        }
    }

    /// Start every periodic loop; the returned handles finish on shutdown
    pub fn start_all(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.health.start(),
            self.resources.start(),
            self.failover.start(),
            self.discovery.start(),
        ]
    }

    /// Signal every loop to stop after its current tick
    pub fn shutdown_all(&self) {
        self.health.shutdown();
        self.resources.shutdown();
        self.failover.shutdown();
        self.discovery.shutdown();
    }
}
