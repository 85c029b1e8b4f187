//! HTTP client for the fixed remote agent surface
//!
//! Every call carries a bounded timeout so a single unreachable node cannot
//! stall a batch. An optional bearer token is attached when the node has one
//! configured.

use std::time::Duration;

use reqwest::{Method, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use nodepanel_core::models::{Node, ResourceSnapshot};

use crate::error::{Error, Result};

/// Payload of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentHealth {
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub uptime_seconds: Option<u64>,
}

/// One server as reported by `GET /servers`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentServer {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub config: Option<Value>,
}

/// Client for a node's HTTP agent API
#[derive(Clone)]
pub struct AgentClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl AgentClient {
    /// Create a client with a per-request timeout bound
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            // Connection reuse across probes of the same node; the timeout is
            // applied per request so it also bounds connect time.
            http: reqwest::Client::new(),
            timeout,
        }
    }

    fn request(&self, node: &Node, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", node.agent_base_url(), path);
        let mut builder = self.http.request(method, url).timeout(self.timeout);
        if let Some(token) = &node.agent_token {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, node: &Node, path: &str) -> Result<T> {
        let response = self
            .request(node, Method::GET, path)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn post_json(&self, node: &Node, path: &str, body: Option<&Value>) -> Result<Value> {
        let mut builder = self.request(node, Method::POST, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?.error_for_status()?;
        // Agents return 204 for some mutations
        if response.content_length() == Some(0) {
            return Ok(Value::Null);
        }
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    /// `GET /health` — liveness
    pub async fn health(&self, node: &Node) -> Result<AgentHealth> {
        self.get_json(node, "/health").await
    }

    /// `GET /system/stats` — telemetry
    pub async fn system_stats(&self, node: &Node) -> Result<ResourceSnapshot> {
        self.get_json(node, "/system/stats").await
    }

    /// `GET /servers`
    pub async fn list_servers(&self, node: &Node) -> Result<Vec<AgentServer>> {
        self.get_json(node, "/servers").await
    }

    /// `POST /servers/{id}/start`
    pub async fn start_server(&self, node: &Node, server_id: &str) -> Result<Value> {
        self.post_json(node, &format!("/servers/{server_id}/start"), None)
            .await
    }

    /// `POST /servers/{id}/stop`
    pub async fn stop_server(&self, node: &Node, server_id: &str) -> Result<Value> {
        self.post_json(node, &format!("/servers/{server_id}/stop"), None)
            .await
    }

    /// `POST /servers/{id}/restart`
    pub async fn restart_server(&self, node: &Node, server_id: &str) -> Result<Value> {
        self.post_json(node, &format!("/servers/{server_id}/restart"), None)
            .await
    }

    /// `POST /servers`
    pub async fn create_server(&self, node: &Node, config: &Value) -> Result<Value> {
        self.post_json(node, "/servers", Some(config)).await
    }

    /// `PUT /servers/{id}`
    pub async fn update_server(&self, node: &Node, server_id: &str, config: &Value) -> Result<Value> {
        let response = self
            .request(node, Method::PUT, &format!("/servers/{server_id}"))
            .json(config)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await.unwrap_or(Value::Null))
    }

    /// `DELETE /servers/{id}`
    pub async fn delete_server(&self, node: &Node, server_id: &str) -> Result<()> {
        self.request(node, Method::DELETE, &format!("/servers/{server_id}"))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// `GET /servers/{id}/logs`
    pub async fn server_logs(&self, node: &Node, server_id: &str, lines: u32) -> Result<String> {
        let response = self
            .request(node, Method::GET, &format!("/servers/{server_id}/logs"))
            .query(&[("lines", lines)])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    /// `GET /backups`
    pub async fn list_backups(&self, node: &Node) -> Result<Value> {
        self.get_json(node, "/backups").await
    }

    /// `POST /backups/{id}`
    pub async fn trigger_backup(&self, node: &Node, backup_id: &str) -> Result<Value> {
        self.post_json(node, &format!("/backups/{backup_id}"), None)
            .await
    }

    /// `GET /network/status`
    pub async fn network_status(&self, node: &Node) -> Result<Value> {
        self.get_json(node, "/network/status").await
    }

    /// `POST /system/execute`
    pub async fn execute(&self, node: &Node, command: &str) -> Result<Value> {
        let body = serde_json::json!({ "command": command });
        self.post_json(node, "/system/execute", Some(&body)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nodepanel_core::models::{NodeCapabilities, NodeStatus, TransportKind};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_node(server: &MockServer, token: Option<&str>) -> Node {
        let address = server.address();
        Node {
            id: 1,
            name: "node-1".to_string(),
            address: address.ip().to_string(),
            port: address.port(),
            status: NodeStatus::Online,
            last_seen: None,
            transport: TransportKind::Http,
            agent_token: token.map(str::to_string),
            ssh: None,
            resources: None,
            capabilities: NodeCapabilities::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_health_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .and(header("authorization", "Bearer sekrit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "version": "1.4.2",
            })))
            .mount(&server)
            .await;

        let client = AgentClient::new(Duration::from_secs(5));
        let node = test_node(&server, Some("sekrit"));
        let health = client.health(&node).await.unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.version.as_deref(), Some("1.4.2"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let server = MockServer::start().await;
        let node = test_node(&server, None);
        // Shut the server down so the port refuses connections
        drop(server);

        let client = AgentClient::new(Duration::from_secs(1));
        let err = client.health(&node).await.unwrap_err();
        assert!(err.is_transport());
    }

    #[tokio::test]
    async fn test_stats_parses_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/system/stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "cpu": { "usage_percent": 42.5, "cores": 8 },
                "memory": { "total_bytes": 1000, "used_bytes": 500, "usage_percent": 50.0 },
            })))
            .mount(&server)
            .await;

        let client = AgentClient::new(Duration::from_secs(5));
        let node = test_node(&server, None);
        let snapshot = client.system_stats(&node).await.unwrap();
        assert_eq!(snapshot.cpu_percent(), Some(42.5));
        assert_eq!(snapshot.memory_percent(), Some(50.0));
        assert!(snapshot.disk.is_none());
    }
}
