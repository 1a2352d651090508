use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{Endpoint, GtidEntry, GtidResponse, MemberRequest, StatusResponse};
use crate::config::AgentConfig;
use crate::role::RaftStatus;

/// User the agent expects in Basic auth
pub const ADMIN_USER: &str = "root";

/// Agent call error
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{op} on {host} timed out")]
    Timeout { op: &'static str, host: String },

    #[error("{op} on {host} failed: {message}")]
    Transport {
        op: &'static str,
        host: String,
        message: String,
    },

    #[error("{op} on {host} returned HTTP {status}")]
    Status {
        op: &'static str,
        host: String,
        status: u16,
    },

    #[error("{op} on {host} returned an undecodable body: {message}")]
    Decode {
        op: &'static str,
        host: String,
        message: String,
    },

    #[error("Peer {peer}: {source}")]
    Membership {
        peer: String,
        #[source]
        source: Box<AgentError>,
    },
}

impl AgentError {
    /// HTTP status when the agent answered with a non-2xx code
    pub fn status(&self) -> Option<u16> {
        match self {
            AgentError::Status { status, .. } => Some(*status),
            AgentError::Membership { source, .. } => source.status(),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            AgentError::Timeout { .. } => true,
            AgentError::Membership { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    fn from_reqwest(op: &'static str, host: &str, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AgentError::Timeout {
                op,
                host: host.to_string(),
            }
        } else {
            AgentError::Transport {
                op,
                host: host.to_string(),
                message: err.to_string(),
            }
        }
    }
}

/// Administrative operations on a consensus agent
///
/// `host` names the node whose agent is addressed; the port is fixed by
/// configuration.
#[async_trait]
pub trait ConsensusAgent: Send + Sync {
    async fn status(&self, host: &str) -> Result<RaftStatus, AgentError>;

    async fn ping(&self, host: &str) -> Result<(), AgentError>;

    /// Ask the agent on `host` to campaign for leadership
    async fn force_leader_transfer(&self, host: &str) -> Result<(), AgentError>;

    async fn add_member(&self, host: &str, peer: &str) -> Result<(), AgentError>;

    async fn remove_member(&self, host: &str, peer: &str) -> Result<(), AgentError>;

    /// Stop the agent on `host` from taking part in elections
    async fn disable_raft(&self, host: &str) -> Result<(), AgentError>;

    async fn enable_raft(&self, host: &str) -> Result<(), AgentError>;

    /// Executed GTID set of every member, as seen by the agent on `host`
    async fn cluster_gtid(&self, host: &str) -> Result<Vec<GtidEntry>, AgentError>;
}

/// HTTP client for the agent API
///
/// Every request carries Basic auth and the configured deadline.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    port: u16,
    password: String,
}

impl AgentClient {
    pub fn new(config: &AgentConfig) -> Self {
        Self::with_timeout(config.port, &config.password, config.request_timeout())
    }

    pub fn with_timeout(port: u16, password: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            port,
            password: password.to_string(),
        }
    }

    fn url(&self, host: &str, endpoint: Endpoint) -> String {
        format!("http://{}:{}{}", host, self.port, endpoint.path())
    }

    async fn send(
        &self,
        host: &str,
        endpoint: Endpoint,
        body: Option<&MemberRequest>,
    ) -> Result<Response, AgentError> {
        let op = endpoint.op();
        let url = self.url(host, endpoint);
        debug!(op, url = %url, "Calling agent");

        let mut request = self
            .client
            .request(endpoint.method(), &url)
            .basic_auth(ADMIN_USER, Some(&self.password));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AgentError::from_reqwest(op, host, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::Status {
                op,
                host: host.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }

    async fn membership(&self, host: &str, endpoint: Endpoint, peer: &str) -> Result<(), AgentError> {
        let body = MemberRequest {
            address: peer.to_string(),
        };
        self.send(host, endpoint, Some(&body))
            .await
            .map(|_| ())
            .map_err(|e| AgentError::Membership {
                peer: peer.to_string(),
                source: Box::new(e),
            })
    }

    async fn fetch<T: DeserializeOwned>(&self, host: &str, endpoint: Endpoint) -> Result<T, AgentError> {
        let op = endpoint.op();
        let response = self.send(host, endpoint, None).await?;

        let text = response
            .text()
            .await
            .map_err(|e| AgentError::from_reqwest(op, host, e))?;

        serde_json::from_str(&text).map_err(|e| AgentError::Decode {
            op,
            host: host.to_string(),
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl ConsensusAgent for AgentClient {
    async fn status(&self, host: &str) -> Result<RaftStatus, AgentError> {
        let decoded: StatusResponse = self.fetch(host, Endpoint::RaftStatus).await?;
        Ok(decoded.into())
    }

    async fn ping(&self, host: &str) -> Result<(), AgentError> {
        self.send(host, Endpoint::Ping, None).await.map(|_| ())
    }

    async fn force_leader_transfer(&self, host: &str) -> Result<(), AgentError> {
        self.send(host, Endpoint::TryToLeader, None).await.map(|_| ())
    }

    async fn add_member(&self, host: &str, peer: &str) -> Result<(), AgentError> {
        self.membership(host, Endpoint::ClusterAdd, peer).await
    }

    async fn remove_member(&self, host: &str, peer: &str) -> Result<(), AgentError> {
        self.membership(host, Endpoint::ClusterRemove, peer).await
    }

    async fn disable_raft(&self, host: &str) -> Result<(), AgentError> {
        self.send(host, Endpoint::RaftDisable, None).await.map(|_| ())
    }

    async fn enable_raft(&self, host: &str) -> Result<(), AgentError> {
        self.send(host, Endpoint::RaftEnable, None).await.map(|_| ())
    }

    async fn cluster_gtid(&self, host: &str) -> Result<Vec<GtidEntry>, AgentError> {
        let decoded: GtidResponse = self.fetch(host, Endpoint::ClusterGtid).await?;
        Ok(decoded.gtid)
    }
}
