use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::role::{RaftStatus, Role};

/// Administrative endpoints exposed by the agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    RaftStatus,
    Ping,
    TryToLeader,
    RaftDisable,
    RaftEnable,
    ClusterAdd,
    ClusterRemove,
    ClusterGtid,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::RaftStatus => "/v1/raft/status",
            Endpoint::Ping => "/v1/xenon/ping",
            Endpoint::TryToLeader => "/v1/raft/trytoleader",
            Endpoint::RaftDisable => "/v1/raft/disable",
            Endpoint::RaftEnable => "/v1/raft/enable",
            Endpoint::ClusterAdd => "/v1/cluster/add",
            Endpoint::ClusterRemove => "/v1/cluster/remove",
            Endpoint::ClusterGtid => "/v1/cluster/gtid",
        }
    }

    pub fn method(&self) -> Method {
        match self {
            Endpoint::RaftStatus | Endpoint::Ping | Endpoint::ClusterGtid => Method::GET,
            Endpoint::TryToLeader
            | Endpoint::RaftDisable
            | Endpoint::RaftEnable
            | Endpoint::ClusterAdd
            | Endpoint::ClusterRemove => Method::POST,
        }
    }

    /// Operation name used in errors and logs
    pub fn op(&self) -> &'static str {
        match self {
            Endpoint::RaftStatus => "status",
            Endpoint::Ping => "ping",
            Endpoint::TryToLeader => "force_leader_transfer",
            Endpoint::RaftDisable => "disable_raft",
            Endpoint::RaftEnable => "enable_raft",
            Endpoint::ClusterAdd => "add_member",
            Endpoint::ClusterRemove => "remove_member",
            Endpoint::ClusterGtid => "cluster_gtid",
        }
    }
}

/// Body of `/v1/raft/status`
#[derive(Debug, Clone, Deserialize)]
pub struct StatusResponse {
    pub state: Role,
    #[serde(default)]
    pub leader: Option<String>,
    #[serde(default)]
    pub nodes: Option<Vec<String>>,
}

impl From<StatusResponse> for RaftStatus {
    fn from(resp: StatusResponse) -> Self {
        RaftStatus {
            role: resp.state,
            leader: resp.leader.filter(|l| !l.trim().is_empty()),
            peers: resp.nodes.unwrap_or_default(),
        }
    }
}

/// Body of the membership endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MemberRequest {
    pub address: String,
}

/// One member's replication position as reported by `/v1/cluster/gtid`
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct GtidEntry {
    /// Raft address of the member, `<pod>.<service>...:<port>`
    #[serde(default)]
    pub id: String,
    /// Raft state as text; empty when the member did not answer
    #[serde(default)]
    pub raft: String,
    #[serde(default)]
    pub mysql: String,
    #[serde(default)]
    pub executed_gtid_set: String,
    #[serde(default)]
    pub retrieved_gtid_set: String,
}

impl GtidEntry {
    /// Raft role, `None` for members that are unreachable or report no state
    pub fn role(&self) -> Option<Role> {
        match self.raft.parse::<Role>() {
            Ok(Role::Unknown) | Err(_) => None,
            Ok(role) => Some(role),
        }
    }

    /// Pod name: the first DNS label of `id`
    pub fn pod_name(&self) -> &str {
        self.id.split('.').next().unwrap_or_default()
    }
}

/// Body of `/v1/cluster/gtid`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GtidResponse {
    #[serde(default)]
    pub gtid: Vec<GtidEntry>,
}
