//! Raft role vocabulary shared by the agent client, labels and health policy

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Label key carrying the node's role
pub const ROLE_LABEL: &str = "role";
/// Label key carrying the node's health
pub const HEALTHY_LABEL: &str = "healthy";

pub const HEALTHY_YES: &str = "yes";
pub const HEALTHY_NO: &str = "no";

/// Label asking the operator to rebuild this node from the leader
pub const REBUILD_LABEL: &str = "rebuild";

/// Role of a node in the raft group
///
/// The agent reports it upper case (`LEADER`); labels carry it lower case
/// (`leader`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Leader,
    Follower,
    Idle,
    Candidate,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognized role: {0:?}")]
pub struct ParseRoleError(pub String);

impl Role {
    /// Form used in label values
    pub fn as_label(&self) -> &'static str {
        match self {
            Role::Leader => "leader",
            Role::Follower => "follower",
            Role::Idle => "idle",
            Role::Candidate => "candidate",
            Role::Unknown => "unknown",
        }
    }

    /// Form used by the agent's `state` field
    pub fn as_state(&self) -> &'static str {
        match self {
            Role::Leader => "LEADER",
            Role::Follower => "FOLLOWER",
            Role::Idle => "IDLE",
            Role::Candidate => "CANDIDATE",
            Role::Unknown => "UNKNOWN",
        }
    }

    /// Role recorded in a label set; absent means `Unknown`
    pub fn from_labels(labels: &BTreeMap<String, String>) -> Result<Role, ParseRoleError> {
        match labels.get(ROLE_LABEL) {
            Some(value) => value.parse(),
            None => Ok(Role::Unknown),
        }
    }
}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "leader" => Ok(Role::Leader),
            "follower" => Ok(Role::Follower),
            "idle" => Ok(Role::Idle),
            "candidate" => Ok(Role::Candidate),
            "unknown" => Ok(Role::Unknown),
            _ => Err(ParseRoleError(s.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// `healthy` label value
pub fn healthy_label(healthy: bool) -> &'static str {
    if healthy {
        HEALTHY_YES
    } else {
        HEALTHY_NO
    }
}

/// Point-in-time raft view from one agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RaftStatus {
    pub role: Role,
    /// `None` when the agent knows of no leader
    pub leader: Option<String>,
    pub peers: Vec<String>,
}

impl RaftStatus {
    /// True only when the agent says it is leader and names `self_address`
    pub fn is_leader_at(&self, self_address: &str) -> bool {
        self.role == Role::Leader
            && !self_address.is_empty()
            && self.leader.as_deref() == Some(self_address)
    }

    pub fn has_leader(&self) -> bool {
        self.leader.is_some()
    }
}
