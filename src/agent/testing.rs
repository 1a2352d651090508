//! Scripted `ConsensusAgent`

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{AgentError, ConsensusAgent, GtidEntry};
use crate::role::{RaftStatus, Role};

#[derive(Debug, Clone)]
pub enum Reply {
    Ok,
    Timeout,
    Http(u16),
}

impl Reply {
    fn into_result(self, op: &'static str, host: &str) -> Result<(), AgentError> {
        match self {
            Reply::Ok => Ok(()),
            Reply::Timeout => Err(AgentError::Timeout {
                op,
                host: host.to_string(),
            }),
            Reply::Http(status) => Err(AgentError::Status {
                op,
                host: host.to_string(),
                status,
            }),
        }
    }
}

struct FakeState {
    status: RaftStatus,
    status_reply: Reply,
    gtid: Vec<GtidEntry>,
    reply: Reply,
    op_replies: HashMap<&'static str, Reply>,
    calls: Vec<String>,
}

pub struct FakeAgent {
    state: Mutex<FakeState>,
}

impl FakeAgent {
    pub fn with_status(role: Role, leader: Option<&str>) -> Self {
        Self {
            state: Mutex::new(FakeState {
                status: RaftStatus {
                    role,
                    leader: leader.map(str::to_string),
                    peers: Vec::new(),
                },
                status_reply: Reply::Ok,
                gtid: Vec::new(),
                reply: Reply::Ok,
                op_replies: HashMap::new(),
                calls: Vec::new(),
            }),
        }
    }

    /// Members returned by `cluster_gtid`, as `(id, raft, executed set)`
    pub fn with_gtid(self, members: &[(&str, &str, &str)]) -> Self {
        self.state.lock().unwrap().gtid = members
            .iter()
            .map(|(id, raft, executed)| GtidEntry {
                id: id.to_string(),
                raft: raft.to_string(),
                mysql: "ALIVE".to_string(),
                executed_gtid_set: executed.to_string(),
                retrieved_gtid_set: String::new(),
            })
            .collect();
        self
    }

    /// Make `status` fail
    pub fn fail_status(&self, reply: Reply) {
        self.state.lock().unwrap().status_reply = reply;
    }

    /// Make every other operation fail
    pub fn fail_others(&self, reply: Reply) {
        self.state.lock().unwrap().reply = reply;
    }

    /// Make a single operation fail, by its op name
    pub fn fail_op(&self, op: &'static str, reply: Reply) {
        self.state.lock().unwrap().op_replies.insert(op, reply);
    }

    /// `op host [peer]` per call, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn record(&self, op: &'static str, call: String) -> Reply {
        let mut state = self.state.lock().unwrap();
        state.calls.push(call);
        state
            .op_replies
            .get(op)
            .cloned()
            .unwrap_or_else(|| state.reply.clone())
    }
}

#[async_trait]
impl ConsensusAgent for FakeAgent {
    async fn status(&self, host: &str) -> Result<RaftStatus, AgentError> {
        let (reply, status) = {
            let mut state = self.state.lock().unwrap();
            state.calls.push(format!("status {}", host));
            (state.status_reply.clone(), state.status.clone())
        };
        reply.into_result("status", host).map(|_| status)
    }

    async fn ping(&self, host: &str) -> Result<(), AgentError> {
        self.record("ping", format!("ping {}", host))
            .into_result("ping", host)
    }

    async fn force_leader_transfer(&self, host: &str) -> Result<(), AgentError> {
        self.record("force_leader_transfer", format!("force_leader_transfer {}", host))
            .into_result("force_leader_transfer", host)
    }

    async fn add_member(&self, host: &str, peer: &str) -> Result<(), AgentError> {
        self.record("add_member", format!("add_member {} {}", host, peer))
            .into_result("add_member", host)
    }

    async fn remove_member(&self, host: &str, peer: &str) -> Result<(), AgentError> {
        self.record("remove_member", format!("remove_member {} {}", host, peer))
            .into_result("remove_member", host)
    }

    async fn disable_raft(&self, host: &str) -> Result<(), AgentError> {
        self.record("disable_raft", format!("disable_raft {}", host))
            .into_result("disable_raft", host)
    }

    async fn enable_raft(&self, host: &str) -> Result<(), AgentError> {
        self.record("enable_raft", format!("enable_raft {}", host))
            .into_result("enable_raft", host)
    }

    async fn cluster_gtid(&self, host: &str) -> Result<Vec<GtidEntry>, AgentError> {
        let reply = self.record("cluster_gtid", format!("cluster_gtid {}", host));
        let gtid = self.state.lock().unwrap().gtid.clone();
        reply.into_result("cluster_gtid", host).map(|_| gtid)
    }
}
