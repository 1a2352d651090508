//! Client for the per-node consensus agent's administrative HTTP API

mod client;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AgentClient, AgentError, ConsensusAgent, ADMIN_USER};
pub use types::{Endpoint, GtidEntry, GtidResponse, MemberRequest, StatusResponse};
