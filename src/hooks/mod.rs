//! Lifecycle hooks
//!
//! Each hook is one short process invocation. Components are built from the
//! configuration once per invocation; the outcome maps to the exit code.

mod build;
mod probes;

pub use build::Components;
pub use probes::{agent_liveness, mysql_liveness, MySqlHooks};

use crate::agent::AgentError;
use crate::health::EvaluationState;
use crate::metadata::MetadataError;
use crate::probe::{ProbeError, SqlError};
use crate::resolver::ResolverError;
use crate::role::Role;

/// Hook failure
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("MySQL connection setup failed: {0}")]
    Sql(#[from] SqlError),

    #[error("MySQL probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("Label error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error(transparent)]
    Resolver(#[from] ResolverError),

    #[error("MySQL is unhealthy for role {role} ({state})")]
    Unhealthy { role: Role, state: EvaluationState },

    #[error("Blocking task failed: {0}")]
    Task(String),
}
