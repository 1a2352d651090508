//! Agent-facing role resolution
//!
//! Keeps the `role` label in line with what the consensus agent reports,
//! implements the agent's leader-start / leader-stop callbacks, and checks
//! after start whether the node has diverged from the leader.

mod rebuild;

pub use rebuild::RebuildOutcome;

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::agent::{AgentError, ConsensusAgent};
use crate::config::{DemotionConfig, RebuildConfig};
use crate::metadata::{LabelStore, MetadataError};
use crate::probe::{DemotionPlan, ProbeError, SqlProbe, SqlRunner};
use crate::role::{Role, ROLE_LABEL};

/// Role resolution error
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Label error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("{self_address} is not the raft leader (role {role}, leader {leader:?})")]
    NotLeader {
        self_address: String,
        role: Role,
        leader: Option<String>,
    },

    #[error("MySQL error: {0}")]
    Probe(#[from] ProbeError),

    #[error("Demotion did not finish within {timeout:?}")]
    DemotionTimeout { timeout: Duration },

    #[error("{what} not available after {waited:?}")]
    Unavailable { what: &'static str, waited: Duration },

    #[error("Blocking task failed: {0}")]
    Task(String),
}

pub struct RoleResolver<A, L, R> {
    agent: A,
    labels: L,
    probe: Arc<SqlProbe<R>>,
    /// Host whose agent answers for this node
    host: String,
    /// This node's raft address, as the agent names leaders
    self_address: String,
    /// Pod name, matched against the first label of member ids
    pod_name: String,
    demotion: DemotionPlan,
    demotion_timeout: Duration,
    rebuild: RebuildConfig,
}

impl<A, L, R> RoleResolver<A, L, R>
where
    A: ConsensusAgent,
    L: LabelStore,
    R: SqlRunner + 'static,
{
    pub fn new(
        agent: A,
        labels: L,
        probe: Arc<SqlProbe<R>>,
        host: impl Into<String>,
        self_address: impl Into<String>,
    ) -> Self {
        let demotion = DemotionConfig::default();
        Self {
            agent,
            labels,
            probe,
            host: host.into(),
            self_address: self_address.into(),
            pod_name: String::new(),
            demotion: DemotionPlan::from(&demotion),
            demotion_timeout: demotion.timeout(),
            rebuild: RebuildConfig::default(),
        }
    }

    pub fn with_demotion(mut self, config: &DemotionConfig) -> Self {
        self.demotion = DemotionPlan::from(config);
        self.demotion_timeout = config.timeout();
        self
    }

    pub fn with_rebuild(mut self, pod_name: impl Into<String>, config: RebuildConfig) -> Self {
        self.pod_name = pod_name.into();
        self.rebuild = config;
        self
    }

    /// Publish the agent-reported role unless the agent says Leader
    ///
    /// Leadership is published only by `leader_start`; MySQL readiness
    /// decides whether a leader is serving.
    pub async fn readiness(&self) -> Result<(), ResolverError> {
        let status = self.agent.status(&self.host).await?;

        if status.role == Role::Leader {
            debug!(leader = ?status.leader, "Agent reports leader, leaving role label alone");
            return Ok(());
        }

        let written = self
            .labels
            .publish_if_changed(ROLE_LABEL, status.role.as_label())
            .await?;
        if written {
            info!(role = %status.role, "Role label updated");
        }
        Ok(())
    }

    /// Demote the label before the node shuts down
    pub async fn pre_stop(&self) -> Result<(), ResolverError> {
        info!("Pre-stop: labelling node as follower");
        self.labels
            .patch_label(ROLE_LABEL, Role::Follower.as_label())
            .await?;
        Ok(())
    }

    /// Publish `role=leader` once the agent confirms it
    pub async fn leader_start(&self) -> Result<(), ResolverError> {
        let status = self.agent.status(&self.host).await?;

        if !status.is_leader_at(&self.self_address) {
            warn!(
                role = %status.role,
                leader = ?status.leader,
                self_address = %self.self_address,
                "Leader start without confirmed leadership"
            );
            return Err(ResolverError::NotLeader {
                self_address: self.self_address.clone(),
                role: status.role,
                leader: status.leader,
            });
        }

        self.labels
            .publish_if_changed(ROLE_LABEL, Role::Leader.as_label())
            .await?;
        info!(self_address = %self.self_address, "Leadership published");
        Ok(())
    }

    /// Demote the label, then hand MySQL over as a read-only server
    ///
    /// Elections are paused on the local agent while MySQL is demoted and
    /// resumed afterwards whatever the outcome. A server that is already
    /// read-only is left alone.
    pub async fn leader_stop(&self) -> Result<(), ResolverError> {
        self.labels
            .patch_label(ROLE_LABEL, Role::Follower.as_label())
            .await?;

        let probe = Arc::clone(&self.probe);
        let read_only = tokio::task::spawn_blocking(move || probe.is_read_only())
            .await
            .map_err(|e| ResolverError::Task(e.to_string()))?;
        match read_only {
            Ok(true) => {
                info!("MySQL already read-only, skipping demotion");
                return Ok(());
            }
            Ok(false) => {}
            Err(e) => warn!(error = %e, "Failed to read read_only, demoting anyway"),
        }

        info!("Disabling raft for demotion");
        let result = match self.agent.disable_raft(&self.host).await {
            Ok(()) => self.demote().await,
            Err(e) => Err(e.into()),
        };

        if let Err(e) = self.agent.enable_raft(&self.host).await {
            warn!(error = %e, "Failed to re-enable raft");
        }
        result
    }

    async fn demote(&self) -> Result<(), ResolverError> {
        let probe = Arc::clone(&self.probe);
        let plan = self.demotion.clone();
        let task = tokio::task::spawn_blocking(move || probe.demote(&plan));

        let report = tokio::time::timeout(self.demotion_timeout, task)
            .await
            .map_err(|_| ResolverError::DemotionTimeout {
                timeout: self.demotion_timeout,
            })?
            .map_err(|e| ResolverError::Task(e.to_string()))??;

        info!(
            killed_threads = report.killed_threads.len(),
            long_running_writes = report.long_running_writes,
            "Leadership released, MySQL is read-only"
        );
        Ok(())
    }
}
