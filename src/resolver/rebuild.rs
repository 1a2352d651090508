//! Post-start divergence check
//!
//! A node that comes back with transactions its leader never saw cannot
//! rejoin by replication alone. After start the node compares its executed
//! GTID set with the leader's and asks for a rebuild when it is not a subset.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{ResolverError, RoleResolver};
use crate::agent::{ConsensusAgent, GtidEntry};
use crate::metadata::LabelStore;
use crate::probe::SqlRunner;
use crate::role::{Role, REBUILD_LABEL};

/// What the post-start check decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildOutcome {
    /// Automatic rebuild is switched off
    Disabled,
    /// This node leads, nothing to compare against
    Leader,
    /// Too few members, or no leader set to compare against
    ClusterUnavailable { alive: usize },
    /// Local transactions are all known to the leader
    InSync,
    /// Local transactions diverged, rebuild label set
    RebuildRequested,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum GtidView {
    SelfLeader,
    Sets {
        alive: usize,
        mine: String,
        leader: Option<String>,
    },
}

/// Reduce the agent's member list to what the check needs
///
/// Members without a raft state do not count as alive.
pub(crate) fn gtid_view(members: &[GtidEntry], pod_name: &str) -> GtidView {
    let mut alive = 0;
    let mut mine = String::new();
    let mut leader = None;

    for member in members {
        let Some(role) = member.role() else {
            debug!(id = %member.id, raft = %member.raft, "Skipping member without raft state");
            continue;
        };
        alive += 1;

        let is_self = member.pod_name() == pod_name;
        if is_self && role == Role::Leader {
            return GtidView::SelfLeader;
        }
        if is_self {
            mine = member.executed_gtid_set.clone();
        }
        if role == Role::Leader {
            leader = Some(member.executed_gtid_set.clone());
        }
    }

    GtidView::Sets {
        alive,
        mine,
        leader,
    }
}

/// Run `check` until it passes or `timeout` has elapsed
async fn wait_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}

impl<A, L, R> RoleResolver<A, L, R>
where
    A: ConsensusAgent,
    L: LabelStore,
    R: SqlRunner + 'static,
{
    /// Request a rebuild when local transactions are unknown to the leader
    pub async fn post_start(&self) -> Result<RebuildOutcome, ResolverError> {
        if !self.rebuild.auto_rebuild {
            debug!("Automatic rebuild disabled");
            return Ok(RebuildOutcome::Disabled);
        }

        let interval = self.rebuild.poll_interval();

        let probe = &self.probe;
        let mysql_up = wait_until(self.rebuild.mysql_wait(), interval, move || {
            let probe = Arc::clone(probe);
            async move {
                matches!(
                    tokio::task::spawn_blocking(move || probe.liveness_query()).await,
                    Ok(Ok(()))
                )
            }
        })
        .await;
        if !mysql_up {
            return Err(ResolverError::Unavailable {
                what: "MySQL",
                waited: self.rebuild.mysql_wait(),
            });
        }

        let agent = &self.agent;
        let host = self.host.as_str();
        let agent_up = wait_until(self.rebuild.agent_wait(), interval, move || async move {
            agent.ping(host).await.is_ok()
        })
        .await;
        if !agent_up {
            return Err(ResolverError::Unavailable {
                what: "agent",
                waited: self.rebuild.agent_wait(),
            });
        }

        let members = self.agent.cluster_gtid(&self.host).await?;
        let (alive, mine, leader) = match gtid_view(&members, &self.pod_name) {
            GtidView::SelfLeader => {
                info!("Node leads, no rebuild check");
                return Ok(RebuildOutcome::Leader);
            }
            GtidView::Sets {
                alive,
                mine,
                leader,
            } => (alive, mine, leader),
        };

        let leader = match leader {
            Some(set) if !set.is_empty() && alive >= self.rebuild.min_alive_members => set,
            _ => {
                info!(
                    alive = alive,
                    min_alive = self.rebuild.min_alive_members,
                    "No leader GTID set to compare against"
                );
                return Ok(RebuildOutcome::ClusterUnavailable { alive });
            }
        };

        if mine.is_empty() {
            return Ok(RebuildOutcome::InSync);
        }

        let probe = Arc::clone(&self.probe);
        let (subset, superset) = (mine.clone(), leader.clone());
        let in_sync = tokio::task::spawn_blocking(move || probe.gtid_subset(&subset, &superset))
            .await
            .map_err(|e| ResolverError::Task(e.to_string()))??;
        if in_sync {
            info!("Executed GTID set is within the leader's");
            return Ok(RebuildOutcome::InSync);
        }

        warn!(
            executed = %mine,
            leader = %leader,
            "Executed GTID set diverged from the leader, requesting rebuild"
        );
        self.labels.patch_label(REBUILD_LABEL, "true").await?;
        Ok(RebuildOutcome::RebuildRequested)
    }
}
