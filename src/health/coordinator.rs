//! Per-role health policy over the SQL probe

use tracing::{debug, info, warn};

use super::maintenance::MaintenanceGate;
use super::state::{EvaluationState, HealthVerdict};
use crate::config::MaintenancePolicy;
use crate::probe::{ProbeError, RetryPolicy, SlaveProbeResult, SqlProbe, SqlRunner};
use crate::role::Role;

/// Decides whether the local MySQL matches the role it is labelled with
///
/// The only write it ever issues is switching read-only off on a leader.
pub struct HealthCoordinator<R> {
    probe: SqlProbe<R>,
    retry: RetryPolicy,
    gate: Box<dyn MaintenanceGate>,
    policy: MaintenancePolicy,
}

impl<R: SqlRunner> HealthCoordinator<R> {
    pub fn new(
        probe: SqlProbe<R>,
        retry: RetryPolicy,
        gate: Box<dyn MaintenanceGate>,
        policy: MaintenancePolicy,
    ) -> Self {
        Self {
            probe,
            retry,
            gate,
            policy,
        }
    }

    pub fn probe(&self) -> &SqlProbe<R> {
        &self.probe
    }

    /// Full health evaluation for `role`
    pub fn evaluate(&self, role: Role) -> HealthVerdict {
        let state = EvaluationState::for_role(role);
        debug!(role = %role, state = %state, "Evaluating MySQL health");

        let slave = self.probe.check_replication_status(&self.retry);
        let read_only = self.probe.is_read_only();

        let verdict = match state {
            EvaluationState::EvaluatingLeader => self.check_leader(&slave, read_only),
            EvaluationState::EvaluatingFollower => check_follower(&slave, read_only),
            _ => check_unassigned(&slave, read_only),
        };

        info!(
            role = %role,
            lagged = %slave.lagged,
            replicating = %slave.replicating,
            healthy = verdict.healthy,
            state = %verdict.state,
            "MySQL health evaluated"
        );
        verdict
    }

    fn check_leader(
        &self,
        slave: &SlaveProbeResult,
        read_only: Result<bool, ProbeError>,
    ) -> HealthVerdict {
        let mut read_only = match read_only {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "Failed to read read_only on leader");
                return HealthVerdict::unhealthy();
            }
        };

        let mut corrected = false;
        if read_only {
            if self.policy == MaintenancePolicy::Tolerate && self.gate.in_maintenance() {
                info!("Leader is read-only under maintenance, leaving it alone");
                return HealthVerdict::maintenance_pending();
            }

            warn!("Leader is read-only, turning read_only off");
            if let Err(e) = self.probe.set_read_only(false) {
                warn!(error = %e, "Failed to turn read_only off");
                return HealthVerdict::unhealthy();
            }
            corrected = true;

            read_only = match self.probe.is_read_only() {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "Failed to re-read read_only after correction");
                    return HealthVerdict::from_check(false, corrected);
                }
            };
        }

        let healthy = !read_only && slave.replicating.is_false() && slave.is_ok();
        HealthVerdict::from_check(healthy, corrected)
    }
}

fn check_follower(slave: &SlaveProbeResult, read_only: Result<bool, ProbeError>) -> HealthVerdict {
    let read_only = match read_only {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Failed to read read_only on follower");
            return HealthVerdict::unhealthy();
        }
    };

    let healthy =
        read_only && slave.lagged.is_false() && slave.replicating.is_true() && slave.is_ok();
    HealthVerdict::from_check(healthy, false)
}

/// Idle, Candidate and Unknown roles need to be read-only with no replication error
fn check_unassigned(slave: &SlaveProbeResult, read_only: Result<bool, ProbeError>) -> HealthVerdict {
    let read_only = match read_only {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "Failed to read read_only");
            return HealthVerdict::unhealthy();
        }
    };

    HealthVerdict::from_check(read_only && slave.is_ok(), false)
}
