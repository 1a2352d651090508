//! Health verdict definitions
//!
//! A verdict is recomputed from scratch on every cycle; nothing carries over
//! between hook invocations.

use std::fmt;

use crate::role::Role;

/// Where an evaluation cycle stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationState {
    Unknown,
    EvaluatingLeader,
    EvaluatingFollower,
    /// Idle, Candidate or Unknown role
    EvaluatingUnassigned,
    Healthy,
    Unhealthy,
    /// Leader is read-only while a maintenance marker is present
    MaintenancePending,
}

impl Default for EvaluationState {
    fn default() -> Self {
        Self::Unknown
    }
}

impl EvaluationState {
    /// Evaluation entered for a role
    pub fn for_role(role: Role) -> Self {
        match role {
            Role::Leader => Self::EvaluatingLeader,
            Role::Follower => Self::EvaluatingFollower,
            Role::Idle | Role::Candidate | Role::Unknown => Self::EvaluatingUnassigned,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Healthy | Self::Unhealthy | Self::MaintenancePending
        )
    }
}

impl fmt::Display for EvaluationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::EvaluatingLeader => "evaluating-leader",
            Self::EvaluatingFollower => "evaluating-follower",
            Self::EvaluatingUnassigned => "evaluating-unassigned",
            Self::Healthy => "healthy",
            Self::Unhealthy => "unhealthy",
            Self::MaintenancePending => "maintenance-pending",
        };
        f.write_str(s)
    }
}

/// Outcome of one health evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthVerdict {
    pub healthy: bool,
    /// The read-only flag was switched off during this cycle
    pub corrective_action_taken: bool,
    pub maintenance_pending: bool,
    pub state: EvaluationState,
}

impl HealthVerdict {
    pub fn from_check(healthy: bool, corrective_action_taken: bool) -> Self {
        Self {
            healthy,
            corrective_action_taken,
            maintenance_pending: false,
            state: if healthy {
                EvaluationState::Healthy
            } else {
                EvaluationState::Unhealthy
            },
        }
    }

    pub fn unhealthy() -> Self {
        Self::from_check(false, false)
    }

    pub fn maintenance_pending() -> Self {
        Self {
            healthy: false,
            corrective_action_taken: false,
            maintenance_pending: true,
            state: EvaluationState::MaintenancePending,
        }
    }

    /// Whether the readiness hook should report failure
    pub fn fails_readiness(&self) -> bool {
        !self.healthy && !self.maintenance_pending
    }
}
