//! MySQL health evaluation for the node's labelled role
//!
//! This module provides:
//! - Per-role health policy with the leader read-only correction
//! - Maintenance markers that suspend the correction
//! - Liveness as a bare `SELECT 1`

mod coordinator;
mod maintenance;
mod state;

pub use coordinator::HealthCoordinator;
pub use maintenance::{FileMarker, MaintenanceGate};
pub use state::{EvaluationState, HealthVerdict};
