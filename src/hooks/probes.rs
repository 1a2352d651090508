use std::sync::Arc;

use tracing::{info, warn};

use super::HookError;
use crate::agent::ConsensusAgent;
use crate::health::{HealthCoordinator, HealthVerdict};
use crate::metadata::LabelStore;
use crate::probe::{SqlProbe, SqlRunner};
use crate::role::{healthy_label, Role, HEALTHY_LABEL};

/// `SELECT 1` against the local MySQL; needs nothing else
pub async fn mysql_liveness<R>(probe: SqlProbe<R>) -> Result<(), HookError>
where
    R: SqlRunner + 'static,
{
    tokio::task::spawn_blocking(move || probe.liveness_query())
        .await
        .map_err(|e| HookError::Task(e.to_string()))??;
    Ok(())
}

/// Reachability of the consensus agent
pub async fn agent_liveness<A: ConsensusAgent>(agent: &A, host: &str) -> Result<(), HookError> {
    agent.ping(host).await?;
    Ok(())
}

/// MySQL readiness hook
pub struct MySqlHooks<R, L> {
    coordinator: Arc<HealthCoordinator<R>>,
    labels: L,
}

impl<R, L> MySqlHooks<R, L>
where
    R: SqlRunner + 'static,
    L: LabelStore,
{
    pub fn new(coordinator: HealthCoordinator<R>, labels: L) -> Self {
        Self {
            coordinator: Arc::new(coordinator),
            labels,
        }
    }

    /// Evaluate health for the labelled role and publish `healthy`
    ///
    /// A failed label write is logged; the exit status follows the verdict.
    pub async fn readiness(&self) -> Result<HealthVerdict, HookError> {
        let labels = self.labels.read_labels().await;
        let role = Role::from_labels(&labels).unwrap_or_else(|e| {
            warn!(error = %e, "Unreadable role label, treating role as unknown");
            Role::Unknown
        });

        let coordinator = Arc::clone(&self.coordinator);
        let verdict = tokio::task::spawn_blocking(move || coordinator.evaluate(role))
            .await
            .map_err(|e| HookError::Task(e.to_string()))?;

        if verdict.maintenance_pending {
            info!(role = %role, "Maintenance pending, health label unchanged");
            return Ok(verdict);
        }

        let value = healthy_label(verdict.healthy);
        if labels.get(HEALTHY_LABEL).map(String::as_str) != Some(value) {
            match self.labels.patch_label(HEALTHY_LABEL, value).await {
                Ok(()) => info!(healthy = value, "Health label updated"),
                Err(e) => warn!(healthy = value, error = %e, "Failed to update health label"),
            }
        }

        if verdict.fails_readiness() {
            return Err(HookError::Unhealthy {
                role,
                state: verdict.state,
            });
        }
        Ok(verdict)
    }
}
