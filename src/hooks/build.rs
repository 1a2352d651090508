use std::sync::Arc;

use tracing::{debug, info};

use super::{agent_liveness, mysql_liveness, HookError, MySqlHooks};
use crate::agent::AgentClient;
use crate::config::Config;
use crate::health::{FileMarker, HealthCoordinator, HealthVerdict};
use crate::metadata::PodLabelStore;
use crate::probe::{MySqlRunner, RetryPolicy, SqlProbe};
use crate::resolver::RoleResolver;

/// Builds the production components from one configuration
pub struct Components {
    config: Config,
}

impl Components {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn agent(&self) -> AgentClient {
        AgentClient::new(&self.config.agent)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.probe.replication_attempts,
            self.config.probe.retry_delay(),
        )
    }

    pub fn sql_probe(&self) -> Result<SqlProbe<MySqlRunner>, HookError> {
        let runner = MySqlRunner::new(&self.config.mysql)?;
        debug!(addr = %self.config.mysql.addr(), "MySQL runner ready");
        Ok(SqlProbe::new(runner).lag_factor(self.config.probe.lag_factor))
    }

    pub fn health_coordinator(&self) -> Result<HealthCoordinator<MySqlRunner>, HookError> {
        Ok(HealthCoordinator::new(
            self.sql_probe()?,
            self.retry_policy(),
            Box::new(FileMarker::new(&self.config.probe.maintenance_marker)),
            self.config.probe.maintenance_policy,
        ))
    }

    pub async fn label_store(&self) -> Result<PodLabelStore, HookError> {
        Ok(PodLabelStore::connect(&self.config.node, &self.config.metadata).await?)
    }

    pub async fn mysql_hooks(&self) -> Result<MySqlHooks<MySqlRunner, PodLabelStore>, HookError> {
        Ok(MySqlHooks::new(
            self.health_coordinator()?,
            self.label_store().await?,
        ))
    }

    pub async fn role_resolver(
        &self,
    ) -> Result<RoleResolver<AgentClient, PodLabelStore, MySqlRunner>, HookError> {
        Ok(RoleResolver::new(
            self.agent(),
            self.label_store().await?,
            Arc::new(self.sql_probe()?),
            self.config.agent.host.clone(),
            self.config.agent.self_address.clone(),
        )
        .with_demotion(&self.config.demotion)
        .with_rebuild(self.config.node.pod_name.clone(), self.config.rebuild.clone()))
    }

    /// Operator asked the hooks to stand down
    fn sleeping(&self) -> bool {
        let marker = FileMarker::new(&self.config.probe.sleep_forever_marker);
        if marker.exists() {
            info!(path = %marker.path().display(), "Sleep-forever marker present, skipping");
            return true;
        }
        false
    }

    /// MySQL liveness: the local server only
    pub async fn mysql_liveness(&self) -> Result<(), HookError> {
        if self.sleeping() {
            return Ok(());
        }
        mysql_liveness(self.sql_probe()?).await
    }

    /// MySQL readiness, `None` when the hooks are standing down
    pub async fn mysql_readiness(&self) -> Result<Option<HealthVerdict>, HookError> {
        if self.sleeping() {
            return Ok(None);
        }
        let hooks = self.mysql_hooks().await?;
        Ok(Some(hooks.readiness().await?))
    }

    /// Agent liveness: a ping, no labels or MySQL involved
    pub async fn agent_liveness(&self) -> Result<(), HookError> {
        agent_liveness(&self.agent(), &self.config.agent.host).await
    }
}
