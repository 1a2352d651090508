mod schema;

pub use schema::*;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Environment variables injected by the pod spec (downward API and secrets)
pub const ENV_NAMESPACE: &str = "NAMESPACE";
pub const ENV_POD_NAME: &str = "POD_NAME";
pub const ENV_MYSQL_PASSWORD: &str = "MYSQL_PASSWORD";
pub const ENV_AGENT_PASSWORD: &str = "AGENT_PASSWORD";
pub const ENV_AGENT_SELF_ADDRESS: &str = "AGENT_SELF_ADDRESS";
pub const ENV_AUTO_REBUILD: &str = "AUTO_REBUILD";

impl Config {
    /// Apply environment overrides on top of file/default values
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(ns) = lookup(ENV_NAMESPACE) {
            self.node.namespace = ns;
        }
        if let Some(pod) = lookup(ENV_POD_NAME) {
            self.node.pod_name = pod;
        }
        if let Some(pass) = lookup(ENV_MYSQL_PASSWORD) {
            self.mysql.password = pass;
        }
        if let Some(pass) = lookup(ENV_AGENT_PASSWORD) {
            self.agent.password = pass;
        }
        if let Some(addr) = lookup(ENV_AGENT_SELF_ADDRESS) {
            self.agent.self_address = addr;
        }
        if let Some(flag) = lookup(ENV_AUTO_REBUILD) {
            self.rebuild.auto_rebuild = flag.trim() == "true";
        }
    }
}
