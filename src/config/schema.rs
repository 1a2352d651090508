use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Identity of the pod this process runs in
    #[serde(default)]
    pub node: NodeConfig,
    /// Local MySQL connection
    #[serde(default)]
    pub mysql: MySqlConfig,
    /// Consensus agent HTTP endpoint
    #[serde(default)]
    pub agent: AgentConfig,
    /// Replication probe and corrective-action policy
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Kubernetes label access
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Post-start GTID comparison against the leader
    #[serde(default)]
    pub rebuild: RebuildConfig,
    /// Leader-stop demotion of the local MySQL
    #[serde(default)]
    pub demotion: DemotionConfig,
}

// ============================================================================
// Node identity
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    /// Namespace of the pod (usually injected as NAMESPACE)
    #[serde(default)]
    pub namespace: String,
    /// Pod name (usually injected as POD_NAME)
    #[serde(default)]
    pub pod_name: String,
}

// ============================================================================
// MySQL
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MySqlConfig {
    #[serde(default = "default_mysql_host")]
    pub host: String,
    #[serde(default = "default_mysql_port")]
    pub port: u16,
    #[serde(default = "default_mysql_user")]
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// TCP connect timeout (milliseconds)
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Socket read/write timeout (milliseconds)
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,
    /// Maximum age of a pooled connection (milliseconds)
    #[serde(default = "default_conn_max_lifetime_ms")]
    pub conn_max_lifetime_ms: u64,
}

fn default_mysql_host() -> String {
    "127.0.0.1".to_string()
}

fn default_mysql_port() -> u16 {
    3306
}

fn default_mysql_user() -> String {
    "root".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_io_timeout_ms() -> u64 {
    5000
}

fn default_conn_max_lifetime_ms() -> u64 {
    60_000
}

impl Default for MySqlConfig {
    fn default() -> Self {
        Self {
            host: default_mysql_host(),
            port: default_mysql_port(),
            user: default_mysql_user(),
            password: String::new(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            conn_max_lifetime_ms: default_conn_max_lifetime_ms(),
        }
    }
}

impl MySqlConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    pub fn conn_max_lifetime(&self) -> Duration {
        Duration::from_millis(self.conn_max_lifetime_ms)
    }
}

// ============================================================================
// Consensus agent
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Host of this node's own agent
    #[serde(default = "default_agent_host")]
    pub host: String,
    /// Administrative HTTP port, shared by every peer
    #[serde(default = "default_agent_port")]
    pub port: u16,
    /// Secret for the administrative user
    #[serde(default)]
    pub password: String,
    /// This node's address as the agent reports it in `leader`/`nodes`
    #[serde(default)]
    pub self_address: String,
    /// Per-request timeout (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_agent_host() -> String {
    "127.0.0.1".to_string()
}

fn default_agent_port() -> u16 {
    6601
}

fn default_request_timeout_ms() -> u64 {
    5000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            host: default_agent_host(),
            port: default_agent_port(),
            password: String::new(),
            self_address: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl AgentConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

// ============================================================================
// Probe policy
// ============================================================================

/// What to do when a leader is read-only while the maintenance marker exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaintenancePolicy {
    /// Leave read_only alone and report the node as pending
    #[default]
    Tolerate,
    /// Ignore the marker and correct read_only anyway
    Correct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Attempts for SHOW SLAVE STATUS on transient errors
    #[serde(default = "default_replication_attempts")]
    pub replication_attempts: u32,
    /// Fixed delay between attempts (milliseconds)
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Lag threshold = lag_factor * long_query_time
    #[serde(default = "default_lag_factor")]
    pub lag_factor: f64,
    /// File whose presence means an update/maintenance is in progress
    #[serde(default = "default_maintenance_marker")]
    pub maintenance_marker: String,
    #[serde(default)]
    pub maintenance_policy: MaintenancePolicy,
    /// File whose presence disables the MySQL probes entirely
    #[serde(default = "default_sleep_forever_marker")]
    pub sleep_forever_marker: String,
}

fn default_replication_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    3000
}

fn default_lag_factor() -> f64 {
    100.0
}

fn default_maintenance_marker() -> String {
    "/var/lib/mysql/PreUpdating".to_string()
}

fn default_sleep_forever_marker() -> String {
    "/var/lib/mysql/sleep-forever".to_string()
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            replication_attempts: default_replication_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
            lag_factor: default_lag_factor(),
            maintenance_marker: default_maintenance_marker(),
            maintenance_policy: MaintenancePolicy::default(),
            sleep_forever_marker: default_sleep_forever_marker(),
        }
    }
}

impl ProbeConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

// ============================================================================
// Metadata
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    /// Timeout for each Kubernetes API call (milliseconds)
    #[serde(default = "default_metadata_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_metadata_timeout_ms() -> u64 {
    5000
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_metadata_timeout_ms(),
        }
    }
}

impl MetadataConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Rebuild
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct RebuildConfig {
    /// Compare GTID sets after start (usually injected as AUTO_REBUILD)
    #[serde(default)]
    pub auto_rebuild: bool,
    /// How long to wait for the local MySQL to accept connections (milliseconds)
    #[serde(default = "default_mysql_wait_ms")]
    pub mysql_wait_ms: u64,
    /// How long to wait for the local agent to answer ping (milliseconds)
    #[serde(default = "default_agent_wait_ms")]
    pub agent_wait_ms: u64,
    /// Delay between availability checks (milliseconds)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Members with a raft state needed before a rebuild is requested
    #[serde(default = "default_min_alive_members")]
    pub min_alive_members: usize,
}

fn default_mysql_wait_ms() -> u64 {
    30_000
}

fn default_agent_wait_ms() -> u64 {
    60_000
}

fn default_poll_interval_ms() -> u64 {
    2000
}

fn default_min_alive_members() -> usize {
    3
}

impl Default for RebuildConfig {
    fn default() -> Self {
        Self {
            auto_rebuild: false,
            mysql_wait_ms: default_mysql_wait_ms(),
            agent_wait_ms: default_agent_wait_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            min_alive_members: default_min_alive_members(),
        }
    }
}

impl RebuildConfig {
    pub fn mysql_wait(&self) -> Duration {
        Duration::from_millis(self.mysql_wait_ms)
    }

    pub fn agent_wait(&self) -> Duration {
        Duration::from_millis(self.agent_wait_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

// ============================================================================
// Demotion
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct DemotionConfig {
    /// Deadline for the whole SQL demotion sequence (milliseconds)
    #[serde(default = "default_demotion_timeout_ms")]
    pub timeout_ms: u64,
    /// Writes running at least this long are reported before threads are killed
    #[serde(default = "default_long_write_threshold_secs")]
    pub long_write_threshold_secs: u64,
    /// Users whose connections survive the demotion
    #[serde(default = "default_protected_users")]
    pub protected_users: Vec<String>,
}

fn default_demotion_timeout_ms() -> u64 {
    5000
}

fn default_long_write_threshold_secs() -> u64 {
    4
}

fn default_protected_users() -> Vec<String> {
    vec!["root".to_string(), "radondb_repl".to_string()]
}

impl Default for DemotionConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_demotion_timeout_ms(),
            long_write_threshold_secs: default_long_write_threshold_secs(),
            protected_users: default_protected_users(),
        }
    }
}

impl DemotionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
