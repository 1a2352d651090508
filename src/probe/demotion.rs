//! Leader demotion steps against the local MySQL
//!
//! The sequence follows what a leader must do before another node can take
//! writes: stop scheduled events, go read-only, report long writes, drop
//! client sessions, take the global read lock and rotate the binary log.

use tracing::{info, warn};

use super::checker::{ProbeError, SqlProbe};
use super::runner::{SqlError, SqlRunner};
use crate::config::DemotionConfig;

pub(crate) const SET_EVENT_SCHEDULER_OFF: &str = "SET GLOBAL event_scheduler = OFF";
pub(crate) const FLUSH_TABLES_WITH_READ_LOCK: &str =
    "FLUSH NO_WRITE_TO_BINLOG TABLES WITH READ LOCK";
pub(crate) const FLUSH_BINARY_LOGS: &str = "FLUSH BINARY LOGS";

/// Replication senders stay connected so followers can catch up
const BINLOG_DUMP_COMMAND: &str = "Binlog Dump GTID";

/// ER_NO_SUCH_THREAD: the session ended before it could be killed
const NO_SUCH_THREAD: u16 = 1094;

/// Quote a string literal for inline SQL
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "''"))
}

pub(crate) fn long_running_writes_query(threshold_secs: u64) -> String {
    format!(
        "SELECT SUM(ct) FROM (\
         SELECT COUNT(*) AS ct FROM information_schema.PROCESSLIST \
         WHERE Command = 'Query' AND Time >= {t} AND Info NOT LIKE 'select%' \
         UNION ALL \
         SELECT COUNT(*) AS ct FROM information_schema.INNODB_TRX trx \
         WHERE trx.trx_started < CURRENT_TIMESTAMP - INTERVAL {t} SECOND) A",
        t = threshold_secs
    )
}

pub(crate) fn client_threads_query(protected_users: &[String]) -> String {
    let mut query = format!(
        "SELECT Id FROM information_schema.PROCESSLIST WHERE Command != {} AND Id != CONNECTION_ID()",
        quote_literal(BINLOG_DUMP_COMMAND)
    );
    if !protected_users.is_empty() {
        let users: Vec<String> = protected_users.iter().map(|u| quote_literal(u)).collect();
        query.push_str(&format!(" AND User NOT IN ({})", users.join(",")));
    }
    query
}

/// Tunables of the demotion sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemotionPlan {
    pub long_write_threshold_secs: u64,
    pub protected_users: Vec<String>,
}

impl Default for DemotionPlan {
    fn default() -> Self {
        Self::from(&DemotionConfig::default())
    }
}

impl From<&DemotionConfig> for DemotionPlan {
    fn from(config: &DemotionConfig) -> Self {
        Self {
            long_write_threshold_secs: config.long_write_threshold_secs,
            protected_users: config.protected_users.clone(),
        }
    }
}

/// What a completed demotion observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DemotionReport {
    pub long_running_writes: u64,
    pub killed_threads: Vec<u64>,
}

impl<R: SqlRunner> SqlProbe<R> {
    /// Run the full demotion sequence, stopping at the first failed step
    pub fn demote(&self, plan: &DemotionPlan) -> Result<DemotionReport, ProbeError> {
        info!("Disabling event scheduler");
        self.exec_step(SET_EVENT_SCHEDULER_OFF)?;

        self.set_read_only(true)?;

        let long_running_writes = self.long_running_writes(plan.long_write_threshold_secs)?;
        if long_running_writes > 0 {
            warn!(
                count = long_running_writes,
                threshold_secs = plan.long_write_threshold_secs,
                "Long running writes at demotion"
            );
        }

        let killed_threads = self.kill_client_threads(&plan.protected_users)?;

        info!("Flushing tables with read lock");
        self.exec_step(FLUSH_TABLES_WITH_READ_LOCK)?;
        self.exec_step(FLUSH_BINARY_LOGS)?;

        Ok(DemotionReport {
            long_running_writes,
            killed_threads,
        })
    }

    /// Statements and open transactions older than `threshold_secs`
    pub fn long_running_writes(&self, threshold_secs: u64) -> Result<u64, ProbeError> {
        let query = long_running_writes_query(threshold_secs);
        let value = self
            .query_value(&query)
            .map_err(|e| ProbeError::sql(query.as_str(), e))?;

        value
            .trim()
            .parse::<u64>()
            .map_err(|_| ProbeError::UnexpectedValue {
                variable: "long running writes",
                value,
            })
    }

    /// Kill every client session except replication senders, protected
    /// users and our own
    pub fn kill_client_threads(&self, protected_users: &[String]) -> Result<Vec<u64>, ProbeError> {
        let query = client_threads_query(protected_users);
        let rows = self
            .runner()
            .query_rows(&query)
            .map_err(|e| ProbeError::sql(query.as_str(), e))?;

        let mut killed = Vec::with_capacity(rows.len());
        for row in rows {
            let id = row
                .first()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .ok_or_else(|| ProbeError::UnexpectedValue {
                    variable: "processlist id",
                    value: row.first().unwrap_or_default().to_string(),
                })?;

            let stmt = format!("KILL {}", id);
            match self.runner().exec(&stmt) {
                Ok(()) => killed.push(id),
                Err(SqlError::Server { code: NO_SUCH_THREAD, .. }) => {
                    info!(id = id, "Thread already gone");
                }
                Err(e) => return Err(ProbeError::sql(stmt, e)),
            }
        }

        info!(count = killed.len(), "Killed client threads");
        Ok(killed)
    }

    fn exec_step(&self, stmt: &str) -> Result<(), ProbeError> {
        self.runner()
            .exec(stmt)
            .map_err(|e| ProbeError::sql(stmt, e))
    }
}
