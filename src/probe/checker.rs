//! Reads and corrective writes against the local MySQL
//!
//! Replication health is judged by:
//! 1. SHOW SLAVE STATUS (no row means no replica configured)
//! 2. Slave_IO_State, Slave_IO_Running / Last_IO_Error and Slave_SQL_Running
//!    for thread health
//! 3. Seconds_Behind_Master against lag_factor * @@global.long_query_time

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::replication::{classify_row, ReplicationError, RowState, SlaveProbeResult, Tri};
use super::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use super::runner::{SqlError, SqlRunner};

pub(crate) const SHOW_SLAVE_STATUS: &str = "SHOW SLAVE STATUS";
pub(crate) const SELECT_READ_ONLY: &str = "SELECT @@global.read_only";
pub(crate) const SELECT_LONG_QUERY_TIME: &str = "SELECT @@global.long_query_time";
pub(crate) const SELECT_ONE: &str = "SELECT 1";

const READ_ONLY: &str = "read_only";
const SUPER_READ_ONLY: &str = "super_read_only";

/// Default multiplier applied to long_query_time for the lag threshold
pub const DEFAULT_LAG_FACTOR: f64 = 100.0;

pub(crate) fn set_global_statement(variable: &str, on: bool) -> String {
    format!("SET GLOBAL {} = {}", variable, if on { "ON" } else { "OFF" })
}

/// Error from a single read or write probe
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("{query} failed: {source}")]
    Sql {
        query: String,
        #[source]
        source: SqlError,
    },
    #[error("Unexpected value {value:?} for {variable}")]
    UnexpectedValue { variable: &'static str, value: String },
    #[error("{applied} set to {state} but setting {failed} failed: {source}")]
    ReadOnlyDiverged {
        applied: &'static str,
        failed: &'static str,
        state: &'static str,
        #[source]
        source: SqlError,
    },
}

impl ProbeError {
    pub(crate) fn sql(query: impl Into<String>, source: SqlError) -> Self {
        ProbeError::Sql {
            query: query.into(),
            source,
        }
    }
}

/// Typed probes over a `SqlRunner`
pub struct SqlProbe<R> {
    runner: R,
    sleeper: Arc<dyn Sleeper>,
    lag_factor: f64,
}

impl<R: SqlRunner> SqlProbe<R> {
    pub fn new(runner: R) -> Self {
        Self::with_sleeper(runner, Arc::new(ThreadSleeper))
    }

    pub fn with_sleeper(runner: R, sleeper: Arc<dyn Sleeper>) -> Self {
        Self {
            runner,
            sleeper,
            lag_factor: DEFAULT_LAG_FACTOR,
        }
    }

    pub fn lag_factor(mut self, factor: f64) -> Self {
        self.lag_factor = factor;
        self
    }

    pub(super) fn runner(&self) -> &R {
        &self.runner
    }

    /// Replication check with bounded retries on transient errors
    ///
    /// Fatal errors return after a single attempt. When the attempts run out
    /// the result is Unknown/Unknown carrying the last error.
    pub fn check_replication_status(&self, policy: &RetryPolicy) -> SlaveProbeResult {
        let result = policy.run(
            self.sleeper.as_ref(),
            |attempt| {
                let result = self.probe_slave_status();
                if let Some(err) = &result.error {
                    debug!(attempt = attempt, error = %err, "Slave status check failed");
                }
                result
            },
            SlaveProbeResult::is_transient_error,
        );

        match result.error {
            Some(err) if !err.is_fatal() => {
                warn!(
                    attempts = policy.max_attempts(),
                    error = %err,
                    "Slave status still failing after retries"
                );
                SlaveProbeResult::unknown(err)
            }
            Some(err) => {
                warn!(error = %err, "Slave status check failed");
                SlaveProbeResult {
                    error: Some(err),
                    ..result
                }
            }
            None => result,
        }
    }

    /// One SHOW SLAVE STATUS evaluation
    fn probe_slave_status(&self) -> SlaveProbeResult {
        let row = match self.runner.query_first_row(SHOW_SLAVE_STATUS) {
            Ok(Some(row)) => row,
            Ok(None) => {
                debug!("No replica configured");
                return SlaveProbeResult::not_configured();
            }
            Err(e) => return SlaveProbeResult::unknown(e.into()),
        };

        match classify_row(&row) {
            RowState::Connecting(state) => SlaveProbeResult {
                lagged: Tri::Unknown,
                replicating: Tri::False,
                error: Some(ReplicationError::Connecting { state }),
            },
            RowState::IoStopped(running, last_error) => SlaveProbeResult {
                lagged: Tri::Unknown,
                replicating: Tri::False,
                error: Some(ReplicationError::IoThreadStopped { running, last_error }),
            },
            RowState::SqlStopped(last_error) => SlaveProbeResult {
                lagged: Tri::Unknown,
                replicating: Tri::False,
                error: Some(ReplicationError::SqlThreadStopped { last_error }),
            },
            RowState::Running(behind) => {
                let long_query_time = match self.long_query_time() {
                    Ok(v) => v,
                    Err(e) => {
                        return SlaveProbeResult {
                            lagged: Tri::Unknown,
                            replicating: Tri::True,
                            error: Some(e.into()),
                        }
                    }
                };
                let threshold = self.lag_factor * long_query_time;
                let lagged = behind > threshold;
                debug!(
                    seconds_behind = behind,
                    threshold = threshold,
                    lagged = lagged,
                    "Replication running"
                );
                SlaveProbeResult::reading(lagged, true)
            }
        }
    }

    /// @@global.long_query_time in seconds
    pub fn long_query_time(&self) -> Result<f64, SqlError> {
        let value = self.query_value(SELECT_LONG_QUERY_TIME)?;
        value
            .trim()
            .parse::<f64>()
            .map_err(|_| SqlError::Decode(format!("long_query_time {:?}", value)))
    }

    /// @@global.read_only
    pub fn is_read_only(&self) -> Result<bool, ProbeError> {
        let value = self
            .query_value(SELECT_READ_ONLY)
            .map_err(|e| ProbeError::sql(SELECT_READ_ONLY, e))?;

        match value.trim() {
            "0" | "OFF" => Ok(false),
            "1" | "ON" => Ok(true),
            other => Err(ProbeError::UnexpectedValue {
                variable: READ_ONLY,
                value: other.to_string(),
            }),
        }
    }

    /// Set read_only and super_read_only together
    ///
    /// Turning on sets read_only first; turning off clears super_read_only
    /// first, matching the server's own implications between the two. If the
    /// second statement fails after the first succeeded the flags disagree
    /// and `ReadOnlyDiverged` is returned.
    pub fn set_read_only(&self, on: bool) -> Result<(), ProbeError> {
        let (first, second) = if on {
            (READ_ONLY, SUPER_READ_ONLY)
        } else {
            (SUPER_READ_ONLY, READ_ONLY)
        };
        let state = if on { "ON" } else { "OFF" };
        info!(state = state, "Setting read_only");

        let stmt = set_global_statement(first, on);
        self.runner
            .exec(&stmt)
            .map_err(|e| ProbeError::sql(stmt, e))?;

        let stmt = set_global_statement(second, on);
        self.runner
            .exec(&stmt)
            .map_err(|source| ProbeError::ReadOnlyDiverged {
                applied: first,
                failed: second,
                state,
                source,
            })
    }

    /// SELECT 1
    pub fn liveness_query(&self) -> Result<(), ProbeError> {
        self.runner
            .query_first_row(SELECT_ONE)
            .map(|_| ())
            .map_err(|e| ProbeError::sql(SELECT_ONE, e))
    }

    pub(super) fn query_value(&self, sql: &str) -> Result<String, SqlError> {
        let row = self
            .runner
            .query_first_row(sql)?
            .ok_or_else(|| SqlError::Decode(format!("{} returned no rows", sql)))?;
        row.first()
            .map(str::to_string)
            .ok_or_else(|| SqlError::Decode(format!("{} returned NULL", sql)))
    }
}
