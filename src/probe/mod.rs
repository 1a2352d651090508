//! SQL probes against the local MySQL instance
//!
//! This module provides:
//! - A `SqlRunner` seam with a `mysql`-pool implementation
//! - Replication status evaluation with bounded retries
//! - read_only / super_read_only reads and writes
//! - The liveness query
//! - Leader demotion and GTID set comparison

mod checker;
mod demotion;
mod gtid;
mod replication;
mod retry;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::{ProbeError, SqlProbe, DEFAULT_LAG_FACTOR};
pub use demotion::{DemotionPlan, DemotionReport};
pub use replication::{ErrorKind, ReplicationError, SlaveProbeResult, Tri, TRANSITIONAL_IO_STATES};
pub use retry::{RetryPolicy, Sleeper, ThreadSleeper};
pub use runner::{MySqlRunner, SqlError, SqlRow, SqlRunner};

#[cfg(test)]
pub(crate) use retry::testing::RecordingSleeper;
