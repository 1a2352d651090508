//! Replication status readings and their error classification

use std::fmt;

use super::runner::{SqlError, SqlRow};

/// `Slave_IO_State` values (lower case) that mean the IO thread is between
/// connections rather than broken
pub const TRANSITIONAL_IO_STATES: &[&str] = &[
    "connecting to master",
    "reconnecting after a failed binlog dump request",
    "reconnecting after a failed master event read",
    "waiting to reconnect after a failed binlog dump request",
    "waiting to reconnect after a failed master event read",
];

/// Three-valued reading; `Unknown` only when no reading was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tri {
    True,
    False,
    Unknown,
}

impl Tri {
    pub fn is_true(self) -> bool {
        self == Tri::True
    }

    pub fn is_false(self) -> bool {
        self == Tri::False
    }
}

impl From<bool> for Tri {
    fn from(value: bool) -> Self {
        if value {
            Tri::True
        } else {
            Tri::False
        }
    }
}

impl fmt::Display for Tri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Tri::True => "True",
            Tri::False => "False",
            Tri::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Whether an error may clear up by retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Fatal,
}

/// Error from a single replication check
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReplicationError {
    #[error("Replication query failed: {0}")]
    Sql(#[from] SqlError),
    #[error("Slave_IO_State: {state}")]
    Connecting { state: String },
    #[error("Last_SQL_Error: {last_error}")]
    SqlThreadStopped { last_error: String },
    #[error("Slave_IO_Running: {running}, Last_IO_Error: {last_error}")]
    IoThreadStopped { running: String, last_error: String },
}

impl ReplicationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplicationError::Sql(e) if e.is_transient() => ErrorKind::Transient,
            ReplicationError::Sql(_) => ErrorKind::Fatal,
            ReplicationError::Connecting { .. } => ErrorKind::Transient,
            ReplicationError::SqlThreadStopped { .. } | ReplicationError::IoThreadStopped { .. } => {
                ErrorKind::Fatal
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.kind() == ErrorKind::Fatal
    }
}

/// Outcome of `SHOW SLAVE STATUS` evaluation
#[derive(Debug, Clone)]
pub struct SlaveProbeResult {
    pub lagged: Tri,
    pub replicating: Tri,
    pub error: Option<ReplicationError>,
}

impl SlaveProbeResult {
    /// No replica configured on this server
    pub fn not_configured() -> Self {
        Self {
            lagged: Tri::False,
            replicating: Tri::False,
            error: None,
        }
    }

    /// Healthy reading
    pub fn reading(lagged: bool, replicating: bool) -> Self {
        Self {
            lagged: lagged.into(),
            replicating: replicating.into(),
            error: None,
        }
    }

    /// No reading could be obtained
    pub fn unknown(error: ReplicationError) -> Self {
        Self {
            lagged: Tri::Unknown,
            replicating: Tri::Unknown,
            error: Some(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_transient_error(&self) -> bool {
        matches!(&self.error, Some(e) if e.kind() == ErrorKind::Transient)
    }

    pub fn has_fatal_error(&self) -> bool {
        matches!(&self.error, Some(e) if e.is_fatal())
    }
}

/// Partial evaluation of a slave status row, before the lag threshold is known
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RowState {
    /// IO thread is reconnecting
    Connecting(String),
    /// IO thread is stopped or reports an error: (Slave_IO_Running, Last_IO_Error)
    IoStopped(String, String),
    /// SQL thread is not running
    SqlStopped(String),
    /// Replicating; seconds behind master (NULL reads as 0)
    Running(f64),
}

pub(crate) fn classify_row(row: &SqlRow) -> RowState {
    let io_state = row.get("Slave_IO_State").unwrap_or_default().to_lowercase();
    if TRANSITIONAL_IO_STATES.contains(&io_state.as_str()) {
        return RowState::Connecting(io_state);
    }

    let io_running = row.get("Slave_IO_Running").unwrap_or_default();
    let last_io_error = row.get("Last_IO_Error").unwrap_or_default().trim();
    if !matches!(io_running, "Yes" | "Connecting") || !last_io_error.is_empty() {
        return RowState::IoStopped(io_running.to_string(), last_io_error.to_string());
    }

    if row.get("Slave_SQL_Running") != Some("Yes") {
        let last_error = row.get("Last_SQL_Error").unwrap_or_default().to_string();
        return RowState::SqlStopped(last_error);
    }

    let behind = row
        .get("Seconds_Behind_Master")
        .and_then(|s| s.trim().parse::<f64>().ok())
        .unwrap_or(0.0);
    RowState::Running(behind)
}
