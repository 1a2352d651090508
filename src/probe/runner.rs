//! SQL execution seam for the local MySQL instance
//!
//! Probes need three primitives: fetch the first row of a query, fetch all
//! rows, and execute a statement. `MySqlRunner` implements them over a
//! `mysql` pool capped at a single connection whose age is bounded.

use std::io;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use mysql::prelude::Queryable;
use mysql::{Opts, OptsBuilder, Pool, PoolConstraints, PoolOpts, Value};
use tracing::debug;

use crate::config::MySqlConfig;

/// Server error codes worth retrying
///
/// 1040 too many connections, 1205 lock wait timeout, 1213 deadlock,
/// 2006 server gone away, 2013 lost connection during query.
const TEMPORARY_SERVER_ERRORS: &[u16] = &[1040, 1205, 1213, 2006, 2013];

/// Error returned by a `SqlRunner`
#[derive(Debug, Clone, thiserror::Error)]
pub enum SqlError {
    #[error("Connection error: {0}")]
    Connection(String),
    #[error("Timed out: {0}")]
    Timeout(String),
    #[error("Server error {code}: {message}")]
    Server { code: u16, message: String },
    #[error("Decode error: {0}")]
    Decode(String),
}

impl SqlError {
    /// Whether the failure may clear up on its own
    pub fn is_transient(&self) -> bool {
        match self {
            SqlError::Connection(_) | SqlError::Timeout(_) => true,
            SqlError::Server { code, .. } => TEMPORARY_SERVER_ERRORS.contains(code),
            SqlError::Decode(_) => false,
        }
    }
}

impl From<mysql::Error> for SqlError {
    fn from(err: mysql::Error) -> Self {
        match err {
            mysql::Error::MySqlError(e) => SqlError::Server {
                code: e.code,
                message: e.message,
            },
            mysql::Error::IoError(e)
                if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) =>
            {
                SqlError::Timeout(e.to_string())
            }
            mysql::Error::DriverError(
                e @ (mysql::DriverError::ConnectTimeout | mysql::DriverError::Timeout),
            ) => SqlError::Timeout(e.to_string()),
            other => SqlError::Connection(other.to_string()),
        }
    }
}

/// One result row, column name to nullable text value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlRow {
    columns: Vec<(String, Option<String>)>,
}

impl SqlRow {
    pub fn new(columns: Vec<(String, Option<String>)>) -> Self {
        Self { columns }
    }

    /// Build a row from literal pairs; `None` is SQL NULL
    pub fn from_pairs<'a, I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Option<&'a str>)>,
    {
        Self {
            columns: pairs
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.map(str::to_string)))
                .collect(),
        }
    }

    /// Value of the named column; `None` when absent or NULL
    pub fn get(&self, name: &str) -> Option<&str> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .and_then(|(_, value)| value.as_deref())
    }

    /// Value of the first column
    pub fn first(&self) -> Option<&str> {
        self.columns.first().and_then(|(_, value)| value.as_deref())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Minimal SQL surface used by the probes
pub trait SqlRunner: Send + Sync {
    /// Run a query and return its first row, if any
    fn query_first_row(&self, sql: &str) -> Result<Option<SqlRow>, SqlError>;

    /// Run a query and return every row
    fn query_rows(&self, sql: &str) -> Result<Vec<SqlRow>, SqlError>;

    /// Execute a statement that returns no rows
    fn exec(&self, sql: &str) -> Result<(), SqlError>;
}

impl<R: SqlRunner + ?Sized> SqlRunner for std::sync::Arc<R> {
    fn query_first_row(&self, sql: &str) -> Result<Option<SqlRow>, SqlError> {
        (**self).query_first_row(sql)
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<SqlRow>, SqlError> {
        (**self).query_rows(sql)
    }

    fn exec(&self, sql: &str) -> Result<(), SqlError> {
        (**self).exec(sql)
    }
}

struct PoolSlot {
    pool: Pool,
    created: Instant,
}

/// Whether a pool created at `created` has outlived `max_lifetime` at `now`
///
/// Connections are opened lazily, so none in the pool is older than the pool.
fn pool_expired(created: Instant, max_lifetime: Duration, now: Instant) -> bool {
    now.saturating_duration_since(created) >= max_lifetime
}

/// `SqlRunner` backed by a `mysql` connection pool
pub struct MySqlRunner {
    opts: Opts,
    slot: Mutex<PoolSlot>,
    max_lifetime: Duration,
    addr: String,
}

impl MySqlRunner {
    /// Build the pool; no connection is opened until the first query
    pub fn new(config: &MySqlConfig) -> Result<Self, SqlError> {
        let constraints = PoolConstraints::new(0, 1)
            .ok_or_else(|| SqlError::Connection("invalid pool constraints".into()))?;

        // Session state is kept between statements: the global read lock
        // taken during demotion lives as long as the connection.
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_reset_connection(false)
            .with_check_health(true);

        let opts: Opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .tcp_connect_timeout(Some(config.connect_timeout()))
            .read_timeout(Some(config.io_timeout()))
            .write_timeout(Some(config.io_timeout()))
            .pool_opts(pool_opts)
            .into();

        let pool = Pool::new(opts.clone())?;
        Ok(Self {
            opts,
            slot: Mutex::new(PoolSlot {
                pool,
                created: Instant::now(),
            }),
            max_lifetime: config.conn_max_lifetime(),
            addr: config.addr(),
        })
    }

    /// Current pool, replaced by a fresh one once it reaches the lifetime
    fn pool(&self) -> Result<Pool, SqlError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| SqlError::Connection("pool lock poisoned".into()))?;

        if pool_expired(slot.created, self.max_lifetime, Instant::now()) {
            debug!(addr = %self.addr, "Recycling MySQL connection pool");
            *slot = PoolSlot {
                pool: Pool::new(self.opts.clone())?,
                created: Instant::now(),
            };
        }
        Ok(slot.pool.clone())
    }
}

impl SqlRunner for MySqlRunner {
    fn query_first_row(&self, sql: &str) -> Result<Option<SqlRow>, SqlError> {
        debug!(addr = %self.addr, sql = %sql, "Query");
        let mut conn = self.pool()?.get_conn()?;
        let row: Option<mysql::Row> = conn.query_first(sql)?;
        Ok(row.map(into_sql_row))
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<SqlRow>, SqlError> {
        debug!(addr = %self.addr, sql = %sql, "Query");
        let mut conn = self.pool()?.get_conn()?;
        let rows: Vec<mysql::Row> = conn.query(sql)?;
        Ok(rows.into_iter().map(into_sql_row).collect())
    }

    fn exec(&self, sql: &str) -> Result<(), SqlError> {
        debug!(addr = %self.addr, sql = %sql, "Exec");
        let mut conn = self.pool()?.get_conn()?;
        conn.query_drop(sql)?;
        Ok(())
    }
}

fn into_sql_row(row: mysql::Row) -> SqlRow {
    let columns = row.columns();
    let values = row.unwrap();
    SqlRow::new(
        columns
            .iter()
            .zip(values)
            .map(|(column, value)| (column.name_str().into_owned(), value_to_text(value)))
            .collect(),
    )
}

/// Text protocol rows arrive as bytes; other variants only show up with
/// prepared statements
fn value_to_text(value: Value) -> Option<String> {
    match value {
        Value::NULL => None,
        Value::Bytes(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        other => Some(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(SqlError::Connection("refused".into()).is_transient());
        assert!(SqlError::Timeout("read".into()).is_transient());
        assert!(SqlError::Server { code: 1040, message: "Too many connections".into() }.is_transient());
        assert!(SqlError::Server { code: 2013, message: "Lost connection".into() }.is_transient());
    }

    #[test]
    fn test_fatal_classification() {
        assert!(!SqlError::Server { code: 1227, message: "Access denied".into() }.is_transient());
        assert!(!SqlError::Server { code: 1064, message: "syntax".into() }.is_transient());
        assert!(!SqlError::Decode("bad value".into()).is_transient());
    }

    #[test]
    fn test_row_lookup() {
        let row = SqlRow::from_pairs([
            ("Slave_IO_State", Some("Waiting for master to send event")),
            ("Seconds_Behind_Master", None),
        ]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.first(), Some("Waiting for master to send event"));
        assert_eq!(row.get("Slave_IO_State"), Some("Waiting for master to send event"));
        // NULL and missing columns both read as None
        assert_eq!(row.get("Seconds_Behind_Master"), None);
        assert_eq!(row.get("Last_SQL_Error"), None);
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(Value::NULL), None);
        assert_eq!(value_to_text(Value::Bytes(b"10.000000".to_vec())), Some("10.000000".into()));
        assert_eq!(value_to_text(Value::Int(1)), Some("1".into()));
    }

    #[test]
    fn test_pool_lifetime_bound() {
        let created = Instant::now();
        let lifetime = Duration::from_secs(60);
        assert!(!pool_expired(created, lifetime, created));
        assert!(!pool_expired(created, lifetime, created + Duration::from_secs(59)));
        assert!(pool_expired(created, lifetime, created + Duration::from_secs(60)));
        // a clock reading before creation is not an expiry
        assert!(!pool_expired(created + Duration::from_secs(1), lifetime, created));
    }

    #[test]
    fn test_runner_recycles_pool_after_lifetime() {
        let config = MySqlConfig {
            conn_max_lifetime_ms: 0,
            ..MySqlConfig::default()
        };
        let runner = MySqlRunner::new(&config).unwrap();
        let first = runner.slot.lock().unwrap().created;
        std::thread::sleep(Duration::from_millis(2));

        runner.pool().unwrap();
        assert!(runner.slot.lock().unwrap().created > first);
    }

    #[test]
    fn test_runner_keeps_pool_within_lifetime() {
        let runner = MySqlRunner::new(&MySqlConfig::default()).unwrap();
        let first = runner.slot.lock().unwrap().created;

        runner.pool().unwrap();
        assert_eq!(runner.slot.lock().unwrap().created, first);
    }

    #[test]
    fn test_io_timeout_maps_to_timeout() {
        let err = mysql::Error::IoError(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        let sql_err = SqlError::from(err);
        assert!(matches!(sql_err, SqlError::Timeout(_)));
        assert!(sql_err.is_transient());
    }

    #[test]
    fn test_refused_maps_to_connection() {
        let err = mysql::Error::IoError(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(matches!(SqlError::from(err), SqlError::Connection(_)));
    }
}
