//! In-memory `SqlRunner` that behaves like a single MySQL server

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::checker::{
    set_global_statement, SELECT_LONG_QUERY_TIME, SELECT_ONE, SELECT_READ_ONLY, SHOW_SLAVE_STATUS,
};
use super::demotion::{
    FLUSH_BINARY_LOGS, FLUSH_TABLES_WITH_READ_LOCK, SET_EVENT_SCHEDULER_OFF,
};
use super::gtid::gtid_subset_query;
use super::runner::{SqlError, SqlRow, SqlRunner};

type SlaveStatus = Result<Option<SqlRow>, SqlError>;

struct FakeState {
    read_only: bool,
    super_read_only: bool,
    long_query_time: String,
    /// Consumed one per SHOW SLAVE STATUS, then `default_slave_status`
    slave_statuses: VecDeque<SlaveStatus>,
    default_slave_status: SlaveStatus,
    event_scheduler: bool,
    /// Process list ids returned for the client thread query
    client_threads: Vec<u64>,
    long_running_writes: String,
    /// Scripted GTID_SUBSET answers keyed by query text
    gtid_subsets: HashMap<String, bool>,
    failing_queries: HashMap<String, SqlError>,
    failing_execs: HashMap<String, SqlError>,
    queries: Vec<String>,
    execs: Vec<String>,
}

pub struct FakeRunner {
    state: Mutex<FakeState>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRunner {
    /// Writable server without replication
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                read_only: false,
                super_read_only: false,
                long_query_time: "10.000000".to_string(),
                slave_statuses: VecDeque::new(),
                default_slave_status: Ok(None),
                event_scheduler: true,
                client_threads: Vec::new(),
                long_running_writes: "0".to_string(),
                gtid_subsets: HashMap::new(),
                failing_queries: HashMap::new(),
                failing_execs: HashMap::new(),
                queries: Vec::new(),
                execs: Vec::new(),
            }),
        }
    }

    pub fn with_read_only(self, on: bool) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.read_only = on;
            state.super_read_only = on;
        }
        self
    }

    pub fn with_long_query_time(self, value: &str) -> Self {
        self.state.lock().unwrap().long_query_time = value.to_string();
        self
    }

    pub fn with_client_threads(self, ids: &[u64]) -> Self {
        self.state.lock().unwrap().client_threads = ids.to_vec();
        self
    }

    pub fn with_long_running_writes(self, count: &str) -> Self {
        self.state.lock().unwrap().long_running_writes = count.to_string();
        self
    }

    pub fn set_gtid_subset(&self, subset: &str, superset: &str, answer: bool) {
        self.state
            .lock()
            .unwrap()
            .gtid_subsets
            .insert(gtid_subset_query(subset, superset), answer);
    }

    /// Healthy replica row with the given Seconds_Behind_Master
    pub fn running_row(seconds_behind: &str) -> SqlRow {
        SqlRow::from_pairs([
            ("Slave_IO_State", Some("Waiting for master to send event")),
            ("Slave_IO_Running", Some("Yes")),
            ("Slave_SQL_Running", Some("Yes")),
            ("Last_IO_Error", Some("")),
            ("Last_SQL_Error", Some("")),
            ("Seconds_Behind_Master", Some(seconds_behind)),
        ])
    }

    pub fn push_slave_status(&self, status: SlaveStatus) {
        self.state.lock().unwrap().slave_statuses.push_back(status);
    }

    pub fn set_default_slave_status(&self, status: SlaveStatus) {
        self.state.lock().unwrap().default_slave_status = status;
    }

    pub fn fail_query(&self, sql: &str, err: SqlError) {
        self.state
            .lock()
            .unwrap()
            .failing_queries
            .insert(sql.to_string(), err);
    }

    pub fn fail_exec(&self, sql: &str, err: SqlError) {
        self.state
            .lock()
            .unwrap()
            .failing_execs
            .insert(sql.to_string(), err);
    }

    pub fn count_queries(&self, sql: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .queries
            .iter()
            .filter(|q| q.as_str() == sql)
            .count()
    }

    /// Statements that executed successfully
    pub fn execs(&self) -> Vec<String> {
        self.state.lock().unwrap().execs.clone()
    }

    pub fn read_only(&self) -> bool {
        self.state.lock().unwrap().read_only
    }

    pub fn event_scheduler(&self) -> bool {
        self.state.lock().unwrap().event_scheduler
    }
}

fn not_understood(sql: &str) -> SqlError {
    SqlError::Server {
        code: 1064,
        message: format!("fake runner does not understand {:?}", sql),
    }
}

fn single(value: &str) -> Option<SqlRow> {
    Some(SqlRow::new(vec![("value".to_string(), Some(value.to_string()))]))
}

impl SqlRunner for FakeRunner {
    fn query_first_row(&self, sql: &str) -> Result<Option<SqlRow>, SqlError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(sql.to_string());

        if let Some(err) = state.failing_queries.get(sql) {
            return Err(err.clone());
        }

        match sql {
            SHOW_SLAVE_STATUS => match state.slave_statuses.pop_front() {
                Some(status) => status,
                None => state.default_slave_status.clone(),
            },
            SELECT_READ_ONLY => Ok(single(if state.read_only { "1" } else { "0" })),
            SELECT_LONG_QUERY_TIME => Ok(single(&state.long_query_time)),
            SELECT_ONE => Ok(single("1")),
            other if other.contains("INNODB_TRX") => Ok(single(&state.long_running_writes)),
            other => match state.gtid_subsets.get(other) {
                Some(answer) => Ok(single(if *answer { "1" } else { "0" })),
                None => Err(not_understood(other)),
            },
        }
    }

    fn query_rows(&self, sql: &str) -> Result<Vec<SqlRow>, SqlError> {
        let mut state = self.state.lock().unwrap();
        state.queries.push(sql.to_string());

        if let Some(err) = state.failing_queries.get(sql) {
            return Err(err.clone());
        }

        if sql.contains("information_schema.PROCESSLIST") {
            return Ok(state
                .client_threads
                .iter()
                .map(|id| SqlRow::new(vec![("Id".to_string(), Some(id.to_string()))]))
                .collect());
        }
        Err(not_understood(sql))
    }

    fn exec(&self, sql: &str) -> Result<(), SqlError> {
        let mut state = self.state.lock().unwrap();

        if let Some(err) = state.failing_execs.get(sql) {
            return Err(err.clone());
        }

        // The server couples the two flags: super_read_only=ON implies
        // read_only=ON, read_only=OFF implies super_read_only=OFF.
        if sql == set_global_statement("read_only", true) {
            state.read_only = true;
        } else if sql == set_global_statement("read_only", false) {
            state.read_only = false;
            state.super_read_only = false;
        } else if sql == set_global_statement("super_read_only", true) {
            state.read_only = true;
            state.super_read_only = true;
        } else if sql == set_global_statement("super_read_only", false) {
            state.super_read_only = false;
        } else if sql == SET_EVENT_SCHEDULER_OFF {
            state.event_scheduler = false;
        } else if let Some(id) = sql.strip_prefix("KILL ") {
            let id: u64 = id.parse().map_err(|_| not_understood(sql))?;
            if !state.client_threads.contains(&id) {
                return Err(SqlError::Server {
                    code: 1094,
                    message: format!("Unknown thread id: {}", id),
                });
            }
        } else if sql != FLUSH_TABLES_WITH_READ_LOCK && sql != FLUSH_BINARY_LOGS {
            return Err(not_understood(sql));
        }

        state.execs.push(sql.to_string());
        Ok(())
    }
}
