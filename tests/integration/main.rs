//! Integration test entry point
//!
//! Run with: COORDINATOR_RUN_INTEGRATION_TESTS=1 cargo test --test integration
//!
//! The target must be a standalone MySQL server (no replication configured)
//! and the user needs privileges to change read_only / super_read_only.
//!
//! Environment variables:
//! - COORDINATOR_RUN_INTEGRATION_TESTS: Set to "1" to enable integration tests
//! - COORDINATOR_TEST_MYSQL_HOST: MySQL host (default: 127.0.0.1)
//! - COORDINATOR_TEST_MYSQL_PORT: MySQL port (default: 3306)
//! - COORDINATOR_TEST_MYSQL_USER: MySQL user (default: root)
//! - COORDINATOR_TEST_MYSQL_PASS: MySQL password (default: empty)

mod health;
mod probe;

use std::env;
use std::sync::Mutex;

use mysql_role_coordinator::config::MySqlConfig;
use mysql_role_coordinator::probe::{MySqlRunner, SqlProbe};

/// Tests flip global server state; run them one at a time
pub static SERVER_LOCK: Mutex<()> = Mutex::new(());

/// Check if integration tests should run
pub fn should_run_integration_tests() -> bool {
    env::var("COORDINATOR_RUN_INTEGRATION_TESTS")
        .map(|v| v == "1")
        .unwrap_or(false)
}

/// Skip test if integration tests are not enabled
#[macro_export]
macro_rules! skip_if_not_enabled {
    () => {
        if !crate::should_run_integration_tests() {
            eprintln!("Skipping integration test (set COORDINATOR_RUN_INTEGRATION_TESTS=1 to run)");
            return;
        }
    };
}

/// MySQL connection settings from environment
pub fn get_mysql_config() -> MySqlConfig {
    MySqlConfig {
        host: env::var("COORDINATOR_TEST_MYSQL_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        port: env::var("COORDINATOR_TEST_MYSQL_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3306),
        user: env::var("COORDINATOR_TEST_MYSQL_USER").unwrap_or_else(|_| "root".to_string()),
        password: env::var("COORDINATOR_TEST_MYSQL_PASS").unwrap_or_default(),
        ..MySqlConfig::default()
    }
}

/// Probe against the test server
pub fn probe() -> SqlProbe<MySqlRunner> {
    let runner = MySqlRunner::new(&get_mysql_config()).expect("Failed to create MySQL runner");
    SqlProbe::new(runner)
}

/// Restores the server's read_only state when dropped
pub struct ReadOnlyGuard<'a> {
    probe: &'a SqlProbe<MySqlRunner>,
    initial: bool,
}

impl<'a> ReadOnlyGuard<'a> {
    pub fn new(probe: &'a SqlProbe<MySqlRunner>) -> Self {
        let initial = probe.is_read_only().expect("Failed to read read_only");
        Self { probe, initial }
    }
}

impl Drop for ReadOnlyGuard<'_> {
    fn drop(&mut self) {
        let _ = self.probe.set_read_only(self.initial);
    }
}
