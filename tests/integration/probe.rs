//! SQL probe integration tests

use std::time::Duration;

use crate::{probe, skip_if_not_enabled, ReadOnlyGuard, SERVER_LOCK};
use mysql_role_coordinator::probe::{RetryPolicy, Tri};

#[test]
fn test_liveness_query() {
    skip_if_not_enabled!();

    probe().liveness_query().expect("SELECT 1 should succeed");
}

#[test]
fn test_long_query_time_is_positive() {
    skip_if_not_enabled!();

    let value = probe()
        .long_query_time()
        .expect("long_query_time should be readable");
    assert!(value > 0.0, "long_query_time = {}", value);
}

#[test]
fn test_read_only_round_trip() {
    skip_if_not_enabled!();
    let _lock = SERVER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let probe = probe();
    let _guard = ReadOnlyGuard::new(&probe);

    probe.set_read_only(true).expect("turning read_only on should succeed");
    assert!(probe.is_read_only().unwrap());

    probe.set_read_only(false).expect("turning read_only off should succeed");
    assert!(!probe.is_read_only().unwrap());
}

#[test]
fn test_standalone_server_has_no_replica() {
    skip_if_not_enabled!();

    let result = probe().check_replication_status(&RetryPolicy::new(1, Duration::ZERO));
    assert!(result.is_ok(), "unexpected error: {:?}", result.error);
    assert_eq!(result.lagged, Tri::False);
    assert_eq!(result.replicating, Tri::False);
}
