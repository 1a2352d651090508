//! Health coordinator integration tests

use std::time::Duration;

use crate::{probe, skip_if_not_enabled, ReadOnlyGuard, SERVER_LOCK};
use mysql_role_coordinator::config::MaintenancePolicy;
use mysql_role_coordinator::health::{FileMarker, HealthCoordinator};
use mysql_role_coordinator::probe::RetryPolicy;
use mysql_role_coordinator::role::Role;

fn coordinator(marker: &std::path::Path) -> HealthCoordinator<mysql_role_coordinator::probe::MySqlRunner> {
    HealthCoordinator::new(
        probe(),
        RetryPolicy::new(1, Duration::ZERO),
        Box::new(FileMarker::new(marker)),
        MaintenancePolicy::Tolerate,
    )
}

#[test]
fn test_leader_read_only_is_corrected() {
    skip_if_not_enabled!();
    let _lock = SERVER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir.path().join("PreUpdating"));
    let _guard = ReadOnlyGuard::new(coordinator.probe());

    coordinator.probe().set_read_only(true).unwrap();

    let verdict = coordinator.evaluate(Role::Leader);
    assert!(verdict.healthy, "verdict: {:?}", verdict);
    assert!(verdict.corrective_action_taken);
    assert!(!coordinator.probe().is_read_only().unwrap());
}

#[test]
fn test_leader_under_maintenance_left_read_only() {
    skip_if_not_enabled!();
    let _lock = SERVER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let dir = tempfile::tempdir().unwrap();
    let marker = dir.path().join("PreUpdating");
    std::fs::write(&marker, b"").unwrap();
    let coordinator = coordinator(&marker);
    let _guard = ReadOnlyGuard::new(coordinator.probe());

    coordinator.probe().set_read_only(true).unwrap();

    let verdict = coordinator.evaluate(Role::Leader);
    assert!(verdict.maintenance_pending);
    assert!(coordinator.probe().is_read_only().unwrap());
}

#[test]
fn test_standalone_server_is_not_a_healthy_follower() {
    skip_if_not_enabled!();
    let _lock = SERVER_LOCK.lock().unwrap_or_else(|e| e.into_inner());

    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir.path().join("PreUpdating"));
    let _guard = ReadOnlyGuard::new(coordinator.probe());

    coordinator.probe().set_read_only(true).unwrap();

    assert!(!coordinator.evaluate(Role::Follower).healthy);
    assert!(coordinator.evaluate(Role::Idle).healthy);
}
