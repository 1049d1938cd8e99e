//! Warm failover fidelity: FD identity preserved across a supervisor-backed
//! failover, verified by a marker byte (§1.8, §1.4.D).

use crate::support::{fetch_test_json, kill_daemon, unique_id, wait_until_state, Harness};
use fsman_core::{DaemonId, DaemonState, RecoveryPolicy};
use std::io::Write;
use std::time::Duration;

#[tokio::test]
#[serial_test::serial]
async fn successor_recovers_predecessors_fd_through_the_supervisor() {
    let h = Harness::with_policy(RecoveryPolicy::Failover);
    let daemon_id = unique_id("daemon");

    let supervisor = h.supervisors.new_supervisor(&DaemonId::new(daemon_id.clone()));
    let mut record = h.daemon_record(&daemon_id);
    record.supervisor_path = Some(supervisor.socket_path().to_path_buf());

    let mut marker_file = tempfile::NamedTempFile::new().expect("marker tempfile");
    marker_file.write_all(b"warm-failover-marker").expect("write marker");
    std::env::set_var("FSMAN_TEST_MARKER_FILE", marker_file.path());

    let managed = h.manager.add_daemon(record.clone()).await.expect("add_daemon");
    h.manager.start_daemon(&managed.id, false).await.expect("start_daemon");
    wait_until_state(&managed, DaemonState::Running, Duration::from_secs(5)).await;

    // The initial start's own post-RUNNING `fetch_daemon_states` hands the
    // marker FD to the supervisor before this incarnation dies.
    kill_daemon(&managed);

    wait_until_state(&managed, DaemonState::Running, Duration::from_secs(5)).await;

    let successor_marker = fetch_test_json(&record.api_socket, "/fsman-test/received-marker").await;
    assert_eq!(successor_marker["blob"], daemon_id.as_str());
    assert_eq!(successor_marker["fd_bytes"], "warm-failover-marker");

    std::env::remove_var("FSMAN_TEST_MARKER_FILE");
}
