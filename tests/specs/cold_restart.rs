//! Cold restart after death: re-mount in `seq` order within 5s (§1.8, §1.4.D).

use crate::support::{kill_daemon, unique_id, wait_for_mounts, wait_until_state, Harness};
use fsman_core::{DaemonMode, DaemonState, RecoveryPolicy};
use std::time::Duration;

#[tokio::test]
async fn restarted_daemon_remounts_instances_in_seq_order() {
    let h = Harness::with_policy(RecoveryPolicy::Restart);
    let daemon_id = unique_id("daemon");
    let mut record = h.daemon_record(&daemon_id);
    record.daemon_mode = DaemonMode::Shared;
    let managed = h.manager.add_daemon(record.clone()).await.expect("add_daemon");

    h.manager.start_daemon(&managed.id, false).await.expect("start_daemon");
    wait_until_state(&managed, DaemonState::Running, Duration::from_secs(5)).await;
    let first_pid = managed.process_id().expect("daemon reported a pid");

    let snap_a = unique_id("snap");
    let snap_b = unique_id("snap");
    let instance_a = h.manager.add_rafs_instance(h.rafs_instance(&snap_a, &daemon_id)).await.expect("instance a");
    let instance_b = h.manager.add_rafs_instance(h.rafs_instance(&snap_b, &daemon_id)).await.expect("instance b");
    assert_eq!(instance_a.seq, 1);
    assert_eq!(instance_b.seq, 2);

    h.manager.mount_instance(&instance_a, "{}").await.expect("mount a");
    h.manager.mount_instance(&instance_b, "{}").await.expect("mount b");

    kill_daemon(&managed);

    // Same cache entry, same id: cold restart re-bootstraps the existing
    // `ManagedDaemon` rather than minting a new one.
    wait_until_state(&managed, DaemonState::Running, Duration::from_secs(5)).await;
    let second_pid = managed.process_id().expect("restarted daemon reported a pid");
    assert_ne!(first_pid, second_pid, "cold restart must spawn a fresh process");

    let expected_mounts = vec![
        record.instance_mountpoint(snap_a.as_str()).display().to_string(),
        record.instance_mountpoint(snap_b.as_str()).display().to_string(),
    ];
    wait_for_mounts(&record.api_socket, &expected_mounts, Duration::from_secs(5)).await;
}
