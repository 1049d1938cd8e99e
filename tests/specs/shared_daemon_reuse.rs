//! Shared-daemon reuse: two RAFS instances attached to one daemon process,
//! `reference_count` tracking how many snapshots depend on it (§1.8, §1.3).

use crate::support::{unique_id, wait_until_state, Harness};
use fsman_core::{DaemonMode, DaemonState};
use std::time::Duration;

#[tokio::test]
async fn two_instances_share_one_daemon_with_reference_count_two() {
    let h = Harness::new();
    let daemon_id = unique_id("daemon");
    let mut record = h.daemon_record(&daemon_id);
    record.daemon_mode = DaemonMode::Shared;
    let managed = h.manager.add_daemon(record.clone()).await.expect("add_daemon");

    h.manager.start_daemon(&managed.id, false).await.expect("start_daemon");
    wait_until_state(&managed, DaemonState::Running, Duration::from_secs(5)).await;

    let snap_a = unique_id("snap");
    let snap_b = unique_id("snap");
    let instance_a = h.manager.add_rafs_instance(h.rafs_instance(&snap_a, &daemon_id)).await.expect("instance a");
    let instance_b = h.manager.add_rafs_instance(h.rafs_instance(&snap_b, &daemon_id)).await.expect("instance b");

    assert_eq!(instance_a.seq, 1);
    assert_eq!(instance_b.seq, 2);
    assert_eq!(managed.instances().len(), 2);
    assert_eq!(managed.record().reference_count, 2, "each attached instance bumps the daemon's reference_count");

    h.manager.mount_instance(&instance_a, "{}").await.expect("mount a");
    h.manager.mount_instance(&instance_b, "{}").await.expect("mount b");

    // Shared-mode instances mount under per-snapshot subdirectories of the
    // daemon's mountpoint, never the daemon's own mountpoint directly.
    assert_ne!(record.instance_mountpoint(snap_a.as_str()), record.instance_mountpoint(snap_b.as_str()));
    assert!(record.instance_mountpoint(snap_a.as_str()).starts_with(&record.mountpoint));
}
