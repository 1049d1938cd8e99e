//! Live-upgrade: successor lands on `api1.sock`, the old process exits, and
//! its RAFS instances carry over to the successor (§1.8, §1.4.D).

use crate::support::{fetch_test_json, unique_id, wait_until_state, Harness};
use fsman_core::DaemonState;
use std::time::Duration;

#[tokio::test]
async fn successor_takes_over_on_incremented_socket_with_instances_intact() {
    let h = Harness::new();
    let daemon_id = unique_id("daemon");
    let record = h.daemon_record(&daemon_id);
    let managed = h.manager.add_daemon(record.clone()).await.expect("add_daemon");

    h.manager.start_daemon(&managed.id, false).await.expect("start_daemon");
    wait_until_state(&managed, DaemonState::Running, Duration::from_secs(5)).await;

    let snapshot_id = unique_id("snap");
    let instance = h.manager.add_rafs_instance(h.rafs_instance(&snapshot_id, &daemon_id)).await.expect("add_rafs_instance");
    h.manager.mount_instance(&instance, "{}").await.expect("mount_instance");

    let new_id = h.manager.live_upgrade(&managed.id).await.expect("live_upgrade");
    assert_eq!(new_id.as_str(), format!("{daemon_id}-upgrade"));

    let new_managed = h.manager.get_daemon(&new_id).await.expect("successor is cached");
    let new_record = new_managed.record();
    assert_eq!(new_record.api_socket, record.api_socket.parent().expect("socket dir").join("api1.sock"));
    assert!(new_managed.instances().contains(&instance.snapshot_id), "instance bookkeeping must carry over");

    wait_until_state(&new_managed, DaemonState::Running, Duration::from_secs(5)).await;

    // The old daemon's cache entry is gone and its process has exited, so
    // its control socket no longer accepts connections.
    assert!(h.manager.get_daemon(&managed.id).await.is_err(), "old daemon id must be evicted from the cache");
    let old_info = fsman_manager::ControlClient::new(&record.api_socket).daemon_info().await;
    assert!(old_info.is_err(), "old daemon's control socket must no longer be reachable");
}
