// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the root end-to-end suite (§1.8 "Concrete scenarios
//! seeding the end-to-end suite"). Each test gets its own [`Harness`]: a
//! scratch directory tree, a real in-process [`Manager`] backed by an
//! in-memory registry, and the `fsman-fake-daemon` binary standing in for
//! `nydusd`. The liveness monitor runs on its own OS thread and the
//! manager's death loop runs as a background task, matching `fsmand`'s own
//! startup sequencing.

#![allow(dead_code)]

use fsman_core::test_support::{DaemonRecordBuilder, RafsInstanceBuilder};
use fsman_core::{DaemonRecord, DaemonState, FsDriver, RafsInstance, RecoveryPolicy};
use fsman_manager::{ManagedDaemon, Manager, DEFAULT_CLIENT_TIMEOUT};
use fsman_monitor::LivenessMonitor;
use fsman_registry::PersistentRegistry;
use fsman_supervisor::SupervisorSet;
use hyper::{Body, Client};
use hyperlocal::{UnixClientExt, Uri as UnixUri};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub struct Harness {
    pub root: TempDir,
    pub manager: Arc<Manager>,
    pub supervisors: Arc<SupervisorSet>,
    monitor: Arc<LivenessMonitor>,
    monitor_thread: Option<std::thread::JoinHandle<()>>,
    death_loop: Option<tokio::task::JoinHandle<()>>,
}

pub fn fake_daemon_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fsman-fake-daemon"))
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(RecoveryPolicy::None)
    }

    pub fn with_policy(default_recovery_policy: RecoveryPolicy) -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let registry = Arc::new(PersistentRegistry::open_in_memory().expect("in-memory registry"));
        let supervisors = Arc::new(SupervisorSet::new(root.path().join("supervisor")));
        let monitor = Arc::new(LivenessMonitor::new().expect("liveness monitor"));
        let manager = Arc::new(Manager::new(
            registry,
            supervisors.clone(),
            monitor.clone(),
            fake_daemon_binary(),
            default_recovery_policy,
            vec![FsDriver::Fusedev, FsDriver::Fscache, FsDriver::Blockdev],
            DEFAULT_CLIENT_TIMEOUT,
        ));

        let monitor_thread = {
            let monitor = monitor.clone();
            Some(std::thread::spawn(move || {
                let _ = monitor.run();
            }))
        };
        let death_loop = {
            let manager = manager.clone();
            Some(tokio::spawn(async move { manager.run_death_loop().await }))
        };

        Self { root, manager, supervisors, monitor, monitor_thread, death_loop }
    }

    /// A dedicated-mode daemon record rooted under this harness's scratch
    /// directory, with every path distinct per `id`.
    pub fn daemon_record(&self, id: &str) -> DaemonRecord {
        let dir = self.root.path().join("daemons").join(id);
        let mut record = DaemonRecordBuilder::new(id).build();
        record.api_socket = dir.join("api.sock");
        record.config_dir = dir.join("config");
        record.log_dir = dir.join("logs");
        record.mountpoint = dir.join("mnt");
        record
    }

    pub fn rafs_instance(&self, snapshot_id: &str, daemon_id: &str) -> RafsInstance {
        let dir = self.root.path().join("snapshots").join(snapshot_id);
        RafsInstanceBuilder::new(snapshot_id, daemon_id).mountpoint(dir.join("mnt")).build()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.monitor.destroy();
        if let Some(death_loop) = self.death_loop.take() {
            death_loop.abort();
        }
        if let Some(thread) = self.monitor_thread.take() {
            let _ = thread.join();
        }
    }
}

/// Polls a [`ManagedDaemon`]'s local state until it reaches `target`,
/// panicking (test failure, not a production path) on timeout.
pub async fn wait_until_state(managed: &ManagedDaemon, target: DaemonState, timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if managed.state() == target {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("daemon {} did not reach {target} within {timeout:?} (state: {})", managed.id, managed.state());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

pub fn unique_id(prefix: &str) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    format!("{prefix}-{}", COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// SIGKILLs a managed daemon's child process, simulating a crash for the
/// liveness monitor to observe. Panics if the daemon never reported a PID.
pub fn kill_daemon(managed: &ManagedDaemon) {
    let pid = managed.process_id().expect("daemon has no recorded process id");
    nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), nix::sys::signal::Signal::SIGKILL)
        .expect("SIGKILL failed");
}

/// GETs one of the fake daemon's `/fsman-test/...` introspection endpoints
/// over its Unix control socket and parses the JSON body.
pub async fn fetch_test_json(api_socket: &Path, path: &str) -> serde_json::Value {
    let client: Client<_, Body> = Client::unix();
    let uri: hyper::Uri = UnixUri::new(api_socket, path).into();
    let resp = client.get(uri).await.expect("fsman-test introspection request");
    let body = hyper::body::to_bytes(resp.into_body()).await.expect("read introspection response body");
    serde_json::from_slice(&body).expect("introspection response is valid JSON")
}

/// Polls `/fsman-test/mounts` until `expected` matches (ascending `seq`
/// order mount replay is not instantaneous after a restart).
pub async fn wait_for_mounts(api_socket: &Path, expected: &[String], timeout: Duration) {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let body = fetch_test_json(api_socket, "/fsman-test/mounts").await;
        let mounts: Vec<String> =
            serde_json::from_value(body["mounts"].clone()).expect("mounts field is an array of strings");
        if mounts == expected {
            return;
        }
        if tokio::time::Instant::now() >= deadline {
            panic!("mounts on {} never reached {expected:?} (last seen: {mounts:?})", api_socket.display());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
