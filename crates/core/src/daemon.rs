// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon record: the persisted configuration-state of one FS daemon.
//!
//! Runtime-only fields (process state, PID, control-socket client handle)
//! live in `fsman-manager`'s in-memory cache, never here — this type is
//! exactly what the persistent registry stores and restores.

use crate::DaemonId;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Which kernel/userspace path serves the filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FsDriver {
    Fusedev,
    Fscache,
    Blockdev,
}

impl FsDriver {
    /// The daemon binary's first positional subcommand argument for this driver.
    pub fn subcommand(&self) -> Option<&'static str> {
        match self {
            FsDriver::Fusedev => Some("fuse"),
            FsDriver::Fscache => Some("singleton"),
            // blockdev bypasses the daemon entirely (§1.4.D, §1.9).
            FsDriver::Blockdev => None,
        }
    }
}

/// One daemon process vs. many RAFS instances sharing one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonMode {
    Dedicated,
    Shared,
    None,
}

/// Persisted configuration-state of one FS daemon (§1.3 "Daemon record").
///
/// Deliberately excludes runtime-only fields: process ID, runtime state,
/// mutex, control-socket client, supervisor handle. Those live in the
/// manager's in-memory cache and are rebuilt on recovery, never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaemonRecord {
    pub id: DaemonId,
    pub api_socket: PathBuf,
    pub config_dir: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub log_to_stdout: bool,
    pub log_rotation_size: u64,
    pub mountpoint: PathBuf,
    pub fs_driver: FsDriver,
    pub daemon_mode: DaemonMode,
    pub thread_num: u32,
    pub reference_count: i32,
    /// Path to the supervisor socket this daemon was started with, if the
    /// recovery policy in effect at creation time was `failover`.
    pub supervisor_path: Option<PathBuf>,
}

impl DaemonRecord {
    /// A shared daemon's mountpoint hosts its RAFS instances as
    /// subdirectories named by snapshot ID (§1.3 invariant ii).
    pub fn instance_mountpoint(&self, snapshot_id: &str) -> PathBuf {
        match self.daemon_mode {
            DaemonMode::Shared => self.mountpoint.join(snapshot_id),
            DaemonMode::Dedicated | DaemonMode::None => self.mountpoint.clone(),
        }
    }
}

/// In-memory-only runtime state of a daemon (never persisted; §1.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DaemonState {
    Unknown,
    Init,
    Ready,
    Running,
    Died,
    Destroyed,
}

impl DaemonState {
    /// Whether `to` is a legal next state from `self`, per the state diagram
    /// in §1.4.D. Used to enforce state-machine monotonicity (§1.8): a
    /// daemon never goes from `Running` back to `Init` without passing
    /// through `Died` or `Destroyed` first.
    pub fn can_transition_to(&self, to: DaemonState) -> bool {
        use DaemonState::*;
        match (self, to) {
            (Unknown, Init) => true,
            // a cold restart re-bootstraps a dead daemon under the same id,
            // having passed through DIED first (monotonicity is preserved:
            // this is not RUNNING/READY jumping straight back to INIT)
            (Died, Init) => true,
            (Init, Ready) => true,
            (Ready, Running) => true,
            // liveness-monitor HUP forces DIED from any of these
            (Init | Ready | Running, Died) => true,
            (Died, Destroyed) => true,
            // any state can be force-destroyed directly (destroy_daemon is
            // best-effort and may run concurrently with a state transition)
            (_, Destroyed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DaemonState::Unknown => "UNKNOWN",
            DaemonState::Init => "INIT",
            DaemonState::Ready => "READY",
            DaemonState::Running => "RUNNING",
            DaemonState::Died => "DIED",
            DaemonState::Destroyed => "DESTROYED",
        };
        write!(f, "{s}")
    }
}
