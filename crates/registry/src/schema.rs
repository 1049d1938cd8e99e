// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk row shapes, current and legacy.
//!
//! Rows are stored as JSON blobs inside SQLite TEXT columns rather than as
//! normalized relational columns — the schema is small, changes rarely, and
//! a JSON blob lets [`crate::migration`] reshape a record without an ALTER
//! TABLE for every added field.

use fsman_core::{DaemonRecord, RafsInstance};
use serde::{Deserialize, Serialize};

/// Current on-disk schema version. Bump this and add a migration in
/// [`crate::migration`] whenever [`DaemonRecord`] or [`RafsInstance`] gains
/// or loses a field in a way that isn't `#[serde(default)]`-compatible.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// The legacy (schema version 1) on-disk daemon record shape, from before
/// RAFS instances were split into their own table. A shared daemon carried
/// the sentinel id `"shared_daemon"` and embedded the snapshot IDs of every
/// instance it served; a dedicated daemon embedded exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegacyDaemonRowV1 {
    pub id: String,
    pub api_socket: std::path::PathBuf,
    pub config_dir: std::path::PathBuf,
    pub log_dir: std::path::PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_to_stdout: bool,
    #[serde(default)]
    pub log_rotation_size: u64,
    pub mountpoint: std::path::PathBuf,
    pub fs_driver: fsman_core::FsDriver,
    pub daemon_mode: fsman_core::DaemonMode,
    #[serde(default = "default_thread_num")]
    pub thread_num: u32,
    /// snapshot_id -> image_id, for every RAFS instance this daemon served.
    pub snapshot_ids: std::collections::HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_thread_num() -> u32 {
    4
}

pub const LEGACY_SHARED_DAEMON_SENTINEL: &str = "shared_daemon";

/// Split one legacy v1 row into a current daemon record plus one RAFS
/// instance record per embedded snapshot ID (§1.4.A).
pub fn split_legacy_row(row: LegacyDaemonRowV1) -> (DaemonRecord, Vec<RafsInstance>) {
    let daemon_id = fsman_core::DaemonId::new(row.id.clone());

    let instances = row
        .snapshot_ids
        .iter()
        .map(|(snapshot_id, image_id)| {
            let snapshot_id = fsman_core::SnapshotId::new(snapshot_id.clone());
            RafsInstance {
                snapshot_dir: row.mountpoint.join("snapshots").join(snapshot_id.as_str()),
                mountpoint: row.mountpoint.join(snapshot_id.as_str()),
                daemon_id: Some(daemon_id.clone()),
                fs_driver: row.fs_driver,
                image_id: image_id.clone(),
                annotations: Default::default(),
                seq: 0,
                snapshot_id,
            }
        })
        .collect();

    let daemon = DaemonRecord {
        id: daemon_id,
        api_socket: row.api_socket,
        config_dir: row.config_dir,
        log_dir: row.log_dir,
        log_level: row.log_level,
        log_to_stdout: row.log_to_stdout,
        log_rotation_size: row.log_rotation_size,
        mountpoint: row.mountpoint,
        fs_driver: row.fs_driver,
        daemon_mode: row.daemon_mode,
        thread_num: row.thread_num,
        reference_count: 0,
        supervisor_path: None,
    };

    (daemon, instances)
}
