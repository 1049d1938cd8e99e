// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Test builders shared across crates (enabled via `test-support` feature).

use crate::{DaemonId, DaemonMode, DaemonRecord, FsDriver, RafsInstance, SnapshotId};
use std::collections::HashMap;
use std::path::PathBuf;

/// Builder for [`DaemonRecord`] with sensible defaults for tests.
pub struct DaemonRecordBuilder {
    record: DaemonRecord,
}

impl DaemonRecordBuilder {
    pub fn new(id: impl Into<String>) -> Self {
        let id = DaemonId::new(id.into());
        Self {
            record: DaemonRecord {
                api_socket: PathBuf::from(format!("/tmp/fsman/socket/{id}/api.sock")),
                config_dir: PathBuf::from(format!("/tmp/fsman/config/{id}")),
                log_dir: PathBuf::from(format!("/tmp/fsman/logs/{id}")),
                log_level: "info".into(),
                log_to_stdout: false,
                log_rotation_size: 0,
                mountpoint: PathBuf::from(format!("/tmp/fsman/mnt/{id}")),
                fs_driver: FsDriver::Fusedev,
                daemon_mode: DaemonMode::Dedicated,
                thread_num: 4,
                reference_count: 0,
                supervisor_path: None,
                id,
            },
        }
    }

    pub fn fs_driver(mut self, fs_driver: FsDriver) -> Self {
        self.record.fs_driver = fs_driver;
        self
    }

    pub fn daemon_mode(mut self, daemon_mode: DaemonMode) -> Self {
        self.record.daemon_mode = daemon_mode;
        self
    }

    pub fn supervisor_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.record.supervisor_path = Some(path.into());
        self
    }

    pub fn reference_count(mut self, n: i32) -> Self {
        self.record.reference_count = n;
        self
    }

    pub fn build(self) -> DaemonRecord {
        self.record
    }
}

/// Builder for [`RafsInstance`] with sensible defaults for tests.
pub struct RafsInstanceBuilder {
    instance: RafsInstance,
}

impl RafsInstanceBuilder {
    pub fn new(snapshot_id: impl Into<String>, daemon_id: impl Into<String>) -> Self {
        let snapshot_id = SnapshotId::new(snapshot_id.into());
        Self {
            instance: RafsInstance {
                image_id: "test/image:latest".into(),
                daemon_id: Some(DaemonId::new(daemon_id.into())),
                fs_driver: FsDriver::Fusedev,
                snapshot_dir: PathBuf::from(format!("/tmp/fsman/snapshots/{snapshot_id}")),
                mountpoint: PathBuf::from(format!("/tmp/fsman/mnt/{snapshot_id}")),
                seq: 0,
                annotations: HashMap::new(),
                snapshot_id,
            },
        }
    }

    pub fn seq(mut self, seq: u64) -> Self {
        self.instance.seq = seq;
        self
    }

    pub fn mountpoint(mut self, mountpoint: impl Into<PathBuf>) -> Self {
        self.instance.mountpoint = mountpoint.into();
        self
    }

    pub fn build(self) -> RafsInstance {
        self.instance
    }
}
