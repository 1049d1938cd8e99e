// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RAFS-instance record: one mounted filesystem from one image layer stack.

use crate::{DaemonId, FsDriver, SnapshotId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Persisted record of one RAFS instance (§1.3 "RAFS-instance record").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RafsInstance {
    pub snapshot_id: SnapshotId,
    pub image_id: String,
    /// Empty for `blockdev` (§1.3).
    pub daemon_id: Option<DaemonId>,
    pub fs_driver: FsDriver,
    pub snapshot_dir: PathBuf,
    pub mountpoint: PathBuf,
    /// Monotonic, assigned once by the persistent registry, never mutated.
    pub seq: u64,
    pub annotations: HashMap<String, String>,
}

impl RafsInstance {
    /// Path to the instance's RAFS metadata file, per GLOSSARY "Bootstrap".
    /// Current layout first, falling back to the legacy layout (without
    /// the `image/` subdirectory) if the current one doesn't exist.
    pub fn bootstrap_path(&self) -> PathBuf {
        self.snapshot_dir.join("fs").join("image").join("image.boot")
    }

    /// The legacy (pre-`image/`-subdirectory) bootstrap location.
    pub fn legacy_bootstrap_path(&self) -> PathBuf {
        self.snapshot_dir.join("fs").join("image.boot")
    }
}
