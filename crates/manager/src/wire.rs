// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire shapes exchanged with the daemon's HTTP-over-UDS control API
//! (§1.6). Field names and the mount command's nesting follow the real
//! control protocol, not an invented one.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Body of `GET /api/v1/daemon`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonInfo {
    pub id: Option<String>,
    pub version: String,
    pub state: String,
}

/// Body of `POST /api/v1/mount?mountpoint=<p>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsBackendMountCmd {
    pub fs_type: String,
    pub source: String,
    pub config: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefetch_files: Option<Vec<String>>,
}

impl FsBackendMountCmd {
    pub fn rafs(bootstrap: impl Into<String>, config_json: impl Into<String>) -> Self {
        Self { fs_type: "rafs".into(), source: bootstrap.into(), config: config_json.into(), prefetch_files: None }
    }
}

/// Body of `DELETE /api/v1/mount?mountpoint=<p>` — empty on the wire, kept
/// as a type so call sites read the same as the mount side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FsBackendUmountCmd {}

/// Error body returned by the daemon's control API on non-2xx responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DaemonErrorBody {
    pub code: String,
    pub message: String,
}

/// `PUT /api/v2/blobs` body (fscache driver blob-cache binding).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobCacheBindCmd {
    pub domain_id: String,
    pub blob_id: String,
    #[serde(flatten)]
    pub config: HashMap<String, serde_json::Value>,
}
