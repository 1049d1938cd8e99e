// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`SupervisorSet`]: the manager's view of all live supervisors, keyed by
//! daemon ID (§1.4.B).

use crate::error::{Result, SupervisorError};
use crate::handle::Supervisor;
use fsman_core::DaemonId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

pub struct SupervisorSet {
    root: PathBuf,
    supervisors: Mutex<HashMap<DaemonId, Arc<Supervisor>>>,
}

impl SupervisorSet {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), supervisors: Mutex::new(HashMap::new()) }
    }

    /// Create-or-replace: an existing supervisor for `id` is destroyed
    /// first, then a fresh one is registered at `<root>/<id>.sock`.
    pub fn new_supervisor(&self, id: &DaemonId) -> Arc<Supervisor> {
        let mut supervisors = self.supervisors.lock();
        if let Some(old) = supervisors.remove(id) {
            old.destroy();
        }
        let socket_path = self.root.join(format!("{id}.sock"));
        let supervisor = Arc::new(Supervisor::new(id.clone(), socket_path));
        supervisors.insert(id.clone(), supervisor.clone());
        supervisor
    }

    pub fn get_supervisor(&self, id: &DaemonId) -> Result<Arc<Supervisor>> {
        self.supervisors.lock().get(id).cloned().ok_or_else(|| SupervisorError::NotFound(id.clone()))
    }

    pub fn destroy_supervisor(&self, id: &DaemonId) -> Result<()> {
        let removed = self.supervisors.lock().remove(id);
        match removed {
            Some(supervisor) => {
                supervisor.destroy();
                Ok(())
            }
            None => Err(SupervisorError::NotFound(id.clone())),
        }
    }
}
