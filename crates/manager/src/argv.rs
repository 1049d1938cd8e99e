// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builds the FS daemon process's command line (§1.6 "External command-line
//! of the daemon process"). Zero-valued fields are omitted.

use fsman_core::{DaemonRecord, RafsInstance};
use std::path::Path;

pub struct StartArgs<'a> {
    pub record: &'a DaemonRecord,
    pub bootstrap: Option<&'a Path>,
    pub fscache_dir: Option<&'a Path>,
    pub fscache_threads: u32,
    pub prefetch_files: Option<&'a Path>,
    pub upgrade: bool,
}

/// Builds argv for launching a new daemon process. The first element is
/// the driver subcommand (`fuse`/`singleton`), if any, followed by flags.
pub fn build_argv(args: &StartArgs<'_>) -> Vec<String> {
    let record = args.record;
    let mut argv = Vec::new();

    if let Some(subcommand) = record.fs_driver.subcommand() {
        argv.push(subcommand.to_string());
    }

    argv.push("--apisock".into());
    argv.push(record.api_socket.display().to_string());

    argv.push("--log-level".into());
    argv.push(record.log_level.clone());

    if !record.log_to_stdout {
        argv.push("--log-file".into());
        argv.push(record.log_dir.join("daemon.log").display().to_string());
    }

    if record.log_rotation_size > 0 {
        argv.push("--log-rotation-size".into());
        argv.push(record.log_rotation_size.to_string());
    }

    argv.push("--id".into());
    argv.push(record.id.to_string());

    if let Some(supervisor_path) = &record.supervisor_path {
        argv.push("--supervisor".into());
        argv.push(supervisor_path.display().to_string());
    }

    if args.upgrade {
        argv.push("--upgrade".into());
    }

    if record.thread_num > 0 {
        argv.push("--thread-num".into());
        argv.push(record.thread_num.to_string());
    }

    argv.push("--config".into());
    argv.push(record.config_dir.join("config.json").display().to_string());

    if let Some(bootstrap) = args.bootstrap {
        argv.push("--bootstrap".into());
        argv.push(bootstrap.display().to_string());
    }

    argv.push("--mountpoint".into());
    argv.push(record.mountpoint.display().to_string());

    if let Some(fscache_dir) = args.fscache_dir {
        argv.push("--fscache".into());
        argv.push(fscache_dir.display().to_string());

        if args.fscache_threads > 0 {
            argv.push("--fscache-threads".into());
            argv.push(args.fscache_threads.to_string());
        }
    }

    if let Some(prefetch_files) = args.prefetch_files {
        argv.push("--prefetch-files".into());
        argv.push(prefetch_files.display().to_string());
    }

    argv
}

/// Instance-specific bootstrap path resolution: current layout first,
/// falling back to the legacy layout (§1.3 `RafsInstance::bootstrap_path`).
pub fn resolve_bootstrap(instance: &RafsInstance) -> std::path::PathBuf {
    let current = instance.bootstrap_path();
    if current.exists() {
        current
    } else {
        instance.legacy_bootstrap_path()
    }
}
