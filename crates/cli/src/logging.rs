// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Global `tracing` subscriber installation (§2.1). Compact or JSON
//! formatting selectable via config; a non-blocking rotating file appender
//! when `log_dir` is configured, stderr otherwise.

use crate::config::{LogFormat, RegistryConfig};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Installs the global subscriber. The returned [`WorkerGuard`] must be held
/// for the lifetime of the process when file logging is active — dropping it
/// flushes and stops the background writer thread.
pub fn init(config: &RegistryConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;
            let appender = tracing_appender::rolling::daily(log_dir, "fsmand.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(non_blocking);
            match config.log_format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Compact => builder.compact().init(),
            }
            Ok(Some(guard))
        }
        None => {
            let builder = tracing_subscriber::fmt().with_env_filter(filter);
            match config.log_format {
                LogFormat::Json => builder.json().init(),
                LogFormat::Compact => builder.compact().init(),
            }
            Ok(None)
        }
    }
}
