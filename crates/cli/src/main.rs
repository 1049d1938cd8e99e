// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `fsmand`: process entry point. Loads configuration, wires the registry,
//! supervisor set, liveness monitor, and manager together, recovers
//! persisted state, and runs until asked to shut down.

mod config;
mod logging;

use clap::Parser;
use config::RegistryConfig;
use fsman_manager::Manager;
use fsman_monitor::LivenessMonitor;
use fsman_registry::PersistentRegistry;
use fsman_supervisor::SupervisorSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "fsmand",
    about = "FS daemon lifecycle control plane",
    version = concat!(env!("CARGO_PKG_VERSION"), "+", env!("BUILD_GIT_HASH"))
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, env = "FSMAN_CONFIG", default_value = "/etc/fsman/fsmand.toml")]
    config: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = RegistryConfig::load(&cli.config)?;
    let _log_guard = logging::init(&config)?;

    info!(
        root_dir = %config.root_dir.display(),
        daemon_binary = %config.daemon_binary.display(),
        default_recovery_policy = ?config.default_recovery_policy,
        default_daemon_mode = ?config.default_daemon_mode,
        "fsmand starting"
    );

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(config))
}

async fn run(config: RegistryConfig) -> anyhow::Result<()> {
    for dir in [config.sockets_dir(), config.config_dir(), config.logs_dir(), config.supervisor_dir()] {
        std::fs::create_dir_all(&dir)?;
    }

    let registry = Arc::new(PersistentRegistry::open(config.registry_path())?);
    let supervisors = Arc::new(SupervisorSet::new(config.supervisor_dir()));
    let monitor = Arc::new(LivenessMonitor::new()?);

    let manager = Arc::new(Manager::new(
        registry,
        supervisors,
        monitor.clone(),
        config.daemon_binary.clone(),
        config.default_recovery_policy,
        config.allowed_fs_drivers.clone(),
        Duration::from_secs(config.control_socket_timeout_secs),
    ));

    let recovered = manager.recover().await?;
    info!(live = recovered.live.len(), recovering = recovered.recovering.len(), "recovery complete");
    for id in &recovered.recovering {
        let manager = manager.clone();
        let id = id.clone();
        tokio::spawn(async move {
            if let Err(e) = manager.start_daemon(&id, false).await {
                error!(daemon_id = %id, error = %e, "failed to restart daemon found dead at recovery");
            }
        });
    }

    let monitor_thread = {
        let monitor = monitor.clone();
        std::thread::Builder::new()
            .name("fsman-liveness-monitor".into())
            .spawn(move || {
                if let Err(e) = monitor.run() {
                    error!(error = %e, "liveness monitor loop exited with error");
                }
            })?
    };

    let death_loop = {
        let manager = manager.clone();
        tokio::spawn(async move { manager.run_death_loop().await })
    };

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");

    monitor.destroy();
    death_loop.abort();
    let _ = monitor_thread.join();

    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {}
        _ = sigint.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
