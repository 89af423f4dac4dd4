//! meridiand — the Meridian balancing coordinator.
//!
//! Single binary that assembles the coordinator subsystems:
//! - Cluster view fed by store and region heartbeats
//! - Coordinator with the leader and storage balancers
//! - Store liveness monitor
//! - REST API + Prometheus metrics
//!
//! # Usage
//!
//! ```text
//! meridiand serve --config /etc/meridian/meridiand.toml
//! ```

mod config;
mod monitor;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};

use meridian_api::{ApiState, build_router};
use meridian_cluster::{ClusterInfo, MemoryIdAllocator};
use meridian_scheduler::{Coordinator, ScheduleOptions};

use crate::config::DaemonConfig;

/// Delay between two sweeps of the store liveness monitor.
const STORE_MONITOR_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "meridiand", about = "Meridian balancing coordinator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the coordinator and its API server.
    Serve {
        /// Path to meridiand.toml. Defaults apply when omitted.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Listen address, overriding the config file.
        #[arg(long)]
        listen: Option<SocketAddr>,

        /// Log output format.
        #[arg(long, value_enum, default_value = "text")]
        log_format: LogFormat,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve {
            config,
            listen,
            log_format,
        } => {
            init_tracing(log_format);
            let mut config = match config {
                Some(path) => {
                    let config = DaemonConfig::from_file(&path)?;
                    info!(path = ?path, "config loaded");
                    config
                }
                None => DaemonConfig::default(),
            };
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            run_serve(config).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,meridiand=debug,meridian=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run_serve(config: DaemonConfig) -> anyhow::Result<()> {
    info!("Meridian coordinator starting");

    // ── Initialize subsystems ──────────────────────────────────

    let cluster = Arc::new(ClusterInfo::new(Arc::new(MemoryIdAllocator::default())));
    let options = Arc::new(ScheduleOptions::new(config.schedule.clone()));
    let coordinator = Arc::new(Coordinator::new(cluster.clone(), options));

    coordinator.run();
    for spec in &config.schedulers {
        let scheduler = spec.build();
        let name = scheduler.name().to_string();
        if !coordinator.add_scheduler(scheduler) {
            warn!(scheduler = %name, "configured scheduler already running");
        }
    }
    info!(schedulers = ?coordinator.scheduler_names(), "coordinator running");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let monitor_handle = tokio::spawn(monitor::run_store_monitor(
        cluster,
        config.server.store_heartbeat_timeout,
        STORE_MONITOR_INTERVAL,
        shutdown_rx,
    ));

    // ── Start API server ───────────────────────────────────────

    let router = build_router(ApiState::new(coordinator.clone()));
    let addr = config.server.listen;

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    coordinator.stop().await;
    let _ = monitor_handle.await;

    info!("Meridian coordinator stopped");
    Ok(())
}
