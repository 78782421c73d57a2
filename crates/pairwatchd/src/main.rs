//! pairwatchd — the blue/green log monitor.
//!
//! Watches one active/standby pair of pm2 processes, samples the active
//! one's stdout every minute, and fails over to the standby when the
//! sample holds too many error lines.
//!
//! # Usage
//!
//! ```text
//! pairwatchd 0 1
//! ```
//!
//! Environment:
//! - `PAIRWATCH_CONFIG` — optional TOML file overriding the defaults
//! - `PAIRWATCH_PM2` — pm2 executable (default `pm2`)
//! - `RUST_LOG` — log filter
//!
//! Exits with code 2 if pm2 or its log bus is unreachable at startup;
//! otherwise runs until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use tokio::sync::watch;
use tracing::{error, info};

use pairwatch_core::{MonitorConfig, ProcessId, ProcessSupervisor, SupervisorResult};
use pairwatch_failover::CycleScheduler;
use pairwatch_pm2::Pm2Cli;

/// Exit code for an unreachable supervisor at startup.
const EXIT_SUPERVISOR_UNAVAILABLE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "pairwatchd",
    about = "Blue/green log monitor with delayed failover",
    version
)]
struct Cli {
    /// pm2 ids of the monitored pair.
    #[arg(required = true, num_args = 2)]
    ids: Vec<ProcessId>,
}

impl Cli {
    /// The monitored pair must be two distinct ids.
    fn validate(&self) -> Result<(), clap::Error> {
        match self.ids.as_slice() {
            [first, second] if first != second => Ok(()),
            [_, _] => Err(Cli::command().error(
                ErrorKind::ValueValidation,
                "the two process ids must differ",
            )),
            ids => Err(Cli::command().error(
                ErrorKind::WrongNumberOfValues,
                format!("expected exactly two process ids, got {}", ids.len()),
            )),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,pairwatch=debug".into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }
    let config = load_config()?;

    let pm2 = std::env::var_os("PAIRWATCH_PM2")
        .map(Pm2Cli::with_binary)
        .unwrap_or_default();
    info!(binary = %pm2.binary().display(), ids = ?cli.ids, "pairwatch starting");

    let supervisor: Arc<dyn ProcessSupervisor> = Arc::new(pm2);
    if let Err(e) = check_supervisor(supervisor.as_ref()).await {
        error!(error = %e, "process supervisor unavailable");
        std::process::exit(EXIT_SUPERVISOR_UNAVAILABLE);
    }

    let scheduler = CycleScheduler::new(supervisor, cli.ids, &config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for ctrl-c"),
        }
        let _ = shutdown_tx.send(true);
    });

    scheduler.run(shutdown_rx).await;

    info!("pairwatch stopped");
    Ok(())
}

/// Load `MonitorConfig` from `PAIRWATCH_CONFIG`, or use the defaults.
fn load_config() -> anyhow::Result<MonitorConfig> {
    let Some(path) = std::env::var_os("PAIRWATCH_CONFIG").map(PathBuf::from) else {
        return Ok(MonitorConfig::default());
    };
    let config = MonitorConfig::from_file(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    info!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Verify the supervisor and its log bus are reachable.
async fn check_supervisor(supervisor: &dyn ProcessSupervisor) -> SupervisorResult<()> {
    supervisor.connect().await?;
    supervisor.subscribe_log_lines().await?.unsubscribe();
    info!("connected to process supervisor");
    Ok(())
}
