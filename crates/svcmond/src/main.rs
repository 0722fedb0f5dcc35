//! svcmond: the service monitor daemon.
//!
//! Drives one reporting loop per process:
//! - `monitor` loads probes, dependencies and a reporter from a TOML file
//!   and monitors until a verdict or a signal
//! - `status-check` is a one-shot HA check built from command-line flags
//!
//! The exit code carries the verdict: 0 success, -1 error, -2 monitoring
//! failure.
//!
//! # Usage
//!
//! ```text
//! svcmond monitor --config /etc/svcmon/namenode.toml
//! svcmond status-check --pid /var/run/namenode.pid --url http://localhost:50070/
//! ```

mod assemble;
mod status_check;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use svcmon_core::{LoopConfig, MonitorConfig, Probe, exit};
use svcmon_health::{LoopExit, MonitorError, ProbeReportHandler, ReportingLoop};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

const DEFAULT_LOG_FILTER: &str = "info,svcmond=debug,svcmon=debug";

#[derive(Parser)]
#[command(name = "svcmond", about = "Host-level service health monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor a service continuously, as described by a config file.
    Monitor {
        /// Path to the monitor TOML file.
        #[arg(long, short)]
        config: PathBuf,

        /// Override the monitor name from the config file.
        #[arg(long)]
        name: Option<String>,
    },

    /// One-shot HA status check; exits once every probe is live or one fails.
    StatusCheck(status_check::StatusCheckArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Monitor { config, name } => run_monitor(&config, name).await,
        Command::StatusCheck(args) => status_check::run(args).await,
    };

    let code = match result {
        Ok(code) => code,
        Err(e) => {
            error!("svcmond failed: {e:#}");
            exit::ERROR
        }
    };
    std::process::exit(code);
}

async fn run_monitor(path: &Path, name: Option<String>) -> anyhow::Result<i32> {
    let config = MonitorConfig::from_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    let name = name.unwrap_or_else(|| config.monitor.name.clone());
    info!(
        monitor = %name,
        config = %path.display(),
        description = config.monitor.description.as_deref().unwrap_or(""),
        "monitor configuration loaded"
    );

    let timing = config.loop_config()?;
    let probes = assemble::probes(&config, &timing)?;
    if probes.is_empty() {
        anyhow::bail!("{} defines no probes", path.display());
    }
    let dependencies = assemble::dependencies(&config, &timing)?;
    let reporter = assemble::reporter(&config.reporter);

    let verdict = drive(name, reporter, probes, dependencies, timing).await?;
    Ok(verdict.exit_code())
}

/// Initialise, start and run a reporting loop until it reaches a verdict.
async fn drive(
    name: String,
    handler: Box<dyn ProbeReportHandler>,
    probes: Vec<Arc<dyn Probe>>,
    dependencies: Vec<Arc<dyn Probe>>,
    config: LoopConfig,
) -> anyhow::Result<LoopExit> {
    let mut reporting = ReportingLoop::new(name, handler, probes, dependencies, config)?;
    reporting.init_probes().await?;
    if !reporting.start_reporting() {
        return Err(MonitorError::ReporterRefused(reporting.name().to_string()).into());
    }

    let mut shutdown = shutdown_channel();
    let verdict = reporting.run(shutdown.clone()).await?;

    if verdict.is_failure() {
        error!(monitor = %reporting.name(), %verdict, "monitoring failed");
        if reporting.ha_integrated() {
            // The HA controller reacts to the reported failure; stay up until
            // it stops us.
            info!("waiting for the HA controller to stop this process");
            let _ = shutdown.wait_for(|stop| *stop).await;
        }
    } else {
        info!(monitor = %reporting.name(), %verdict, "monitoring finished");
    }
    reporting.close();

    let abandoned = reporting.watchdog().abandoned();
    if abandoned > 0 {
        warn!(abandoned, "exiting with probe calls still in flight");
    }
    Ok(verdict)
}

/// A channel that flips to `true` on SIGINT or SIGTERM.
fn shutdown_channel() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = tx.send(true);
    });
    rx
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
