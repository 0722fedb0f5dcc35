//! `status-check`: a one-shot HA check assembled from command-line flags.
//!
//! Probes run every second. The check exits 0 as soon as every probe is
//! live, -2 on the first probe failure and -1 on a timeout.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use svcmon_core::{LoopConfig, Probe, SafeModePolicy, exit};
use svcmon_health::LoopExit;
use svcmon_health::probes::{HttpProbe, ListDirProbe, PidProbe, SafeModeProbe, StatusRange};
use svcmon_report::StatusCheckReporter;
use tracing::{info, warn};

const NAME: &str = "HAStatusCheck";
const INTERVAL_MS: u64 = 1_000;
const DEFAULT_TIMEOUT_MS: u64 = 60_000;

#[derive(Debug, Args)]
pub struct StatusCheckArgs {
    /// Pid file of the process to check; "null" means none.
    #[arg(long, short = 'i')]
    pid: Option<String>,

    /// Directory that must be listable; "null" means none.
    #[arg(long, short = 'f', alias = "file")]
    path: Option<String>,

    /// URL that must answer 200; "null" means none.
    #[arg(long, short = 'r')]
    url: Option<String>,

    /// Probe timeout in milliseconds.
    #[arg(long, short = 't', default_value_t = DEFAULT_TIMEOUT_MS)]
    timeout: u64,

    /// Bootstrap timeout in milliseconds; 0 or less waits forever.
    #[arg(long, short = 'b', default_value_t = -1, allow_negative_numbers = true)]
    boot_timeout: i64,

    /// JMX URL of a filesystem master that must leave safe mode before
    /// probing starts.
    #[arg(long, short = 'w')]
    wait_safe_mode: Option<String>,
}

/// Everything needed to run the check.
#[derive(Debug)]
struct Plan {
    probes: Vec<Arc<dyn Probe>>,
    dependencies: Vec<Arc<dyn Probe>>,
    config: LoopConfig,
}

/// `None`, empty and `"null"` all mean "not supplied".
fn is_null_param(param: Option<&str>) -> bool {
    matches!(param, None | Some("") | Some("null"))
}

/// The parameter, unless it is null.
fn supplied(param: Option<&str>) -> Option<&str> {
    if is_null_param(param) { None } else { param }
}

/// Build the probes; `Ok(None)` when every probe argument is null.
fn plan(args: &StatusCheckArgs) -> anyhow::Result<Option<Plan>> {
    if args.pid.is_none() && args.path.is_none() && args.url.is_none() {
        anyhow::bail!("no --pid, --url or --path supplied");
    }

    let timeout = Duration::from_millis(args.timeout);
    let mut probes: Vec<Arc<dyn Probe>> = Vec::new();
    if let Some(pid) = supplied(args.pid.as_deref()) {
        probes.push(Arc::new(PidProbe::new(pid)));
    }
    if let Some(path) = supplied(args.path.as_deref()) {
        probes.push(Arc::new(ListDirProbe::new(path)));
    }
    if let Some(url) = supplied(args.url.as_deref()) {
        probes.push(Arc::new(HttpProbe::new(url, StatusRange::default(), timeout)?));
    }
    if probes.is_empty() {
        return Ok(None);
    }

    let mut dependencies: Vec<Arc<dyn Probe>> = Vec::new();
    if let Some(url) = supplied(args.wait_safe_mode.as_deref()) {
        dependencies.push(Arc::new(SafeModeProbe::new(url, timeout)?));
    }

    let boot_timeout = if args.boot_timeout > 0 { args.boot_timeout } else { -1 };
    let config = LoopConfig::from_millis(INTERVAL_MS, INTERVAL_MS, args.timeout, boot_timeout)
        .with_safe_mode_policy(SafeModePolicy::IgnoreReentry);

    Ok(Some(Plan {
        probes,
        dependencies,
        config,
    }))
}

pub async fn run(args: StatusCheckArgs) -> anyhow::Result<i32> {
    let Some(plan) = plan(&args)? else {
        warn!(?args, "all probe arguments are null");
        info!("no active probes");
        return Ok(exit::SUCCESS);
    };
    let verdict = crate::drive(
        NAME.to_string(),
        Box::new(StatusCheckReporter),
        plan.probes,
        plan.dependencies,
        plan.config,
    )
    .await?;
    Ok(exit_code(&verdict))
}

/// Like [`LoopExit::exit_code`], except that timeouts exit with the error
/// code.
fn exit_code(verdict: &LoopExit) -> i32 {
    match verdict {
        LoopExit::ProbeTimedOut { .. } | LoopExit::BootstrapTimedOut { .. } => exit::ERROR,
        other => other.exit_code(),
    }
}
