//! Turns a monitor config into probes and a reporter.

use std::sync::Arc;

use svcmon_core::config::{
    DEFAULT_REST_BIND, DEFAULT_REST_HISTORY, ReporterConfig, ReporterKind, duration_or,
};
use svcmon_core::{LoopConfig, MonitorConfig, Probe};
use svcmon_health::ProbeReportHandler;
use svcmon_health::probes::{
    HttpProbe, ListDirProbe, PidProbe, PortProbe, SafeModeProbe, StatusRange,
};
use svcmon_report::{LogReporter, RestReporter};

/// Primary probes, in the order they are pinged: port, pid, http, list_dir.
///
/// Per-probe network timeouts default to the loop's probe timeout.
pub fn probes(
    config: &MonitorConfig,
    timing: &LoopConfig,
) -> anyhow::Result<Vec<Arc<dyn Probe>>> {
    let section = &config.probes;
    let mut probes: Vec<Arc<dyn Probe>> = Vec::new();

    if let Some(port) = &section.port {
        let connect_timeout = duration_or(
            "probes.port.connect_timeout",
            port.connect_timeout.as_deref(),
            timing.probe_timeout,
        )?;
        let host = port.host.as_deref().unwrap_or("localhost");
        probes.push(Arc::new(PortProbe::new(host, port.port, connect_timeout)));
    }
    if let Some(pid) = &section.pid {
        probes.push(Arc::new(PidProbe::new(&pid.pid_file)));
    }
    if let Some(http) = &section.http {
        let defaults = StatusRange::default();
        let accept = StatusRange::new(
            http.min_status.unwrap_or(defaults.min),
            http.max_status.unwrap_or(defaults.max),
        );
        let timeout = duration_or(
            "probes.http.timeout",
            http.timeout.as_deref(),
            timing.probe_timeout,
        )?;
        probes.push(Arc::new(HttpProbe::new(&http.url, accept, timeout)?));
    }
    if let Some(list_dir) = &section.list_dir {
        probes.push(Arc::new(ListDirProbe::new(&list_dir.path)));
    }
    Ok(probes)
}

/// Dependency probes gating bootstrap.
pub fn dependencies(
    config: &MonitorConfig,
    timing: &LoopConfig,
) -> anyhow::Result<Vec<Arc<dyn Probe>>> {
    let mut dependencies: Vec<Arc<dyn Probe>> = Vec::new();
    if let Some(safe_mode) = &config.dependencies.safe_mode {
        let timeout = duration_or(
            "dependencies.safe_mode.timeout",
            safe_mode.timeout.as_deref(),
            timing.probe_timeout,
        )?;
        dependencies.push(Arc::new(SafeModeProbe::new(&safe_mode.url, timeout)?));
    }
    Ok(dependencies)
}

pub fn reporter(config: &ReporterConfig) -> Box<dyn ProbeReportHandler> {
    let exit_on_probe_failure = config.exit_on_probe_failure.unwrap_or(true);
    match config.kind {
        ReporterKind::Log => Box::new(LogReporter::new(exit_on_probe_failure)),
        ReporterKind::Rest => Box::new(
            RestReporter::new(
                config.bind.as_deref().unwrap_or(DEFAULT_REST_BIND),
                config.history.unwrap_or(DEFAULT_REST_HISTORY),
            )
            .exit_on_probe_failure(exit_on_probe_failure),
        ),
    }
}
