//! The reporting loop: phase state machine and probe scheduler.
//!
//! A single task drives every probe call and every handler callback. Within
//! a pass, probes run in the order they were supplied, one at a time; each
//! ping is bounded by the [`Watchdog`].

use std::fmt;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use svcmon_core::time::epoch_millis;
use svcmon_core::{
    LoopConfig, Probe, ProbeAbort, ProbeFailed, ProbePhase, ProbeStatus, SafeModePolicy, exit,
};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::MonitorError;
use crate::handler::ProbeReportHandler;
use crate::watchdog::{PingOutcome, Watchdog};

/// Why a reporting loop stopped scheduling.
#[derive(Debug, Clone)]
pub enum LoopExit {
    /// The handler stopped the loop after a fully successful live pass.
    CycleCompleted,
    /// The handler stopped the loop on a live probe failure.
    ProbeFailed(ProbeFailed),
    /// The handler stopped the loop on a ping timeout.
    ProbeTimedOut {
        phase: ProbePhase,
        probe: String,
        last: Option<ProbeStatus>,
    },
    /// Dependency wait or bootstrap outlived the bootstrap timeout.
    BootstrapTimedOut {
        phase: ProbePhase,
        probe: String,
        elapsed: Duration,
        last: Option<ProbeStatus>,
    },
    /// Shutdown was requested.
    Shutdown,
    /// A probe aborted the run.
    Aborted(ProbeAbort),
}

impl LoopExit {
    pub fn exit_code(&self) -> i32 {
        match self {
            LoopExit::CycleCompleted | LoopExit::Shutdown => exit::SUCCESS,
            LoopExit::ProbeFailed(_)
            | LoopExit::ProbeTimedOut { .. }
            | LoopExit::BootstrapTimedOut { .. } => exit::MONITORING_FAILURE,
            LoopExit::Aborted(_) => exit::ERROR,
        }
    }

    pub fn is_failure(&self) -> bool {
        self.exit_code() != exit::SUCCESS
    }
}

impl fmt::Display for LoopExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopExit::CycleCompleted => f.write_str("all probes live"),
            LoopExit::ProbeFailed(failure) => write!(f, "{failure}"),
            LoopExit::ProbeTimedOut { phase, probe, .. } => {
                write!(f, "timeout of probe {probe} in phase {phase}")
            }
            LoopExit::BootstrapTimedOut {
                phase,
                probe,
                elapsed,
                ..
            } => write!(
                f,
                "{phase} did not complete after {}ms; waiting on {probe}",
                elapsed.as_millis()
            ),
            LoopExit::Shutdown => f.write_str("shutdown requested"),
            LoopExit::Aborted(abort) => write!(f, "{abort}"),
        }
    }
}

type Step = ControlFlow<LoopExit>;

/// Which probe list a slot indexes.
#[derive(Debug, Clone, Copy)]
enum Slot {
    Dependency(usize),
    Primary(usize),
}

/// Drives one monitored service through dependency wait, bootstrap and live
/// polling, reporting every transition to its handler.
pub struct ReportingLoop {
    name: String,
    handler: Box<dyn ProbeReportHandler>,
    probes: Vec<Arc<dyn Probe>>,
    dependencies: Vec<Arc<dyn Probe>>,
    config: LoopConfig,
    watchdog: Watchdog,
    phase: ProbePhase,
    phase_entered: Instant,
    /// Last status recorded per primary probe.
    probe_status: Vec<Option<ProbeStatus>>,
    /// Last status recorded per dependency probe.
    dependency_status: Vec<Option<ProbeStatus>>,
    /// Dependencies seen out of safe mode at least once.
    safe_mode_exited: Vec<bool>,
    /// Most recent status of any live probe, for heartbeats.
    latest: Option<ProbeStatus>,
    last_heartbeat: Option<Instant>,
    /// Whether the previous live pass had no failure or timeout.
    previous_pass_clean: bool,
    started: bool,
    closed: bool,
}

impl ReportingLoop {
    pub fn new(
        name: impl Into<String>,
        handler: Box<dyn ProbeReportHandler>,
        probes: Vec<Arc<dyn Probe>>,
        dependencies: Vec<Arc<dyn Probe>>,
        config: LoopConfig,
    ) -> Result<Self, MonitorError> {
        config.validate()?;
        let phase = if dependencies.is_empty() {
            ProbePhase::Bootstrap
        } else {
            ProbePhase::DependencyWait
        };
        Ok(Self {
            name: name.into(),
            handler,
            probe_status: vec![None; probes.len()],
            dependency_status: vec![None; dependencies.len()],
            safe_mode_exited: vec![false; dependencies.len()],
            probes,
            dependencies,
            watchdog: Watchdog::new(config.probe_timeout),
            config,
            phase,
            phase_entered: Instant::now(),
            latest: None,
            last_heartbeat: None,
            previous_pass_clean: true,
            started: false,
            closed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn phase(&self) -> ProbePhase {
        self.phase
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn watchdog(&self) -> &Watchdog {
        &self.watchdog
    }

    /// Whether the handler reports into an external HA controller.
    pub fn ha_integrated(&self) -> bool {
        self.handler.is_integrated_with_ha_monitoring_system()
    }

    /// Resolve every probe's target. A failure here is a configuration
    /// error and is never retried.
    pub async fn init_probes(&self) -> Result<(), MonitorError> {
        for probe in self.dependencies.iter().chain(&self.probes) {
            probe.init().await.map_err(|source| MonitorError::ProbeInit {
                probe: probe.name().to_string(),
                source,
            })?;
            debug!(probe = %probe.name(), "probe initialised");
        }
        Ok(())
    }

    /// Hand the loop to the handler. `false` means the handler refused and
    /// [`run`](Self::run) will not schedule anything.
    pub fn start_reporting(&mut self) -> bool {
        let description = self.describe();
        self.started = self.handler.start(&self.name, &description);
        if self.started {
            info!(monitor = %self.name, %description, "reporting started");
        } else {
            warn!(monitor = %self.name, "handler refused to start reporting");
        }
        self.started
    }

    /// Schedule probes until the handler, a timeout, a probe abort or the
    /// shutdown channel ends the run.
    pub async fn run(
        &mut self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<LoopExit, MonitorError> {
        if !self.started {
            return Err(MonitorError::NotStarted(self.name.clone()));
        }
        let exit = self.schedule(&mut shutdown).await;
        info!(monitor = %self.name, phase = %self.phase, %exit, "reporting loop finished");
        Ok(exit)
    }

    /// Unregister from the handler. Idempotent.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.handler.unregister();
            info!(monitor = %self.name, "reporting closed");
        }
    }

    fn describe(&self) -> String {
        let names = |probes: &[Arc<dyn Probe>]| {
            probes
                .iter()
                .map(|p| p.name().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        };
        let bootstrap = match self.config.bootstrap_timeout {
            Some(limit) => format!("{}ms", limit.as_millis()),
            None => "unbounded".to_string(),
        };
        format!(
            "probes [{}] dependencies [{}] interval {}ms report {}ms timeout {}ms bootstrap {}",
            names(&self.probes),
            names(&self.dependencies),
            self.config.probe_interval.as_millis(),
            self.config.report_interval.as_millis(),
            self.config.probe_timeout.as_millis(),
            bootstrap
        )
    }

    async fn schedule(&mut self, shutdown: &mut watch::Receiver<bool>) -> LoopExit {
        if let ControlFlow::Break(exit) = self.await_dependencies(shutdown).await {
            return exit;
        }
        if let ControlFlow::Break(exit) = self.bootstrap(shutdown).await {
            return exit;
        }
        self.live(shutdown).await
    }

    fn enter_phase(&mut self, phase: ProbePhase) {
        self.phase = phase;
        self.phase_entered = Instant::now();
        info!(monitor = %self.name, %phase, "entering phase");
        self.handler.probe_process_state_change(phase);
    }

    // ── Dependency wait ────────────────────────────────────────

    async fn await_dependencies(&mut self, shutdown: &mut watch::Receiver<bool>) -> Step {
        if self.dependencies.is_empty() {
            return ControlFlow::Continue(());
        }
        self.enter_phase(ProbePhase::DependencyWait);

        loop {
            let mut blocker = None;
            for index in 0..self.dependencies.len() {
                let satisfied = match self.ping(Slot::Dependency(index), false, shutdown).await? {
                    Some(status) => {
                        let satisfied = self.dependency_satisfied(index, &status);
                        self.dependency_status[index] = Some(status);
                        satisfied
                    }
                    None => false,
                };
                if !satisfied {
                    blocker.get_or_insert(Slot::Dependency(index));
                }
            }

            let Some(blocker) = blocker else {
                info!(monitor = %self.name, "all dependencies satisfied");
                return ControlFlow::Continue(());
            };
            self.check_bootstrap_deadline(blocker)?;
            self.pause(shutdown).await?;
        }
    }

    fn dependency_satisfied(&mut self, index: usize, status: &ProbeStatus) -> bool {
        if !status.is_success() {
            debug!(probe = %status.probe(), message = %status.message(), "dependency not ready");
            return false;
        }
        let Some(check) = self.dependencies[index].safe_mode() else {
            return true;
        };
        if !check.is_in_safe_mode() {
            self.safe_mode_exited[index] = true;
            return true;
        }
        let ignored = self.config.safe_mode_policy == SafeModePolicy::IgnoreReentry
            && self.safe_mode_exited[index];
        debug!(probe = %status.probe(), ignored, "dependency in safe mode");
        ignored
    }

    // ── Bootstrap ──────────────────────────────────────────────

    async fn bootstrap(&mut self, shutdown: &mut watch::Receiver<bool>) -> Step {
        self.enter_phase(ProbePhase::Bootstrap);
        for probe in &self.probes {
            probe.begin_bootstrap();
        }

        loop {
            let mut pass = Vec::with_capacity(self.probes.len());
            let mut blocker = None;
            for index in 0..self.probes.len() {
                match self.ping(Slot::Primary(index), false, shutdown).await? {
                    Some(status) => {
                        if !status.is_success() {
                            debug!(
                                probe = %status.probe(),
                                message = %status.message(),
                                "probe not yet up"
                            );
                            blocker.get_or_insert(Slot::Primary(index));
                        }
                        self.probe_status[index] = Some(status.clone());
                        pass.push(status);
                    }
                    None => {
                        blocker.get_or_insert(Slot::Primary(index));
                    }
                }
            }

            let Some(blocker) = blocker else {
                for probe in &self.probes {
                    probe.end_bootstrap();
                }
                for status in &pass {
                    self.handler.probe_booted(status);
                }
                info!(
                    monitor = %self.name,
                    elapsed_ms = self.phase_entered.elapsed().as_millis() as u64,
                    "bootstrap complete"
                );
                return ControlFlow::Continue(());
            };
            self.check_bootstrap_deadline(blocker)?;
            self.pause(shutdown).await?;
        }
    }

    /// Fire the fatal bootstrap timeout if the current phase has run past
    /// the limit. `blocker` is the first probe still holding the phase up.
    fn check_bootstrap_deadline(&mut self, blocker: Slot) -> Step {
        let Some(limit) = self.config.bootstrap_timeout else {
            return ControlFlow::Continue(());
        };
        let elapsed = self.phase_entered.elapsed();
        if elapsed < limit {
            return ControlFlow::Continue(());
        }

        let (probe, last) = self.slot(blocker);
        error!(
            monitor = %self.name,
            phase = %self.phase,
            probe = %probe.name(),
            elapsed_ms = elapsed.as_millis() as u64,
            "bootstrap timed out"
        );
        // Always fatal; the handler's verdict does not matter here.
        let _ = self
            .handler
            .probe_timed_out(self.phase, probe.as_ref(), last.as_ref(), epoch_millis());
        ControlFlow::Break(LoopExit::BootstrapTimedOut {
            phase: self.phase,
            probe: probe.name().to_string(),
            elapsed,
            last,
        })
    }

    // ── Live ───────────────────────────────────────────────────

    async fn live(&mut self, shutdown: &mut watch::Receiver<bool>) -> LoopExit {
        self.enter_phase(ProbePhase::Live);

        loop {
            let mut pass_clean = true;
            for index in 0..self.probes.len() {
                let status = match self.ping(Slot::Primary(index), true, shutdown).await {
                    ControlFlow::Break(exit) => return exit,
                    ControlFlow::Continue(status) => status,
                };
                match status {
                    None => pass_clean = false,
                    Some(status) => {
                        self.probe_status[index] = Some(status.clone());
                        self.latest = Some(status.clone());
                        self.handler.probe_result(ProbePhase::Live, &status);

                        if !status.is_success() {
                            pass_clean = false;
                            let failure = ProbeFailed::new(status);
                            warn!(monitor = %self.name, %failure, "live probe failed");
                            if self.handler.probe_failure(&failure).is_break() {
                                return LoopExit::ProbeFailed(failure);
                            }
                        }
                    }
                }
                self.heartbeat();
            }

            // A clean pass right after a failing one is a recovery, not a
            // completed cycle.
            let completed = pass_clean && self.previous_pass_clean;
            self.previous_pass_clean = pass_clean;
            if completed && self.handler.live_probe_cycle_completed().is_break() {
                return LoopExit::CycleCompleted;
            }
            if let ControlFlow::Break(exit) = self.pause(shutdown).await {
                return exit;
            }
        }
    }

    fn heartbeat(&mut self) {
        let due = self
            .last_heartbeat
            .is_none_or(|at| at.elapsed() >= self.config.report_interval);
        if !due {
            return;
        }
        if let Some(status) = &self.latest {
            self.handler.heartbeat(status);
            self.last_heartbeat = Some(Instant::now());
        }
    }

    // ── Shared plumbing ────────────────────────────────────────

    fn slot(&self, slot: Slot) -> (Arc<dyn Probe>, Option<ProbeStatus>) {
        match slot {
            Slot::Dependency(i) => (
                Arc::clone(&self.dependencies[i]),
                self.dependency_status[i].clone(),
            ),
            Slot::Primary(i) => (Arc::clone(&self.probes[i]), self.probe_status[i].clone()),
        }
    }

    /// One watched ping. `Continue(None)` means the ping timed out and the
    /// loop keeps going.
    async fn ping(
        &mut self,
        slot: Slot,
        live_ping: bool,
        shutdown: &mut watch::Receiver<bool>,
    ) -> ControlFlow<LoopExit, Option<ProbeStatus>> {
        let (probe, last) = self.slot(slot);
        let outcome = tokio::select! {
            outcome = self.watchdog.ping(&probe, live_ping) => Some(outcome),
            _ = stop_signal(shutdown) => None,
        };
        let Some(outcome) = outcome else {
            return ControlFlow::Break(self.shut_down());
        };

        match outcome {
            PingOutcome::Completed(status) => {
                let status = status.in_phase(self.phase);
                debug!(probe = %probe.name(), success = status.is_success(), "ping");
                ControlFlow::Continue(Some(status))
            }
            PingOutcome::Aborted(abort) => {
                error!(monitor = %self.name, %abort, "probe aborted the run");
                ControlFlow::Break(LoopExit::Aborted(abort))
            }
            PingOutcome::TimedOut => {
                warn!(
                    monitor = %self.name,
                    phase = %self.phase,
                    probe = %probe.name(),
                    timeout_ms = self.watchdog.timeout().as_millis() as u64,
                    "probe timed out"
                );
                // Before live, a hung ping only fails the pass; the bootstrap
                // deadline is the one reported timeout.
                if self.phase != ProbePhase::Live {
                    return ControlFlow::Continue(None);
                }
                let verdict = self.handler.probe_timed_out(
                    self.phase,
                    probe.as_ref(),
                    last.as_ref(),
                    epoch_millis(),
                );
                match verdict {
                    ControlFlow::Break(()) => ControlFlow::Break(LoopExit::ProbeTimedOut {
                        phase: self.phase,
                        probe: probe.name().to_string(),
                        last,
                    }),
                    ControlFlow::Continue(()) => ControlFlow::Continue(None),
                }
            }
        }
    }

    async fn pause(&mut self, shutdown: &mut watch::Receiver<bool>) -> Step {
        let stopped = tokio::select! {
            _ = tokio::time::sleep(self.config.probe_interval) => false,
            _ = stop_signal(shutdown) => true,
        };
        if stopped {
            ControlFlow::Break(self.shut_down())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn shut_down(&mut self) -> LoopExit {
        info!(monitor = %self.name, phase = %self.phase, "shutdown signal received");
        self.close();
        LoopExit::Shutdown
    }
}

/// Resolves once `true` is sent; never resolves if the sender goes away.
async fn stop_signal(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
