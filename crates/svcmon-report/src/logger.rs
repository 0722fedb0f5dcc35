//! Reporter that writes every callback to the log.

use std::ops::ControlFlow;

use svcmon_core::{Probe, ProbeFailed, ProbePhase, ProbeStatus};
use svcmon_health::{Flow, ProbeReportHandler, timeout_message};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct LogReporter {
    service: String,
    exit_on_probe_failure: bool,
}

impl LogReporter {
    pub fn new(exit_on_probe_failure: bool) -> Self {
        Self {
            service: String::new(),
            exit_on_probe_failure,
        }
    }

    /// Name given at `start`; empty before that.
    pub fn service(&self) -> &str {
        &self.service
    }
}

impl Default for LogReporter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ProbeReportHandler for LogReporter {
    fn start(&mut self, name: &str, description: &str) -> bool {
        self.service = name.to_string();
        info!(service = %self.service, %description, "started reporting");
        true
    }

    fn unregister(&mut self) {
        info!(service = %self.service, "stopped reporting");
    }

    fn probe_process_state_change(&mut self, phase: ProbePhase) {
        info!(service = %self.service, %phase, "probing process changed phase");
    }

    fn probe_booted(&mut self, status: &ProbeStatus) {
        info!(service = %self.service, %status, "probe booted");
    }

    fn probe_result(&mut self, phase: ProbePhase, status: &ProbeStatus) {
        debug!(service = %self.service, %phase, %status, "probe result");
    }

    fn heartbeat(&mut self, status: &ProbeStatus) {
        info!(service = %self.service, %status, "heartbeat");
    }

    fn probe_failure(&mut self, failure: &ProbeFailed) -> Flow {
        warn!(service = %self.service, %failure, "probe failure");
        if self.exit_on_probe_failure {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    fn probe_timed_out(
        &mut self,
        phase: ProbePhase,
        probe: &dyn Probe,
        last_status: Option<&ProbeStatus>,
        now: u64,
    ) -> Flow {
        let message = timeout_message(probe, last_status, now);
        error!(service = %self.service, %phase, "{message}");
        ControlFlow::Continue(())
    }
}
