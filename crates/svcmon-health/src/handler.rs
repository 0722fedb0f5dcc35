//! The report handler contract.
//!
//! The reporting loop is the sole caller of a handler, always from its own
//! scheduling task and never concurrently. A handler that also exposes data
//! to another thread (a status server, say) synchronizes that internally.

use std::ops::ControlFlow;

use svcmon_core::time::human_millis;
use svcmon_core::{Probe, ProbeFailed, ProbePhase, ProbeStatus};

/// A handler's verdict: keep scheduling, or stop the loop.
pub type Flow = ControlFlow<()>;

/// Observer of a reporting loop; decides what the outside world sees.
///
/// Every method has a default so that a handler only spells out what it
/// cares about. The defaults keep monitoring going, except
/// [`probe_failure`](ProbeReportHandler::probe_failure), which stops the
/// loop so that the process exits and external failover can take over.
pub trait ProbeReportHandler: Send {
    /// Called once, before any phase begins. `false` aborts startup.
    fn start(&mut self, _name: &str, _description: &str) -> bool {
        true
    }

    /// Clean shutdown.
    fn unregister(&mut self) {}

    /// Whether an external HA controller observes failures reported here.
    fn is_integrated_with_ha_monitoring_system(&self) -> bool {
        false
    }

    /// Called on every phase transition.
    fn probe_process_state_change(&mut self, _phase: ProbePhase) {}

    /// Called once per primary probe at the end of bootstrap.
    fn probe_booted(&mut self, _status: &ProbeStatus) {}

    /// Called with every live ping result.
    fn probe_result(&mut self, _phase: ProbePhase, _status: &ProbeStatus) {}

    /// Rate-limited to the report interval; carries the latest status.
    fn heartbeat(&mut self, _status: &ProbeStatus) {}

    /// A live ping reported failure.
    fn probe_failure(&mut self, _failure: &ProbeFailed) -> Flow {
        ControlFlow::Break(())
    }

    /// A live ping outlived the probe timeout, or dependency wait or
    /// bootstrap outlived the bootstrap limit.
    ///
    /// Called for every live ping that times out. Before live it is called
    /// at most once, when the bootstrap limit is hit; a hung ping there only
    /// fails the pass. `last_status` is the most recent status recorded for
    /// `probe`, if any. The return value is ignored for the bootstrap limit,
    /// which is always fatal.
    fn probe_timed_out(
        &mut self,
        _phase: ProbePhase,
        _probe: &dyn Probe,
        _last_status: Option<&ProbeStatus>,
        _now: u64,
    ) -> Flow {
        ControlFlow::Continue(())
    }

    /// A live pass finished with every probe successful, and so did the
    /// pass before it.
    fn live_probe_cycle_completed(&mut self) -> Flow {
        ControlFlow::Continue(())
    }
}

/// Describe a timeout, including how long ago the probe was last heard from.
pub fn timeout_message(probe: &dyn Probe, last_status: Option<&ProbeStatus>, now: u64) -> String {
    match last_status {
        Some(last) => format!(
            "probe {} timed out; last event seen {} ago: {}",
            probe.name(),
            human_millis(last.age_at(now) as i64),
            last
        ),
        None => format!("probe {} timed out; no event ever seen", probe.name()),
    }
}
