//! One-shot status check: the loop ends on the first verdict.

use std::ops::ControlFlow;

use svcmon_core::{Probe, ProbeFailed, ProbePhase, ProbeStatus};
use svcmon_health::{Flow, ProbeReportHandler};
use tracing::{error, info, warn};

/// Stops the loop with success once every probe is live, and with failure
/// on the first probe failure or timeout.
#[derive(Debug, Default)]
pub struct StatusCheckReporter;

impl ProbeReportHandler for StatusCheckReporter {
    fn probe_failure(&mut self, failure: &ProbeFailed) -> Flow {
        warn!(%failure, "status check failed");
        ControlFlow::Break(())
    }

    fn probe_timed_out(
        &mut self,
        phase: ProbePhase,
        probe: &dyn Probe,
        _last_status: Option<&ProbeStatus>,
        _now: u64,
    ) -> Flow {
        error!(probe = %probe.name(), %phase, "timeout of probe");
        ControlFlow::Break(())
    }

    fn live_probe_cycle_completed(&mut self) -> Flow {
        info!("probes are all live");
        ControlFlow::Break(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use svcmon_core::{BootFlag, ProbeAbort};

    use super::*;

    #[derive(Debug, Default)]
    struct Stub {
        boot: BootFlag,
    }

    #[async_trait]
    impl Probe for Stub {
        fn name(&self) -> &str {
            "stub"
        }

        async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
            Ok(ProbeStatus::success(self.name(), "ok"))
        }

        fn boot_flag(&self) -> &BootFlag {
            &self.boot
        }
    }

    #[test]
    fn every_verdict_stops_the_loop() {
        let mut check = StatusCheckReporter;
        let failed = ProbeFailed::new(ProbeStatus::failure("pid", "not running"));

        assert!(check.start("HAStatusCheck", ""));
        assert!(check.live_probe_cycle_completed().is_break());
        assert!(check.probe_failure(&failed).is_break());
        assert!(
            check
                .probe_timed_out(ProbePhase::Live, &Stub::default(), None, 0)
                .is_break()
        );
        assert!(!check.is_integrated_with_ha_monitoring_system());
    }
}
