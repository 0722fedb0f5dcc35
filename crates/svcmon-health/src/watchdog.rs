//! Per-ping timeout enforcement.
//!
//! Each ping runs on its own task and is raced against the probe timeout.
//! When the timer wins, the call is aborted if the probe is cancellable.
//! Otherwise it is detached: the task keeps running until the blocking call
//! underneath it returns, and the abandoned count stays raised until then.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use svcmon_core::{Probe, ProbeAbort, ProbeStatus};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Outcome of one watched ping.
#[derive(Debug)]
pub enum PingOutcome {
    /// The probe answered within the timeout.
    Completed(ProbeStatus),
    /// The timer fired first.
    TimedOut,
    /// The probe asked for the run to be aborted.
    Aborted(ProbeAbort),
}

#[derive(Debug, Clone)]
pub struct Watchdog {
    timeout: Duration,
    abandoned: Arc<AtomicUsize>,
}

impl Watchdog {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Detached pings that have timed out and are still running.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    /// Ping `probe` on a fresh task, bounded by the timeout.
    pub async fn ping(&self, probe: &Arc<dyn Probe>, live_ping: bool) -> PingOutcome {
        let worker = Arc::clone(probe);
        let mut call = tokio::spawn(async move { worker.ping(live_ping).await });

        match tokio::time::timeout(self.timeout, &mut call).await {
            Ok(Ok(Ok(status))) => PingOutcome::Completed(status),
            Ok(Ok(Err(abort))) => PingOutcome::Aborted(abort),
            Ok(Err(e)) => {
                // The probe task panicked or was cancelled underneath us.
                warn!(probe = %probe.name(), error = %e, "probe task did not complete");
                PingOutcome::Completed(ProbeStatus::from_error(
                    probe.name(),
                    "probe call did not complete",
                    &e,
                ))
            }
            Err(_) => {
                self.abandon(probe, call);
                PingOutcome::TimedOut
            }
        }
    }

    fn abandon(&self, probe: &Arc<dyn Probe>, call: JoinHandle<Result<ProbeStatus, ProbeAbort>>) {
        if probe.cancellable() {
            call.abort();
            debug!(probe = %probe.name(), "timed-out probe call cancelled");
            return;
        }

        let in_flight = self.abandoned.fetch_add(1, Ordering::SeqCst) + 1;
        warn!(
            probe = %probe.name(),
            in_flight,
            "probe call cannot be cancelled; leaving it running"
        );

        let abandoned = Arc::clone(&self.abandoned);
        let name = probe.name().to_string();
        tokio::spawn(async move {
            let _ = call.await;
            let remaining = abandoned.fetch_sub(1, Ordering::SeqCst) - 1;
            debug!(probe = %name, remaining, "abandoned probe call finished");
        });
    }
}
