//! The probe contract.
//!
//! A probe is a small unit of health logic. The reporting loop owns a set of
//! them behind `Arc<dyn Probe>` and drives them from a single scheduling
//! task; the only concurrency is the watchdog that runs each `ping` on its
//! own task so that a hung call cannot stall the schedule.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{ProbeAbort, ProbeError};
use crate::types::ProbeStatus;

/// A health check producing one [`ProbeStatus`] per invocation.
///
/// `ping` must always come back with a status: connectivity errors, bad
/// responses and missing files are all captured as failed statuses. The
/// `Err` arm is reserved for an explicit request to abort the run.
///
/// The loop never pings the same probe from two places at once, but a ping
/// abandoned by the watchdog may still be running when the next one starts,
/// so implementations take `&self` and keep any mutable state internal.
#[async_trait]
pub trait Probe: Send + Sync + fmt::Debug {
    /// Display name, usually derived from the probe's target.
    fn name(&self) -> &str;

    /// Resolve configuration into a connectable target.
    async fn init(&self) -> Result<(), ProbeError> {
        Ok(())
    }

    /// Perform one check. `live_ping` is true once the loop is in the live
    /// phase.
    async fn ping(&self, live_ping: bool) -> Result<ProbeStatus, ProbeAbort>;

    /// The boot flag backing the default bootstrap methods.
    fn boot_flag(&self) -> &BootFlag;

    fn begin_bootstrap(&self) {
        self.boot_flag().clear();
    }

    fn end_bootstrap(&self) {
        self.boot_flag().set();
    }

    fn is_booted(&self) -> bool {
        self.boot_flag().is_set()
    }

    /// Whether dropping an in-flight `ping` future actually stops the work.
    ///
    /// Probes that park on a blocking thread return `false`; the watchdog
    /// then detaches timed-out calls instead of aborting them.
    fn cancellable(&self) -> bool {
        true
    }

    /// The safe-mode capability, for probes that gate on a store leaving
    /// its initialization mode.
    fn safe_mode(&self) -> Option<&dyn SafeModeCheck> {
        None
    }
}

/// Optional capability: the probed service can report "safe mode".
pub trait SafeModeCheck: Send + Sync {
    fn is_in_safe_mode(&self) -> bool;
}

/// The "booted" flag every probe carries.
#[derive(Debug, Default)]
pub struct BootFlag(AtomicBool);

impl BootFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
