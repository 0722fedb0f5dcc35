//! svcmon-health: the probe scheduling engine.
//!
//! Runs a set of independent health probes through a fixed lifecycle and
//! relays every transition to a pluggable report handler.
//!
//! # Architecture
//!
//! ```text
//! ReportingLoop
//!   ├── DEPENDENCY_WAIT   ping dependency probes until all are satisfied
//!   ├── BOOTSTRAP         ping primary probes until one pass is all-success
//!   │                     (bounded by the bootstrap timeout)
//!   ├── LIVE              ping forever, forward results / failures,
//!   │                     rate-limited heartbeat
//!   ├── Watchdog          one task per ping, raced against probe_timeout
//!   └── ProbeReportHandler  the only outlet for observable effects
//! ```
//!
//! # Timeouts
//!
//! A ping that outlives `probe_timeout` is reported through
//! `probe_timed_out` and the schedule moves on. Cancellable probes have their
//! task aborted; probes stuck on a blocking thread are detached and keep
//! running until the underlying call returns. Under sustained hangs these
//! detached calls accumulate; [`Watchdog::abandoned`] reports how many are
//! still in flight.

pub mod error;
pub mod handler;
pub mod probes;
pub mod reporting;
pub mod watchdog;

pub use error::MonitorError;
pub use handler::{Flow, ProbeReportHandler, timeout_message};
pub use reporting::{LoopExit, ReportingLoop};
pub use watchdog::{PingOutcome, Watchdog};
