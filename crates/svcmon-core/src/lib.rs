//! svcmon-core: shared vocabulary of the service monitor.
//!
//! Everything the scheduling engine, the probes and the reporters agree on
//! lives here: the [`ProbePhase`] lifecycle, the immutable [`ProbeStatus`]
//! record, the [`Probe`] contract and the TOML [`MonitorConfig`].

pub mod config;
pub mod error;
pub mod exit;
pub mod probe;
pub mod time;
pub mod types;

pub use config::{LoopConfig, MonitorConfig, SafeModePolicy};
pub use error::{ConfigError, ProbeAbort, ProbeError, ProbeFailed};
pub use probe::{BootFlag, Probe, SafeModeCheck};
pub use types::{ProbePhase, ProbeStatus};
