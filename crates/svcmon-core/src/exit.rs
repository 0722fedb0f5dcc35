//! Process exit codes used by the monitor binaries.

/// Clean exit: a one-shot check passed, or shutdown was requested.
pub const SUCCESS: i32 = 0;

/// Configuration or startup error.
pub const ERROR: i32 = -1;

/// A probe failed or timed out; the monitored service is considered down.
pub const MONITORING_FAILURE: i32 = -2;
