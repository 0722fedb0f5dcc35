//! Error types shared by probes, the reporting loop and the config loader.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::ProbeStatus;

/// Errors a probe raises from `init()`: its target cannot be resolved.
///
/// These are configuration errors. They are fatal and surface before the
/// reporting loop starts; the loop never retries them.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("cannot resolve {target}: {reason}")]
    Resolve { target: String, reason: String },

    #[error("i/o error on {target}")]
    Io {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid probe configuration: {0}")]
    Config(String),
}

/// A live probe reported failure.
///
/// Carries the triggering status to the report handler.
#[derive(Debug, Clone, Error)]
#[error("probe failure: {status}")]
pub struct ProbeFailed {
    status: ProbeStatus,
}

impl ProbeFailed {
    pub fn new(status: ProbeStatus) -> Self {
        Self { status }
    }

    pub fn status(&self) -> &ProbeStatus {
        &self.status
    }

    pub fn into_status(self) -> ProbeStatus {
        self.status
    }
}

/// Explicit request from a probe to abort the whole run.
///
/// This is the only thing a probe's `ping` may return besides a status.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("run aborted by {probe}: {reason}")]
pub struct ProbeAbort {
    pub probe: String,
    pub reason: String,
}

impl ProbeAbort {
    pub fn new(probe: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            probe: probe.into(),
            reason: reason.into(),
        }
    }
}

/// Errors loading or validating monitor configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid duration for {key}: {value:?}")]
    Duration { key: &'static str, value: String },

    #[error("invalid config: {0}")]
    Invalid(String),
}
