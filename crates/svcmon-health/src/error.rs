//! Errors raised while setting up or starting a reporting loop.

use svcmon_core::{ConfigError, ProbeError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("probe {probe} failed to initialise")]
    ProbeInit {
        probe: String,
        #[source]
        source: ProbeError,
    },

    #[error("reporter refused to start monitoring {0}")]
    ReporterRefused(String),

    #[error("reporting has not been started for {0}")]
    NotStarted(String),
}
