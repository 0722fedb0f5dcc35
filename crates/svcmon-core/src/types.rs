//! Probe phases and the per-invocation status record.

use std::fmt;

use serde::Serialize;

use crate::time::epoch_millis;

/// Where the reporting loop currently is in its lifecycle.
///
/// Phases are ordered: a loop only ever moves forward through them.
/// Failure is not a phase; it is an event delivered to the report handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbePhase {
    /// Waiting for every dependency probe to be satisfied in one pass.
    DependencyWait,
    /// Waiting for every primary probe to succeed in one pass.
    Bootstrap,
    /// Steady-state polling; failures here are actionable.
    Live,
}

impl ProbePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbePhase::DependencyWait => "DEPENDENCY_WAIT",
            ProbePhase::Bootstrap => "BOOTSTRAP",
            ProbePhase::Live => "LIVE",
        }
    }
}

impl fmt::Display for ProbePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single probe invocation.
///
/// A status is finalized at construction; there are no setters. The only
/// derivation is [`ProbeStatus::in_phase`], which the reporting loop uses to
/// stamp the phase that was active when the probe ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeStatus {
    probe: String,
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    thrown: Option<String>,
    /// Wall-clock time of the outcome, milliseconds since the Unix epoch.
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<ProbePhase>,
}

impl ProbeStatus {
    /// Build a finished status.
    pub fn finish(
        probe: impl Into<String>,
        success: bool,
        message: impl Into<String>,
        thrown: Option<String>,
    ) -> Self {
        Self {
            probe: probe.into(),
            success,
            message: message.into(),
            thrown,
            timestamp: epoch_millis(),
            phase: None,
        }
    }

    pub fn success(probe: impl Into<String>, message: impl Into<String>) -> Self {
        Self::finish(probe, true, message, None)
    }

    pub fn failure(probe: impl Into<String>, message: impl Into<String>) -> Self {
        Self::finish(probe, false, message, None)
    }

    /// A failed status caused by `error`; the full source chain is kept.
    pub fn from_error(
        probe: impl Into<String>,
        message: impl Into<String>,
        error: &(dyn std::error::Error + 'static),
    ) -> Self {
        Self::finish(probe, false, message, Some(error_chain(error)))
    }

    /// The same status, stamped with the phase in which it was produced.
    pub fn in_phase(self, phase: ProbePhase) -> Self {
        Self {
            phase: Some(phase),
            ..self
        }
    }

    pub fn probe(&self) -> &str {
        &self.probe
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn thrown(&self) -> Option<&str> {
        self.thrown.as_deref()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn phase(&self) -> Option<ProbePhase> {
        self.phase
    }

    /// Milliseconds between this status and `now` (zero if `now` is earlier).
    pub fn age_at(&self, now: u64) -> u64 {
        now.saturating_sub(self.timestamp)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {}",
            self.probe,
            if self.success { "succeeded" } else { "failed" },
            self.message
        )?;
        if let Some(phase) = self.phase {
            write!(f, " [{phase}]")?;
        }
        if let Some(thrown) = &self.thrown {
            write!(f, " ({thrown})")?;
        }
        Ok(())
    }
}

fn error_chain(error: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
