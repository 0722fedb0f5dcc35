use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use http::Uri;
use serde_json::Value;
use svcmon_core::{BootFlag, Probe, ProbeAbort, ProbeError, ProbeStatus, SafeModeCheck};
use tracing::debug;

use super::{fetch, parse_http_uri, resolve};

/// Asks a filesystem master, through its JMX JSON servlet, whether it is in
/// safe mode.
///
/// The ping succeeds whenever the master answers; the safe-mode state is
/// exposed through [`SafeModeCheck`] for dependency gating.
#[derive(Debug)]
pub struct SafeModeProbe {
    name: String,
    uri: Uri,
    timeout: Duration,
    in_safe_mode: AtomicBool,
    boot: BootFlag,
}

impl SafeModeProbe {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ProbeError> {
        let uri = parse_http_uri(url)?;
        Ok(Self {
            name: format!("safe mode {uri}"),
            uri,
            timeout,
            in_safe_mode: AtomicBool::new(false),
            boot: BootFlag::new(),
        })
    }
}

/// Read `beans[0].Safemode`; a non-empty string means safe mode is on.
fn parse_safe_mode(body: &[u8]) -> Result<bool, String> {
    let doc: Value = serde_json::from_slice(body).map_err(|e| format!("bad JMX JSON: {e}"))?;
    match doc.pointer("/beans/0/Safemode") {
        Some(Value::String(state)) => Ok(!state.is_empty()),
        Some(other) => Err(format!("unexpected Safemode value {other}")),
        None => Err("no Safemode attribute in JMX response".to_string()),
    }
}

#[async_trait]
impl Probe for SafeModeProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ProbeError> {
        resolve(&self.uri).await
    }

    async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        let reply = match fetch(&self.uri, self.timeout).await {
            Ok(reply) => reply,
            Err(e) => return Ok(ProbeStatus::from_error(&self.name, "master unreachable", &e)),
        };
        if !reply.status.is_success() {
            return Ok(ProbeStatus::failure(
                &self.name,
                format!("JMX query returned {}", reply.status),
            ));
        }

        let status = match parse_safe_mode(&reply.body) {
            Ok(in_safe_mode) => {
                self.in_safe_mode.store(in_safe_mode, Ordering::SeqCst);
                debug!(probe = %self.name, in_safe_mode, "safe mode state read");
                ProbeStatus::success(&self.name, format!("up, safe mode {in_safe_mode}"))
            }
            Err(reason) => ProbeStatus::failure(&self.name, reason),
        };
        Ok(status)
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }

    fn safe_mode(&self) -> Option<&dyn SafeModeCheck> {
        Some(self)
    }
}

impl SafeModeCheck for SafeModeProbe {
    fn is_in_safe_mode(&self) -> bool {
        self.in_safe_mode.load(Ordering::SeqCst)
    }
}
