use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use svcmon_core::{BootFlag, Probe, ProbeAbort, ProbeError, ProbeStatus};
use tokio::net::TcpStream;
use tracing::debug;

/// Succeeds when a TCP connection to `host:port` can be opened.
#[derive(Debug)]
pub struct PortProbe {
    name: String,
    host: String,
    port: u16,
    connect_timeout: Duration,
    target: OnceLock<SocketAddr>,
    boot: BootFlag,
}

impl PortProbe {
    pub fn new(host: impl Into<String>, port: u16, connect_timeout: Duration) -> Self {
        let host = host.into();
        Self {
            name: format!("port {host}:{port}"),
            host,
            port,
            connect_timeout,
            target: OnceLock::new(),
            boot: BootFlag::new(),
        }
    }

    /// The resolved address, once `init()` has run.
    pub fn target(&self) -> Option<SocketAddr> {
        self.target.get().copied()
    }
}

#[async_trait]
impl Probe for PortProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ProbeError> {
        let unresolved = |reason: String| ProbeError::Resolve {
            target: format!("{}:{}", self.host, self.port),
            reason,
        };
        let addr = tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| unresolved(e.to_string()))?
            .next()
            .ok_or_else(|| unresolved("no addresses".to_string()))?;

        debug!(probe = %self.name, %addr, "port probe resolved");
        let _ = self.target.set(addr);
        Ok(())
    }

    async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        let Some(addr) = self.target() else {
            return Ok(ProbeStatus::failure(&self.name, "target not resolved"));
        };

        let status = match tokio::time::timeout(self.connect_timeout, TcpStream::connect(addr)).await
        {
            Ok(Ok(_stream)) => ProbeStatus::success(&self.name, format!("connected to {addr}")),
            Ok(Err(e)) => {
                ProbeStatus::from_error(&self.name, format!("cannot connect to {addr}"), &e)
            }
            Err(_) => ProbeStatus::failure(
                &self.name,
                format!(
                    "connect to {addr} timed out after {}ms",
                    self.connect_timeout.as_millis()
                ),
            ),
        };
        Ok(status)
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }
}
