use std::time::Duration;

use async_trait::async_trait;
use http::Uri;
use svcmon_core::{BootFlag, Probe, ProbeAbort, ProbeError, ProbeStatus};

use super::{fetch, parse_http_uri, resolve};

/// Inclusive range of HTTP status codes that count as healthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRange {
    pub min: u16,
    pub max: u16,
}

impl StatusRange {
    pub fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, code: u16) -> bool {
        (self.min..=self.max).contains(&code)
    }
}

impl Default for StatusRange {
    fn default() -> Self {
        Self::new(200, 200)
    }
}

/// GETs a URL; succeeds when the response code lies in the accepted range.
#[derive(Debug)]
pub struct HttpProbe {
    name: String,
    uri: Uri,
    accept: StatusRange,
    timeout: Duration,
    boot: BootFlag,
}

impl HttpProbe {
    pub fn new(url: &str, accept: StatusRange, timeout: Duration) -> Result<Self, ProbeError> {
        let uri = parse_http_uri(url)?;
        if accept.min > accept.max {
            return Err(ProbeError::Config(format!(
                "{url}: status range {}..={} is empty",
                accept.min, accept.max
            )));
        }
        Ok(Self {
            name: format!("http {uri}"),
            uri,
            accept,
            timeout,
            boot: BootFlag::new(),
        })
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }
}

#[async_trait]
impl Probe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn init(&self) -> Result<(), ProbeError> {
        resolve(&self.uri).await
    }

    async fn ping(&self, _live_ping: bool) -> Result<ProbeStatus, ProbeAbort> {
        let status = match fetch(&self.uri, self.timeout).await {
            Err(e) => ProbeStatus::from_error(&self.name, "request failed", &e),
            Ok(reply) if self.accept.contains(reply.status.as_u16()) => {
                ProbeStatus::success(&self.name, format!("status {}", reply.status))
            }
            Ok(reply) => ProbeStatus::failure(
                &self.name,
                format!(
                    "status {} outside {}..={}",
                    reply.status, self.accept.min, self.accept.max
                ),
            ),
        };
        Ok(status)
    }

    fn boot_flag(&self) -> &BootFlag {
        &self.boot
    }
}
