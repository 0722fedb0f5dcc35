//! Concrete probes.
//!
//! Each probe owns one target and turns every way of not reaching it into a
//! failed [`ProbeStatus`](svcmon_core::ProbeStatus). Only `init()` returns
//! an error, when the target cannot be resolved at all.

mod http_probe;
mod list_dir;
mod pid;
mod port;
mod safe_mode;

pub use http_probe::{HttpProbe, StatusRange};
pub use list_dir::ListDirProbe;
pub use pid::PidProbe;
pub use port::PortProbe;
pub use safe_mode::SafeModeProbe;

use std::time::Duration;

use bytes::Bytes;
use http::Uri;
use http_body_util::{BodyExt, Empty};
use svcmon_core::ProbeError;
use thiserror::Error;
use tracing::debug;

/// Why an HTTP fetch produced no response.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("{0} has no host")]
    NoHost(String),

    #[error("cannot connect to {target}")]
    Connect {
        target: String,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP exchange with {target} failed")]
    Http {
        target: String,
        #[source]
        source: hyper::Error,
    },

    #[error("cannot build request for {target}")]
    Request {
        target: String,
        #[source]
        source: http::Error,
    },

    #[error("no response from {target} within {timeout:?}")]
    TimedOut { target: String, timeout: Duration },
}

/// A fully read HTTP response.
#[derive(Debug)]
pub(crate) struct Reply {
    pub status: http::StatusCode,
    pub body: Bytes,
}

/// `host:port` of an `http://` URI, with port 80 filled in.
pub(crate) fn authority(uri: &Uri) -> Result<String, FetchError> {
    let host = uri.host().ok_or_else(|| FetchError::NoHost(uri.to_string()))?;
    Ok(format!("{host}:{}", uri.port_u16().unwrap_or(80)))
}

/// Parse a probe URL; only plain `http://` with a host is accepted.
pub(crate) fn parse_http_uri(url: &str) -> Result<Uri, ProbeError> {
    let uri: Uri = url
        .parse()
        .map_err(|e| ProbeError::Config(format!("invalid URL {url:?}: {e}")))?;
    if uri.scheme_str() != Some("http") {
        return Err(ProbeError::Config(format!("{url}: only http:// URLs are supported")));
    }
    authority(&uri).map_err(|e| ProbeError::Config(e.to_string()))?;
    Ok(uri)
}

/// Check that the host of `uri` resolves to at least one address.
pub(crate) async fn resolve(uri: &Uri) -> Result<(), ProbeError> {
    let target = authority(uri).map_err(|e| ProbeError::Config(e.to_string()))?;
    let mut addrs = tokio::net::lookup_host(target.clone())
        .await
        .map_err(|e| ProbeError::Resolve {
            target: target.clone(),
            reason: e.to_string(),
        })?;
    if addrs.next().is_none() {
        return Err(ProbeError::Resolve {
            target,
            reason: "no addresses".to_string(),
        });
    }
    Ok(())
}

/// GET `uri` over a fresh HTTP/1 connection, bounded by `timeout`.
pub(crate) async fn fetch(uri: &Uri, timeout: Duration) -> Result<Reply, FetchError> {
    let target = authority(uri)?;
    match tokio::time::timeout(timeout, exchange(uri, &target)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::TimedOut { target, timeout }),
    }
}

async fn exchange(uri: &Uri, target: &str) -> Result<Reply, FetchError> {
    let stream = tokio::net::TcpStream::connect(target)
        .await
        .map_err(|source| FetchError::Connect {
            target: target.to_string(),
            source,
        })?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|source| FetchError::Http {
            target: target.to_string(),
            source,
        })?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "probe connection closed with error");
        }
    });

    let path = uri.path_and_query().map_or("/", |p| p.as_str());
    let req = http::Request::builder()
        .method("GET")
        .uri(path)
        .header("host", target)
        .header("user-agent", "svcmon/0.1")
        .body(Empty::<Bytes>::new())
        .map_err(|source| FetchError::Request {
            target: target.to_string(),
            source,
        })?;

    let response = sender.send_request(req).await.map_err(|source| FetchError::Http {
        target: target.to_string(),
        source,
    })?;
    let status = response.status();
    let body = response
        .into_body()
        .collect()
        .await
        .map_err(|source| FetchError::Http {
            target: target.to_string(),
            source,
        })?
        .to_bytes();

    Ok(Reply { status, body })
}
