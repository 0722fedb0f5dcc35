//! REST status reporter.
//!
//! Keeps the most recent live result and a bounded history on a shared
//! [`StatusBoard`], and serves it over HTTP while reporting is active.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/status` | Latest result; 500 with `{"live": false}` before the first one |
//! | GET | `/events` | Recent results, oldest first |

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use svcmon_core::config::{DEFAULT_REST_BIND, DEFAULT_REST_HISTORY};
use svcmon_core::{ProbeFailed, ProbePhase, ProbeStatus};
use svcmon_health::{Flow, ProbeReportHandler};
use tokio::sync::oneshot;
use tracing::{error, info};

// ── Status board ───────────────────────────────────────────────

/// Latest status plus a bounded history, shared with the HTTP handlers.
#[derive(Debug, Clone)]
pub struct StatusBoard {
    inner: Arc<Mutex<Board>>,
}

#[derive(Debug)]
struct Board {
    last: Option<ProbeStatus>,
    events: VecDeque<ProbeStatus>,
    capacity: usize,
}

impl StatusBoard {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Board {
                last: None,
                events: VecDeque::with_capacity(capacity),
                capacity,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Board> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record `status` as the latest event, dropping the oldest past capacity.
    pub fn record(&self, status: ProbeStatus) {
        let mut board = self.lock();
        if board.capacity > 0 {
            if board.events.len() == board.capacity {
                board.events.pop_front();
            }
            board.events.push_back(status.clone());
        }
        board.last = Some(status);
    }

    pub fn last(&self) -> Option<ProbeStatus> {
        self.lock().last.clone()
    }

    pub fn events(&self) -> Vec<ProbeStatus> {
        self.lock().events.iter().cloned().collect()
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new(DEFAULT_REST_HISTORY)
    }
}

// ── HTTP ───────────────────────────────────────────────────────

#[derive(Serialize)]
struct StatusView<'a> {
    live: bool,
    timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<ProbePhase>,
    message: &'a str,
    probe: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<ExceptionView<'a>>,
}

#[derive(Serialize)]
struct ExceptionView<'a> {
    message: &'a str,
}

/// Router serving `board`.
pub fn status_router(board: StatusBoard) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/events", get(events))
        .with_state(board)
}

/// GET /status
async fn status(State(board): State<StatusBoard>) -> Response {
    let Some(last) = board.last() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "live": false })))
            .into_response();
    };
    let view = StatusView {
        live: last.is_success(),
        timestamp: last.timestamp(),
        phase: last.phase(),
        message: last.message(),
        probe: last.probe(),
        exception: last.thrown().map(|message| ExceptionView { message }),
    };
    Json(view).into_response()
}

/// GET /events
async fn events(State(board): State<StatusBoard>) -> Json<Vec<ProbeStatus>> {
    Json(board.events())
}

// ── Reporter ───────────────────────────────────────────────────

struct RunningServer {
    addr: SocketAddr,
    stop: oneshot::Sender<()>,
}

/// Publishes live results over HTTP for as long as reporting is active.
pub struct RestReporter {
    bind: String,
    board: StatusBoard,
    exit_on_probe_failure: bool,
    server: Option<RunningServer>,
}

impl RestReporter {
    pub fn new(bind: impl Into<String>, history: usize) -> Self {
        Self {
            bind: bind.into(),
            board: StatusBoard::new(history),
            exit_on_probe_failure: true,
            server: None,
        }
    }

    pub fn exit_on_probe_failure(mut self, exit: bool) -> Self {
        self.exit_on_probe_failure = exit;
        self
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// Address the server is listening on, while it runs.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.as_ref().map(|s| s.addr)
    }

    fn serve(&self) -> std::io::Result<RunningServer> {
        let listener = std::net::TcpListener::bind(&self.bind)?;
        listener.set_nonblocking(true)?;
        let listener = tokio::net::TcpListener::from_std(listener)?;
        let addr = listener.local_addr()?;

        let (stop, stopped) = oneshot::channel::<()>();
        let router = status_router(self.board.clone());
        tokio::spawn(async move {
            let server = axum::serve(listener, router).with_graceful_shutdown(async move {
                let _ = stopped.await;
            });
            if let Err(e) = server.await {
                error!(error = %e, "status server failed");
            }
        });
        Ok(RunningServer { addr, stop })
    }
}

impl Default for RestReporter {
    fn default() -> Self {
        Self::new(DEFAULT_REST_BIND, DEFAULT_REST_HISTORY)
    }
}

impl ProbeReportHandler for RestReporter {
    fn start(&mut self, name: &str, _description: &str) -> bool {
        match self.serve() {
            Ok(server) => {
                info!(service = %name, addr = %server.addr, "status server listening");
                self.server = Some(server);
                true
            }
            Err(e) => {
                error!(
                    service = %name,
                    bind = %self.bind,
                    error = %e,
                    "failed to start status server"
                );
                false
            }
        }
    }

    fn unregister(&mut self) {
        if let Some(server) = self.server.take() {
            let _ = server.stop.send(());
            info!(addr = %server.addr, "status server stopped");
        }
    }

    fn probe_result(&mut self, _phase: ProbePhase, status: &ProbeStatus) {
        self.board.record(status.clone());
    }

    fn probe_failure(&mut self, _failure: &ProbeFailed) -> Flow {
        if self.exit_on_probe_failure {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}
