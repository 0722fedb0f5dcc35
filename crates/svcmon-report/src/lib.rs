//! svcmon-report: report handlers for the reporting loop.
//!
//! | Reporter | Outlet | Stops the loop on |
//! |---|---|---|
//! | [`LogReporter`] | `tracing` | probe failure, if configured |
//! | [`RestReporter`] | `GET /status`, `GET /events` | probe failure |
//! | [`StatusCheckReporter`] | `tracing` | first completed cycle, any failure or timeout |

pub mod logger;
pub mod rest;
pub mod status_check;

pub use logger::LogReporter;
pub use rest::{RestReporter, StatusBoard, status_router};
pub use status_check::StatusCheckReporter;
