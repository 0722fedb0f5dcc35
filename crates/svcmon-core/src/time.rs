//! Wall-clock helpers.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch; 0 if the clock is before the epoch.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Render a millisecond interval as seconds, e.g. `1.250s`.
pub fn human_millis(millis: i64) -> String {
    let secs = (millis / 1000).unsigned_abs();
    let rem = (millis % 1000).unsigned_abs();
    match millis {
        0 => "0".to_string(),
        m if m > 0 => format!("{secs}.{rem:03}s"),
        _ => format!("-{secs}.{rem:03}s"),
    }
}
