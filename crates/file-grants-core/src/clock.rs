//! Wall-clock helper.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in Unix milliseconds.
///
/// Clamps to zero if the system clock is set before the epoch.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
