use std::time::{SystemTime, UNIX_EPOCH};

/// Returns the current UNIX timestamp in seconds.
///
/// Used to stamp simulated flight departures. A clock set before the epoch
/// yields 0.
pub fn current_time() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
