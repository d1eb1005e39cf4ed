use std::time::{SystemTime, UNIX_EPOCH};

/// Get the current timestamp in nanoseconds since Unix epoch.
///
/// Returns 0 if system time is before Unix epoch (should never happen in practice).
pub fn current_timestamp_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Convert a timestamp in (fractional) seconds to whole nanoseconds.
pub fn seconds_to_nanos(seconds: f64) -> i64 {
    (seconds * 1e9).round() as i64
}
