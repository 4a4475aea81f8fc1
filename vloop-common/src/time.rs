//! Timestamp utilities

use chrono::{DateTime, Utc};
use std::time::Duration;

/// A device counts as online while its last heartbeat is younger than this
pub const ONLINE_WINDOW: Duration = Duration::from_secs(60);

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds since the Unix epoch, clamped to zero
pub fn unix_millis(at: DateTime<Utc>) -> u64 {
    at.timestamp_millis().max(0) as u64
}

/// Whether `last_seen` falls inside `window` before `now`
pub fn seen_within(
    last_seen: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    window: Duration,
) -> bool {
    match last_seen {
        Some(seen) => {
            let age = now.signed_duration_since(seen);
            age.num_milliseconds() >= 0 && (age.num_milliseconds() as u128) < window.as_millis()
        }
        None => false,
    }
}
