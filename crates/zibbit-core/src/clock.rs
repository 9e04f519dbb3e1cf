//! Wall-clock helpers.
//!
//! Deadlines shown to clients are derived from store TTLs, so the only
//! clock arithmetic needed is "now plus a duration", done with checked
//! operations.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// The current instant.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// `from` plus `duration`, saturating at the largest representable instant.
pub fn after(from: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| from.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Unix time in seconds with millisecond precision, as stamped on events.
pub fn server_time(at: DateTime<Utc>) -> f64 {
    // Millisecond timestamps stay well inside f64's exact integer range.
    #[allow(clippy::cast_precision_loss)]
    let millis = at.timestamp_millis() as f64;
    millis / 1000.0
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn after_adds_the_duration() {
        let start = Utc.with_ymd_and_hms(2025, 4, 7, 18, 52, 0).single().unwrap();
        let end = after(start, Duration::from_secs(120));
        assert_eq!(end.signed_duration_since(start).num_seconds(), 120);
    }

    #[test]
    fn after_saturates() {
        let start = Utc.with_ymd_and_hms(2025, 4, 7, 18, 52, 0).single().unwrap();
        assert_eq!(after(start, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn server_time_keeps_milliseconds() {
        let at = Utc.timestamp_millis_opt(1_744_051_920_250).single().unwrap();
        assert!((server_time(at) - 1_744_051_920.25).abs() < 1e-6);
    }
}
