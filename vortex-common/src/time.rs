//! Timestamp utilities

use chrono::{DateTime, Duration, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Start of a trailing window ending at `at`
pub fn hours_before(at: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    at - Duration::hours(hours)
}

/// Start of a trailing window ending at `at`
pub fn days_before(at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    at - Duration::days(days)
}
