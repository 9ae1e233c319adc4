//! Wire-clock helpers.
//!
//! The tree carries two timestamp shapes: float seconds since the epoch
//! (chat `updatedAt`, message `createdAt`, request `sent_at`) and integer
//! milliseconds (`status.last_seen`).

use chrono::Utc;

/// Current time as float seconds since the Unix epoch.
#[must_use]
pub fn now_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

/// Current time as milliseconds since the Unix epoch.
#[must_use]
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_shapes_agree() {
        let seconds = now_seconds();
        let millis = now_millis();
        assert!((seconds * 1000.0 - millis as f64).abs() < 100.0);
    }
}
