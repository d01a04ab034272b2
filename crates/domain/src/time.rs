//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `last_time_*` status fields, transition stamps,
/// event times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Format a timestamp the way it appears in status echoes (`get_status`).
#[must_use]
pub fn format_status(ts: &Timestamp) -> String {
    ts.format("T%H:%M:%S D%d/%m/%y").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_format_time_then_date() {
        let ts: Timestamp = "2024-03-01T09:30:05Z".parse().unwrap();
        assert_eq!(format_status(&ts), "T09:30:05 D01/03/24");
    }
}
