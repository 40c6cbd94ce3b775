//! Delay derivation from planned and estimated departure times.

use chrono::{DateTime, NaiveDateTime, Utc};

/// Parses an upstream timestamp into a UTC instant.
///
/// Accepts RFC 3339 with `Z` or an explicit offset. A timestamp without any
/// offset is taken to already be UTC. Anything else yields `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Minutes between two instants, negative when `estimated` is earlier.
pub fn minutes_between(scheduled: DateTime<Utc>, estimated: DateTime<Utc>) -> f64 {
    (estimated - scheduled).num_seconds() as f64 / 60.0
}

/// Returns the delay in minutes, or `None` if either side is absent or
/// unparsable. `None` is not "on time".
pub fn delay_minutes(scheduled: Option<&str>, estimated: Option<&str>) -> Option<f64> {
    let scheduled = parse_timestamp(scheduled?)?;
    let estimated = parse_timestamp(estimated?)?;
    Some(minutes_between(scheduled, estimated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_with_same_offset() {
        let delay = delay_minutes(
            Some("2024-01-01T10:00:00+11:00"),
            Some("2024-01-01T10:03:00+11:00"),
        );
        assert_eq!(delay, Some(3.0));
    }

    #[test]
    fn test_delay_across_offsets() {
        // 10:00 at +11:00 is 23:00Z the previous day
        let delay = delay_minutes(Some("2024-01-01T10:00:00+11:00"), Some("2023-12-31T23:04:30Z"));
        assert_eq!(delay, Some(4.5));
    }

    #[test]
    fn test_early_departure_is_negative() {
        let delay = delay_minutes(Some("2024-01-01T10:00:00Z"), Some("2024-01-01T09:58:00Z"));
        assert_eq!(delay, Some(-2.0));
    }

    #[test]
    fn test_on_time_is_zero_not_none() {
        let delay = delay_minutes(Some("2024-01-01T10:00:00Z"), Some("2024-01-01T10:00:00Z"));
        assert_eq!(delay, Some(0.0));
    }

    #[test]
    fn test_missing_estimate_is_none() {
        assert_eq!(delay_minutes(Some("2024-01-01T10:00:00Z"), None), None);
        assert_eq!(delay_minutes(None, Some("2024-01-01T10:00:00Z")), None);
    }

    #[test]
    fn test_unparsable_is_none() {
        assert_eq!(delay_minutes(Some("soon"), Some("2024-01-01T10:00:00Z")), None);
        assert_eq!(delay_minutes(Some("2024-01-01T10:00:00Z"), Some("")), None);
    }

    #[test]
    fn test_parse_timestamp_without_offset_is_utc() {
        let ts = parse_timestamp("2024-01-01T10:00:00").unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-01T10:00:00+00:00");
    }
}
