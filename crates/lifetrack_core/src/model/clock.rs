//! Monotonic ISO-8601 timestamp source.

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Issues UTC timestamps that never go backwards.
///
/// Every stamp is strictly later than the previous one issued by the same
/// clock, so two writes in the same millisecond still order correctly.
#[derive(Debug, Default)]
pub struct IsoClock {
    last: Option<DateTime<Utc>>,
}

impl IsoClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a stamp later than both the last issued stamp and `after`.
    pub fn next_after(&mut self, after: Option<&str>) -> String {
        let mut stamp = truncate_millis(Utc::now());
        let floors = [self.last, after.and_then(parse_timestamp)];
        for floor in floors.into_iter().flatten() {
            if stamp <= floor {
                stamp = floor + Duration::milliseconds(1);
            }
        }
        self.last = Some(stamp);
        format_timestamp(stamp)
    }

    pub fn next(&mut self) -> String {
        self.next_after(None)
    }
}

/// Formats as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parses any RFC 3339 timestamp into UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

fn truncate_millis(value: DateTime<Utc>) -> DateTime<Utc> {
    let millis = value.timestamp_millis();
    DateTime::from_timestamp_millis(millis).unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::{parse_timestamp, IsoClock};

    #[test]
    fn stamps_are_strictly_increasing() {
        let mut clock = IsoClock::new();
        let mut previous = clock.next();
        for _ in 0..100 {
            let current = clock.next();
            assert!(current > previous, "{current} <= {previous}");
            previous = current;
        }
    }

    #[test]
    fn next_after_moves_past_a_future_floor() {
        let mut clock = IsoClock::new();
        let stamp = clock.next_after(Some("2999-01-01T00:00:00.000Z"));
        assert_eq!(stamp, "2999-01-01T00:00:00.001Z");
    }

    #[test]
    fn stamps_use_millisecond_utc_format() {
        let stamp = IsoClock::new().next();
        assert_eq!(stamp.len(), "2024-05-01T10:00:00.000Z".len());
        assert!(stamp.ends_with('Z'));
        assert!(parse_timestamp(&stamp).is_some());
    }
}
