use chrono::{DateTime, TimeZone, Utc};

/// Converts a Stripe epoch-seconds field into a calendar instant.
///
/// Absent values stay absent; they are never mapped to a sentinel date.
pub fn get_date(timestamp: Option<i64>) -> Option<DateTime<Utc>> {
    timestamp.and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_timestamp_stays_absent() {
        assert_eq!(get_date(None), None);
    }

    #[test]
    fn zero_is_the_unix_epoch() {
        let epoch = get_date(Some(0)).unwrap();

        assert_eq!(epoch.to_rfc3339(), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn converts_to_the_matching_calendar_instant() {
        let date = get_date(Some(1_700_000_000)).unwrap();

        assert_eq!(date.to_rfc3339(), "2023-11-14T22:13:20+00:00");
    }

    #[test]
    fn round_trips_to_the_same_epoch_seconds() {
        for seconds in [0, 1, 1_614_556_800, 1_700_000_000, 4_102_444_800] {
            assert_eq!(get_date(Some(seconds)).unwrap().timestamp(), seconds);
        }
    }
}
