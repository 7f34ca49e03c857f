//! Timestamp utilities
//!
//! Stored timestamps are fixed-width RFC 3339 strings in UTC (`...Z`, microsecond
//! precision) so that SQLite string comparison orders them chronologically.

use crate::{Error, Result};
use chrono::{DateTime, SecondsFormat, Utc};

/// Encode a timestamp for storage
pub fn to_db_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp
pub fn parse_db_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::InvalidInput(format!("Bad timestamp '{}': {}", value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_db_timestamp_is_fixed_width_utc() {
        let ts = Utc.with_ymd_and_hms(2025, 5, 6, 7, 15, 8).unwrap();
        assert_eq!(to_db_timestamp(ts), "2025-05-06T07:15:08.000000Z");
    }

    #[test]
    fn test_db_timestamps_sort_chronologically() {
        let earlier = Utc.with_ymd_and_hms(2025, 5, 6, 23, 59, 59).unwrap();
        let later = earlier + Duration::milliseconds(1);
        assert!(to_db_timestamp(earlier) < to_db_timestamp(later));
    }

    #[test]
    fn test_parse_accepts_offsets() {
        let parsed = parse_db_timestamp("2025-05-06T09:15:08+02:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 5, 6, 7, 15, 8).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(
            parse_db_timestamp("yesterday"),
            Err(Error::InvalidInput(_))
        ));
    }
}
