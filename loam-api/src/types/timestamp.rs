//! The fixed wire timestamp layout.
//!
//! Authentication requests carry their timestamp in the classic asctime
//! shape, `Mon Jan  2 15:04:05 2006`, always in UTC. The day of month is
//! space-padded. The formatted string is part of the signed payload, so
//! both sides must treat it byte-for-byte.

use chrono::{DateTime, NaiveDateTime, Utc};

/// chrono layout for `Mon Jan  2 15:04:05 2006` (`%e` = space-padded day).
const ANSIC_FORMAT: &str = "%a %b %e %H:%M:%S %Y";

pub fn format_ansic(time: DateTime<Utc>) -> String {
    time.format(ANSIC_FORMAT).to_string()
}

pub fn parse_ansic(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text, ANSIC_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn formats_reference_time() {
        let time = Utc.with_ymd_and_hms(2006, 1, 2, 15, 4, 5).unwrap();
        assert_eq!(format_ansic(time), "Mon Jan  2 15:04:05 2006");
    }

    #[test]
    fn formats_two_digit_day_without_padding() {
        let time = Utc.with_ymd_and_hms(2006, 1, 12, 15, 4, 5).unwrap();
        assert_eq!(format_ansic(time), "Thu Jan 12 15:04:05 2006");
    }

    #[test]
    fn parse_round_trip() {
        let time = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let text = format_ansic(time);
        assert_eq!(parse_ansic(&text), Some(time));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_ansic("yesterday").is_none());
        assert!(parse_ansic("").is_none());
        assert!(parse_ansic("2006-01-02T15:04:05Z").is_none());
    }
}
