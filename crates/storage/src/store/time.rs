#![forbid(unsafe_code)]

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Current UTC time as `(rfc3339, epoch_ms)`, truncated to whole milliseconds so the text and
/// the number always agree.
pub fn now_stamp() -> (String, i64) {
    let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
    let ms = nanos / 1_000_000i128;
    let ms = i64::try_from(ms.max(0)).unwrap_or(i64::MAX);
    let dt = OffsetDateTime::from_unix_timestamp_nanos(i128::from(ms) * 1_000_000i128)
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);
    let text = dt
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string());
    (text, ms)
}

/// Normalises a stored timestamp to epoch milliseconds.
///
/// Handles RFC 3339, naive ISO-8601 (taken as UTC, `T` or space separated, optional fraction),
/// and epoch seconds or milliseconds. Anything else maps to 0.
pub fn parse_timestamp_ms(raw: &str) -> i64 {
    let raw = raw.trim();
    if raw.is_empty() {
        return 0;
    }
    if raw.bytes().all(|b| b.is_ascii_digit()) {
        let Ok(value) = raw.parse::<i64>() else {
            return 0;
        };
        // Ten digits of seconds reach 2286; anything longer is already milliseconds.
        return if raw.len() > 11 {
            value
        } else {
            value.saturating_mul(1000)
        };
    }
    if let Ok(dt) = OffsetDateTime::parse(raw, &Rfc3339) {
        return to_ms(dt);
    }
    let normalized = raw.replacen(' ', "T", 1);
    let with_fraction =
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond]");
    let without_fraction = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(&normalized, with_fraction)
        .or_else(|_| PrimitiveDateTime::parse(&normalized, without_fraction))
        .map(|dt| to_ms(dt.assume_utc()))
        .unwrap_or(0)
}

fn to_ms(dt: OffsetDateTime) -> i64 {
    let ms = dt.unix_timestamp_nanos() / 1_000_000i128;
    i64::try_from(ms).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_text_and_millis_agree() {
        let (text, ms) = now_stamp();
        assert_eq!(parse_timestamp_ms(&text), ms);
    }

    #[test]
    fn legacy_formats_are_understood() {
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01Z"), 1_000);
        assert_eq!(parse_timestamp_ms("1970-01-01T00:00:01"), 1_000);
        assert_eq!(parse_timestamp_ms("1970-01-01 00:00:01.250"), 1_250);
        assert_eq!(parse_timestamp_ms("1970-01-01T01:00:00+01:00"), 0);
        assert_eq!(parse_timestamp_ms("1700000000"), 1_700_000_000_000);
        assert_eq!(parse_timestamp_ms("1700000000123"), 1_700_000_000_123);
        assert_eq!(parse_timestamp_ms("yesterday"), 0);
        assert_eq!(parse_timestamp_ms(""), 0);
    }
}
