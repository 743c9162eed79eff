use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%a, %d %b %Y %H:%M:%S",
    "%d %b %Y %H:%M:%S",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z",
    "%a, %d %b %Y %H:%M %z",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d %b %Y", "%B %d, %Y"];

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Converts unix seconds to UTC.
pub(crate) fn from_unix_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

/// Converts a broken-down `[year, month, day, hour, minute, second, ..]` tuple,
/// read as UTC wall time. Trailing fields (weekday, yday, dst) are ignored.
pub(crate) fn from_parts(parts: &[i64]) -> Option<DateTime<Utc>> {
    let field = |idx: usize| parts.get(idx).copied().unwrap_or(0);
    let year = i32::try_from(*parts.first()?).ok()?;
    let month = u32::try_from(*parts.get(1)?).ok()?;
    let day = u32::try_from(*parts.get(2)?).ok()?;
    let hour = u32::try_from(field(3)).ok()?;
    let minute = u32::try_from(field(4)).ok()?;
    // struct_time allows a leap second of 60/61
    let second = u32::try_from(field(5)).ok()?.min(59);
    NaiveDate::from_ymd_opt(year, month, day)?
        .and_hms_opt(hour, minute, second)
        .map(|naive| naive.and_utc())
}

/// Parses the free-form date strings feeds put in `pubDate`/`updated`.
///
/// Values without an offset are read as UTC.
pub(crate) fn parse_free_form(raw: &str) -> Option<DateTime<Utc>> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(parsed) = DateTime::parse_from_rfc2822(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(parsed) = DateTime::<FixedOffset>::parse_from_str(value, format) {
            return Some(parsed.with_timezone(&Utc));
        }
    }

    let without_zone = value
        .strip_suffix(" GMT")
        .or_else(|| value.strip_suffix(" UTC"))
        .or_else(|| value.strip_suffix('Z'))
        .unwrap_or(value);
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(without_zone, format) {
            return Some(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(without_zone, format) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }
    None
}

/// Fixed-offset wall clock used for run reports.
pub(crate) fn report_offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.clamp(-23, 23) * 3600).unwrap_or_else(|| Utc.fix())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};
    use rstest::rstest;

    #[rstest]
    #[case("Wed, 25 Dec 2024 10:30:00 +0000")]
    #[case("Wed, 25 Dec 2024 10:30:00 GMT")]
    #[case("2024-12-25T10:30:00Z")]
    #[case("2024-12-25T18:30:00+08:00")]
    #[case("2024-12-25 10:30:00")]
    #[case("2024/12/25 10:30:00")]
    fn parses_common_feed_formats(#[case] raw: &str) {
        let parsed = parse_free_form(raw).expect("should parse");
        assert_eq!((parsed.year(), parsed.month(), parsed.day()), (2024, 12, 25));
        assert_eq!((parsed.hour(), parsed.minute()), (10, 30));
    }

    #[test]
    fn parses_date_only_as_midnight_utc() {
        let parsed = parse_free_form("2024-12-25").expect("should parse");
        assert_eq!(parsed.hour(), 0);
    }

    #[rstest]
    #[case("")]
    #[case("yesterday-ish")]
    #[case("2024-13-45")]
    fn rejects_garbage(#[case] raw: &str) {
        assert!(parse_free_form(raw).is_none());
    }

    #[test]
    fn parts_are_read_as_utc() {
        let parsed = from_parts(&[2024, 12, 25, 10, 30, 0, 2, 360, 0]).expect("valid parts");
        assert_eq!(parsed.to_rfc3339(), "2024-12-25T10:30:00+00:00");
        assert!(from_parts(&[2024, 2, 30]).is_none());
        assert!(from_parts(&[2024]).is_none());
    }

    #[test]
    fn unix_seconds_convert() {
        let parsed = from_unix_seconds(1_735_122_600).expect("valid timestamp");
        assert_eq!(parsed.to_rfc3339(), "2024-12-25T10:30:00+00:00");
    }
}
