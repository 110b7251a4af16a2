//! Best-effort timestamp normalization for generated content.
//!
//! Provider output is free text and occasionally carries dates such as
//! `2024-2-5T09:00` or a trailing offset. [`normalize_timestamp`] accepts the
//! canonical forms directly, then tries a component-wise repair. Callers that
//! need a value regardless use [`normalize_or`], which falls back to a caller
//! supplied sentinel (normally "now") and logs the rejected input.

use time::format_description::FormatItem;
use time::macros::format_description;
use time::{Date, Month, PrimitiveDateTime, Time};
use tracing::warn;

/// Storage format for timestamps in generated rows and SQL text.
pub const SQL_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

const ISO_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");

/// Formats a timestamp as `YYYY-MM-DD HH:MM:SS`.
pub fn format_sql(ts: PrimitiveDateTime) -> String {
    // The format only contains numeric components, which cannot fail to render.
    ts.format(SQL_FORMAT).unwrap_or_default()
}

/// Formats a time of day as `HH:MM:SS`.
pub fn format_time(t: Time) -> String {
    format!("{:02}:{:02}:{:02}", t.hour(), t.minute(), t.second())
}

/// Parses `raw` as a timestamp, repairing common formatting defects.
///
/// Returns `None` when the input cannot be interpreted.
pub fn normalize_timestamp(raw: &str) -> Option<PrimitiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(ts) = PrimitiveDateTime::parse(raw, ISO_FORMAT) {
        return Some(ts);
    }
    if let Ok(ts) = PrimitiveDateTime::parse(raw, SQL_FORMAT) {
        return Some(ts);
    }

    repair(raw)
}

/// Like [`normalize_timestamp`], falling back to `fallback` for unusable input.
pub fn normalize_or(raw: &str, fallback: PrimitiveDateTime) -> PrimitiveDateTime {
    normalize_timestamp(raw).unwrap_or_else(|| {
        warn!("Invalid timestamp '{raw}', using {}", format_sql(fallback));
        fallback
    })
}

fn repair(raw: &str) -> Option<PrimitiveDateTime> {
    let (date_part, time_part) = match raw.find(['T', ' ']) {
        Some(idx) => (&raw[..idx], raw[idx + 1..].trim()),
        None => (raw, ""),
    };

    let date = parse_date(date_part)?;
    let time = if time_part.is_empty() {
        Time::MIDNIGHT
    } else {
        parse_time(strip_offset(time_part))?
    };

    Some(PrimitiveDateTime::new(date, time))
}

fn parse_date(part: &str) -> Option<Date> {
    let mut fields = part.split('-');
    let year: i32 = fields.next()?.trim().parse().ok()?;
    let month: u8 = fields.next()?.trim().parse().ok()?;
    let day: u8 = fields.next()?.trim().parse().ok()?;
    if fields.next().is_some() {
        return None;
    }

    Date::from_calendar_date(year, Month::try_from(month).ok()?, day).ok()
}

/// Drops a trailing `Z` or `±HH:MM` offset; the wall-clock time is kept as-is.
fn strip_offset(part: &str) -> &str {
    let part = part.trim_end_matches(['Z', 'z']);
    match part.rfind(['+', '-']) {
        Some(idx) if idx > 0 => &part[..idx],
        _ => part,
    }
}

/// Parses a time of day written as `HH:MM` or `HH:MM:SS`.
pub fn parse_time_of_day(raw: &str) -> Option<Time> {
    parse_time(raw.trim())
}

fn parse_time(part: &str) -> Option<Time> {
    let mut fields = part.split(':');
    let hour: u8 = fields.next()?.trim().parse().ok()?;
    let minute: u8 = fields.next()?.trim().parse().ok()?;
    let second: u8 = match fields.next() {
        // Fractional seconds are truncated
        Some(s) => s.split('.').next()?.trim().parse().ok()?,
        None => 0,
    };
    if fields.next().is_some() {
        return None;
    }

    Time::from_hms(hour, minute, second).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_canonical_forms() {
        assert_eq!(
            normalize_timestamp("2024-02-05T09:30:00"),
            Some(datetime!(2024-02-05 09:30:00))
        );
        assert_eq!(
            normalize_timestamp("2024-02-05 09:30:00"),
            Some(datetime!(2024-02-05 09:30:00))
        );
    }

    #[test]
    fn test_repairs_missing_padding() {
        assert_eq!(
            normalize_timestamp("2024-2-5T09:30:00"),
            Some(datetime!(2024-02-05 09:30:00))
        );
        assert_eq!(
            normalize_timestamp("2024-02-5T9:05"),
            Some(datetime!(2024-02-05 09:05:00))
        );
    }

    #[test]
    fn test_strips_offsets_and_fractions() {
        assert_eq!(
            normalize_timestamp("2024-02-05T09:30:00Z"),
            Some(datetime!(2024-02-05 09:30:00))
        );
        assert_eq!(
            normalize_timestamp("2024-02-05T09:30:00.250-05:00"),
            Some(datetime!(2024-02-05 09:30:00))
        );
    }

    #[test]
    fn test_date_only_is_midnight() {
        assert_eq!(
            normalize_timestamp("2024-02-05"),
            Some(datetime!(2024-02-05 00:00:00))
        );
    }

    #[test]
    fn test_unrepairable_falls_back() {
        let now = datetime!(2024-06-01 12:00:00);
        assert_eq!(normalize_timestamp("next tuesday"), None);
        assert_eq!(normalize_timestamp("2024-02-30T10:00:00"), None);
        assert_eq!(normalize_or("next tuesday", now), now);
        assert_eq!(normalize_or("", now), now);
    }

    #[test]
    fn test_format_sql() {
        assert_eq!(
            format_sql(datetime!(2024-01-17 09:00:00)),
            "2024-01-17 09:00:00"
        );
    }
}
