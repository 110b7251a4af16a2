//! Anchor-relative dates.
//!
//! Generated scripts never contain absolute event dates. Each timestamp is
//! reduced to its weekday and time of day and rebuilt at execution time from
//! the bound anchor date: the anchor is advanced by the smallest non-negative
//! number of days that lands on the original weekday. Whatever date the
//! anchor turns out to be, a Wednesday stand-up stays on a Wednesday.

use time::{Date, Duration, PrimitiveDateTime, Time, Weekday};

use crate::timestamps::format_time;

/// Placeholder for the anchor ("today") date.
pub const ANCHOR_TOKEN: &str = "@TODAY";

/// Placeholder for the session identifier.
pub const SESSION_TOKEN: &str = "@session_id";

/// Weekday index with Sunday = 0, matching SQLite's `strftime('%w')`.
pub fn weekday_index(day: Weekday) -> i64 {
    i64::from(day.number_days_from_sunday())
}

/// Days to advance from `anchor` to reach `target`, in `0..7`.
pub fn day_offset(target: Weekday, anchor: Weekday) -> i64 {
    (weekday_index(target) - weekday_index(anchor) + 7) % 7
}

/// A timestamp expressed relative to a not-yet-known anchor date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeferredDate {
    /// Weekday the resolved date falls on before `shift_days` applies.
    pub weekday: Weekday,
    /// Time of day of the resolved timestamp.
    pub time: Time,
    /// Extra days added after the weekday alignment (negative moves back).
    pub shift_days: i64,
}

impl DeferredDate {
    /// Captures the weekday and time of day of `ts`.
    pub fn encode(ts: PrimitiveDateTime) -> Self {
        Self {
            weekday: ts.weekday(),
            time: ts.time(),
            shift_days: 0,
        }
    }

    /// Moves the resolved date by `days` and replaces its time of day.
    pub fn shifted(self, days: i64, time: Time) -> Self {
        Self {
            shift_days: self.shift_days + days,
            time,
            ..self
        }
    }

    /// Total day offset from `anchor`.
    pub fn offset_from(&self, anchor: Date) -> i64 {
        day_offset(self.weekday, anchor.weekday()) + self.shift_days
    }

    /// Rebuilds the absolute timestamp for a concrete anchor.
    pub fn resolve(&self, anchor: Date) -> PrimitiveDateTime {
        PrimitiveDateTime::new(anchor + Duration::days(self.offset_from(anchor)), self.time)
    }

    /// SQLite expression computing the timestamp from [`ANCHOR_TOKEN`].
    ///
    /// The weekday alignment is evaluated by the database, so the expression
    /// is valid for any anchor bound later.
    pub fn to_sql(&self) -> String {
        let alignment = format!(
            "(({} - CAST(strftime('%w', {ANCHOR_TOKEN}) AS INTEGER) + 7) % 7)",
            weekday_index(self.weekday)
        );
        let days = match self.shift_days {
            0 => alignment,
            n if n < 0 => format!("({alignment} - {})", -n),
            n => format!("({alignment} + {n})"),
        };

        format!(
            "datetime({ANCHOR_TOKEN}, {days} || ' days', '+{}')",
            format_time(self.time)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::{date, datetime, time};

    #[test]
    fn test_wednesday_against_monday_anchor() {
        let deferred = DeferredDate::encode(datetime!(2023-11-08 14:30:00));
        assert_eq!(deferred.weekday, Weekday::Wednesday);

        let anchor = date!(2024 - 01 - 15);
        assert_eq!(anchor.weekday(), Weekday::Monday);
        assert_eq!(deferred.offset_from(anchor), 2);
        assert_eq!(deferred.resolve(anchor), datetime!(2024-01-17 14:30:00));
    }

    #[test]
    fn test_weekday_preserved_for_every_anchor() {
        let originals = [
            datetime!(2024-03-03 08:00:00),
            datetime!(2024-03-06 12:15:00),
            datetime!(2024-03-09 23:59:59),
        ];

        for original in originals {
            let deferred = DeferredDate::encode(original);
            // Seven consecutive anchors cover every weekday
            for day in 0..7 {
                let anchor = date!(2025 - 06 - 01) + Duration::days(day);
                let resolved = deferred.resolve(anchor);

                assert_eq!(resolved.weekday(), original.weekday());
                assert_eq!(resolved.time(), original.time());
                let offset = deferred.offset_from(anchor);
                assert!((0..7).contains(&offset), "offset {offset} out of range");
            }
        }
    }

    #[test]
    fn test_same_weekday_is_zero_offset() {
        assert_eq!(day_offset(Weekday::Friday, Weekday::Friday), 0);
        assert_eq!(day_offset(Weekday::Sunday, Weekday::Saturday), 1);
        assert_eq!(day_offset(Weekday::Saturday, Weekday::Sunday), 6);
    }

    #[test]
    fn test_shifted_response_date() {
        let deferred = DeferredDate::encode(datetime!(2024-01-03 09:00:00)).shifted(-5, time!(10:00));
        let anchor = date!(2024 - 01 - 15);

        // Wednesday after the anchor is the 17th, five days earlier is the 12th
        assert_eq!(deferred.resolve(anchor), datetime!(2024-01-12 10:00:00));
    }

    #[test]
    fn test_sql_expression() {
        let deferred = DeferredDate::encode(datetime!(2024-01-03 09:00:00));
        assert_eq!(
            deferred.to_sql(),
            "datetime(@TODAY, ((3 - CAST(strftime('%w', @TODAY) AS INTEGER) + 7) % 7) || ' days', '+09:00:00')"
        );

        let response = deferred.shifted(-4, time!(10:00));
        assert_eq!(
            response.to_sql(),
            "datetime(@TODAY, (((3 - CAST(strftime('%w', @TODAY) AS INTEGER) + 7) % 7) - 4) || ' days', '+10:00:00')"
        );
    }
}
