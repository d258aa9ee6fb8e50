//! Anniversary date arithmetic for year-offset bucketing

use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Build a UTC midnight timestamp, clamping Feb 29 to Feb 28 in non-leap years
pub fn anchored_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| NaiveDate::from_ymd_opt(year, month, 28))
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(year, 1, 1).unwrap());
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap())
}

/// Shift a timestamp's anchor date by whole years, keeping month/day
pub fn shift_years(anchor: DateTime<Utc>, years: i64) -> DateTime<Utc> {
    anchored_date(
        anchor.year() + years as i32,
        anchor.month(),
        anchor.day(),
    )
}

/// Whole anniversary years elapsed from `start` to `ts` (floor; negative if
/// `ts` precedes `start`)
pub fn whole_years_between(start: DateTime<Utc>, ts: DateTime<Utc>) -> i64 {
    let mut years = ts.year() as i64 - start.year() as i64;
    if shift_years(start, years) > ts {
        years -= 1;
    }
    years
}
