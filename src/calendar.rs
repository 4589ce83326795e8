//! Naive calendar helpers.
//!
//! Everything here works on `chrono::NaiveDate` / `NaiveDateTime` values, which
//! are immutable `Copy` types: arithmetic returns new values and never adjusts
//! for zones or DST.

use std::collections::BTreeSet;

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

pub(crate) const MINUTES_PER_DAY: u32 = 24 * 60;

/// Spans may run until 48:00, i.e. the end of the following day.
pub(crate) const MAX_EXTENDED_MINUTES: u32 = 2 * MINUTES_PER_DAY;

/// Length of the Gregorian cycle, after which weekdays and leap years repeat.
pub(crate) const GREGORIAN_CYCLE_DAYS: i64 = 146_097;

pub(crate) fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}

pub(crate) fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 if is_leap_year(year) => 29,
        2 => 28,
        _ => 0,
    }
}

/// Largest day number a month can have in any year (Feb 29 included).
pub(crate) fn max_days_in_month(month: u32) -> u32 {
    days_in_month(2000, month)
}

/// 1-based occurrence of the date's weekday within its month (`Mo[1]` is 1).
pub(crate) fn nth_in_month(date: NaiveDate) -> u32 {
    (date.day() - 1) / 7 + 1
}

/// 1-based occurrence counted from the end of the month (`Mo[-1]` is 1).
pub(crate) fn nth_from_month_end(date: NaiveDate) -> u32 {
    (days_in_month(date.year(), date.month()) - date.day()) / 7 + 1
}

pub(crate) fn day_start(date: NaiveDate) -> NaiveDateTime {
    NaiveDateTime::new(date, NaiveTime::MIN)
}

/// `date` at `minutes` past its midnight; `minutes` may exceed one day.
/// Saturates at the end of the calendar.
pub(crate) fn at_minutes(date: NaiveDate, minutes: u32) -> NaiveDateTime {
    day_start(date).checked_add_signed(Duration::minutes(i64::from(minutes))).unwrap_or(NaiveDateTime::MAX)
}

/// `instant` moved by `days`, clamped to the representable range.
pub(crate) fn shift_days(instant: NaiveDateTime, days: i64) -> NaiveDateTime {
    match instant.checked_add_signed(Duration::days(days)) {
        Some(shifted) => shifted,
        None if days < 0 => NaiveDateTime::MIN,
        None => NaiveDateTime::MAX,
    }
}

pub(crate) fn second_of_day(dt: NaiveDateTime) -> u32 {
    dt.num_seconds_from_midnight()
}

pub(crate) fn first_of_year(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, 1, 1)
}

/// First day of the month following `month` of `year`.
pub(crate) fn first_after_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?.checked_add_months(Months::new(1))
}

pub(crate) fn add_days(date: NaiveDate, days: i64) -> Option<NaiveDate> {
    date.checked_add_signed(Duration::days(days))
}

pub(crate) fn add_years(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_add_months(Months::new(years.saturating_mul(12))).unwrap_or(NaiveDate::MAX)
}

pub(crate) fn sub_years(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_sub_months(Months::new(years.saturating_mul(12))).unwrap_or(NaiveDate::MIN)
}

/// A set of holiday dates (public or school holidays).
///
/// The engine has no built-in holiday calendar; callers provide the dates that
/// `PH` / `SH` selectors should match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolidaySet {
    dates: BTreeSet<NaiveDate>,
}

impl HolidaySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, date: NaiveDate) -> bool {
        self.dates.insert(date)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.dates.contains(&date)
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn first(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.dates.iter().copied()
    }
}

impl FromIterator<NaiveDate> for HolidaySet {
    fn from_iter<I: IntoIterator<Item = NaiveDate>>(iter: I) -> Self {
        Self { dates: iter.into_iter().collect() }
    }
}

impl Extend<NaiveDate> for HolidaySet {
    fn extend<I: IntoIterator<Item = NaiveDate>>(&mut self, iter: I) {
        self.dates.extend(iter);
    }
}
