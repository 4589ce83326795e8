//! The rule model.
//!
//! A parsed expression is an ordered `Vec<Rule>`. Each rule pairs date
//! selectors (years, months/dates, ISO weeks, weekdays, holidays) with time
//! spans, a resulting state and the way it combines with earlier rules.

use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};

use crate::Context;
use crate::calendar::{self, MAX_EXTENDED_MINUTES, MINUTES_PER_DAY};

/// State of a place at some instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Open,
    Closed,
    Unknown,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Open => "open",
            State::Closed => "closed",
            State::Unknown => "unknown",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a rule combines with the rules before it, mirroring its separator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Combination {
    /// `;` (and the first rule): replaces whatever earlier rules said about a matching day.
    Override,
    /// `,`: painted on top of earlier rules for a matching day.
    Additional,
    /// `||`: only used for days no earlier rule matched.
    Fallback,
}

bitflags::bitflags! {
    /// Set of weekdays, Monday first.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct WeekdaySet: u8 {
        const MON = 1 << 0;
        const TUE = 1 << 1;
        const WED = 1 << 2;
        const THU = 1 << 3;
        const FRI = 1 << 4;
        const SAT = 1 << 5;
        const SUN = 1 << 6;
    }
}

impl WeekdaySet {
    pub fn single(weekday: Weekday) -> Self {
        Self::from_bits_truncate(1 << weekday.num_days_from_monday())
    }

    /// Inclusive range that wraps over the end of the week (`We-Mo`).
    pub fn range(from: Weekday, to: Weekday) -> Self {
        let mut set = Self::empty();
        let mut day = from;
        loop {
            set |= Self::single(day);
            if day == to {
                return set;
            }
            day = day.succ();
        }
    }

    pub fn includes(self, weekday: Weekday) -> bool {
        self.contains(Self::single(weekday))
    }
}

bitflags::bitflags! {
    /// Occurrences of a weekday within a month: `[1]`..`[5]` from the start,
    /// `[-1]`..`[-5]` from the end.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NthSet: u16 {
        const FIRST = 1 << 0;
        const SECOND = 1 << 1;
        const THIRD = 1 << 2;
        const FOURTH = 1 << 3;
        const FIFTH = 1 << 4;
        const LAST = 1 << 5;
        const SECOND_LAST = 1 << 6;
        const THIRD_LAST = 1 << 7;
        const FOURTH_LAST = 1 << 8;
        const FIFTH_LAST = 1 << 9;
    }
}

impl NthSet {
    /// `n` in `1..=5` counts from the start, `-5..=-1` from the end.
    pub fn nth(n: i8) -> Option<Self> {
        match n {
            1..=5 => Some(Self::from_bits_truncate(1 << (n - 1))),
            -5..=-1 => Some(Self::from_bits_truncate(1 << (4 - n))),
            _ => None,
        }
    }

    pub fn matches(self, date: NaiveDate) -> bool {
        let from_start = Self::nth(calendar::nth_in_month(date) as i8).unwrap_or_default();
        let from_end = Self::nth(-(calendar::nth_from_month_end(date) as i8)).unwrap_or_default();
        self.intersects(from_start | from_end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HolidayKind {
    /// `PH`
    Public,
    /// `SH`
    School,
}

/// How holidays and weekdays combine in one weekday selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HolidayJoin {
    /// `Sa,PH`: either matches.
    #[default]
    Union,
    /// `PH Mo`: both must match.
    Intersection,
}

/// Weekday part of a rule: plain weekdays, nth-weekday-of-month entries and
/// holiday keywords.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WeekdaySelector {
    pub days: WeekdaySet,
    pub nth: Vec<(Weekday, NthSet)>,
    pub holidays: Vec<HolidayKind>,
    pub join: HolidayJoin,
}

impl WeekdaySelector {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty() && self.nth.is_empty() && self.holidays.is_empty()
    }

    fn matches(&self, date: NaiveDate, context: &Context) -> bool {
        let weekday = date.weekday();
        let by_weekday = (!self.days.is_empty() || !self.nth.is_empty()).then(|| {
            self.days.includes(weekday) || self.nth.iter().any(|(wd, nth)| *wd == weekday && nth.matches(date))
        });
        let by_holiday = (!self.holidays.is_empty()).then(|| {
            self.holidays.iter().any(|kind| match kind {
                HolidayKind::Public => context.public_holidays.contains(date),
                HolidayKind::School => context.school_holidays.contains(date),
            })
        });

        match (by_weekday, by_holiday) {
            (None, None) => true,
            (Some(w), None) => w,
            (None, Some(h)) => h,
            (Some(w), Some(h)) => match self.join {
                HolidayJoin::Union => w || h,
                HolidayJoin::Intersection => w && h,
            },
        }
    }
}

/// `2024`, `2024-2030`, `2024-2030/2` or `2024+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct YearRange {
    pub start: i32,
    /// `None` for an open range (`2024+`).
    pub end: Option<i32>,
    pub step: u32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        if year < self.start {
            return false;
        }
        if self.end.is_some_and(|end| year > end) {
            return false;
        }
        (year - self.start) as u32 % self.step.max(1) == 0
    }
}

/// A calendar day in a monthday selector, optionally pinned to a year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateSpec {
    pub year: Option<i32>,
    pub month: u32,
    pub day: u32,
}

impl DateSpec {
    fn month_day(&self) -> (u32, u32) {
        (self.month, self.day)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MonthdayRange {
    /// `Jan`, `Dec-Feb`, `2024 Jun-Aug`.
    Months { year: Option<i32>, start: u32, end: u32 },
    /// `Dec 25`, `Dec 24-26`, `Dec 24-Jan 02`, `Mar 15+`.
    Dates { start: DateSpec, end: Option<DateSpec> },
}

impl MonthdayRange {
    pub fn matches(&self, date: NaiveDate) -> bool {
        match *self {
            MonthdayRange::Months { year: None, start, end } => in_wrapping_range(date.month(), start, end),
            MonthdayRange::Months { year: Some(year), start, end } => {
                let end_year = if end < start { year + 1 } else { year };
                let from = (year, start);
                let until = (end_year, end);
                let current = (date.year(), date.month());
                from <= current && current <= until
            }
            MonthdayRange::Dates { start, end } => {
                let current = (date.month(), date.day());
                match (start.year, end) {
                    (None, None) => current >= start.month_day(),
                    (None, Some(end)) => in_wrapping_range(current, start.month_day(), end.month_day()),
                    (Some(_), _) => self.absolute_bounds().is_some_and(|(from, until)| {
                        date >= from && until.is_none_or(|until| date < until)
                    }),
                }
            }
        }
    }

    /// Absolute `[from, until)` for ranges pinned to a year; `until` is `None`
    /// for open ranges.
    pub(crate) fn absolute_bounds(&self) -> Option<(NaiveDate, Option<NaiveDate>)> {
        match *self {
            MonthdayRange::Months { year: Some(year), start, end } => {
                let end_year = if end < start { year + 1 } else { year };
                let from = NaiveDate::from_ymd_opt(year, start, 1)?;
                Some((from, Some(calendar::first_after_month(end_year, end)?)))
            }
            MonthdayRange::Dates { start, end } => {
                let year = start.year?;
                let from = clamped_date(year, start.month, start.day)?;
                let Some(end) = end else {
                    return Some((from, None));
                };
                let end_year = end.year.unwrap_or(if end.month_day() < start.month_day() { year + 1 } else { year });
                let until = clamped_date(end_year, end.month, end.day)?.succ_opt()?;
                Some((from, Some(until)))
            }
            MonthdayRange::Months { year: None, .. } => None,
        }
    }
}

/// `Feb 29` in a common year maps to Feb 28 so absolute ranges stay valid.
fn clamped_date(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day.min(calendar::days_in_month(year, month)))
}

fn in_wrapping_range<T: PartialOrd>(value: T, start: T, end: T) -> bool {
    if start <= end { start <= value && value <= end } else { value >= start || value <= end }
}

/// `week 01-20/2`: ISO week numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WeekRange {
    pub start: u32,
    pub end: u32,
    pub step: u32,
}

impl WeekRange {
    pub fn matches(&self, date: NaiveDate) -> bool {
        let week = date.iso_week().week();
        if self.start <= self.end {
            (self.start..=self.end).contains(&week) && (week - self.start) % self.step.max(1) == 0
        } else {
            week >= self.start || week <= self.end
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SolarEvent {
    Dawn,
    Sunrise,
    Sunset,
    Dusk,
}

/// A time of day in a span, either fixed or relative to a solar event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeRef {
    /// Minutes since midnight, up to 48:00.
    Fixed(u32),
    /// `sunset`, `(sunrise+01:00)`; `offset` in minutes.
    Solar { event: SolarEvent, offset: i32 },
}

impl TimeRef {
    pub(crate) fn resolve(&self, context: &Context) -> u32 {
        match *self {
            TimeRef::Fixed(minutes) => minutes,
            TimeRef::Solar { event, offset } => {
                let base = context.solar.minutes(event) as i32;
                (base + offset).clamp(0, MINUTES_PER_DAY as i32) as u32
            }
        }
    }
}

/// One `start-end` time range of a rule, as written.
///
/// An `end` at or before `start` crosses midnight (`22:00-04:00`). A missing
/// `end` is an open end (`18:00+`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeSpan {
    pub start: TimeRef,
    pub end: Option<TimeRef>,
    pub open_end: bool,
}

impl TimeSpan {
    pub const FULL_DAY: TimeSpan =
        TimeSpan { start: TimeRef::Fixed(0), end: Some(TimeRef::Fixed(MINUTES_PER_DAY)), open_end: false };

    /// Resolve to `(start, end)` minutes with `start < end <= 48:00`.
    pub(crate) fn resolve(&self, context: &Context) -> (u32, u32) {
        let start = self.start.resolve(context);
        let mut end = match self.end {
            Some(end) => end.resolve(context),
            None if start < MINUTES_PER_DAY => MINUTES_PER_DAY,
            None => MAX_EXTENDED_MINUTES,
        };
        if end <= start {
            end += MINUTES_PER_DAY;
        }
        (start, end.min(MAX_EXTENDED_MINUTES))
    }
}

/// One clause of an opening hours expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub years: Vec<YearRange>,
    pub monthdays: Vec<MonthdayRange>,
    pub weeks: Vec<WeekRange>,
    pub weekdays: WeekdaySelector,
    /// Empty means the whole day.
    pub times: Vec<TimeSpan>,
    pub state: State,
    pub comment: Option<String>,
    pub combination: Combination,
}

impl Rule {
    /// Whether the date selectors of this rule match `date`.
    pub fn matches_date(&self, date: NaiveDate, context: &Context) -> bool {
        (self.years.is_empty() || self.years.iter().any(|range| range.contains(date.year())))
            && (self.monthdays.is_empty() || self.monthdays.iter().any(|range| range.matches(date)))
            && (self.weeks.is_empty() || self.weeks.iter().any(|range| range.matches(date)))
            && self.weekdays.matches(date, context)
    }

    /// Spans in minutes, `start < end <= 48:00`, together with their open-end flag.
    pub(crate) fn resolved_spans(&self, context: &Context) -> Vec<(u32, u32, bool)> {
        if self.times.is_empty() {
            return vec![(0, MINUTES_PER_DAY, false)];
        }
        self.times
            .iter()
            .map(|span| {
                let (start, end) = span.resolve(context);
                (start, end, span.open_end)
            })
            .collect()
    }

    pub fn has_date_selectors(&self) -> bool {
        !self.years.is_empty() || !self.monthdays.is_empty() || !self.weeks.is_empty() || !self.weekdays.is_empty()
    }
}
