//! Static analysis of a parsed rule set.
//!
//! The evaluator answers "what happens on day D" one day at a time; this module
//! answers "how far do we have to look before the schedule repeats". It
//! classifies the selectors a rule set uses into a [`Periodicity`] and collects
//! the dated window (year ranges, dated months, holiday dates) outside of which
//! the schedule is purely periodic.
//!
//! ```text
//!   volatile window          periodic from here on
//! |-----[lo ......... hi]---|=====|=====|=====|====>
//!                            base  +period
//! ```
//!
//! If a forward scan from `t` reaches `max(t, hi + 1) + period` (plus slack for
//! spans that overflow into the next day) without seeing a change, the state
//! never changes again.

use chrono::{Datelike, NaiveDate};

use crate::Context;
use crate::calendar::{self, GREGORIAN_CYCLE_DAYS};
use crate::rule::{HolidayKind, MonthdayRange, Rule, WeekdaySet};

/// Days of slack on top of a period: a day's schedule also depends on the
/// overflow of the day before.
const OVERFLOW_SLACK_DAYS: i64 = 2;

/// Full years to scan for month/date-only schedules; eight consecutive years
/// always contain both leap and common years.
const YEARLY_SCAN_YEARS: i32 = 8;

bitflags::bitflags! {
    /// Which kinds of selectors appear anywhere in a rule set.
    ///
    /// Selectors that cannot exclude a day (`Mo-Su`, `Jan-Dec`) are left out.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SelectorMask: u16 {
        const WEEKDAY     = 1 << 0;
        const NTH_WEEKDAY = 1 << 1;
        const HOLIDAY     = 1 << 2;
        const MONTH       = 1 << 3;
        const DATE        = 1 << 4;
        const WEEK        = 1 << 5;
        const YEAR        = 1 << 6;
    }
}

impl SelectorMask {
    pub fn of(rules: &[Rule]) -> Self {
        rules.iter().fold(Self::empty(), |mask, rule| mask | Self::of_rule(rule))
    }

    pub fn of_rule(rule: &Rule) -> Self {
        let mut mask = Self::empty();
        if !rule.years.is_empty() {
            mask |= Self::YEAR;
        }
        if !rule.weeks.is_empty() {
            mask |= Self::WEEK;
        }
        for range in &rule.monthdays {
            mask |= match range {
                MonthdayRange::Months { year: None, start, end } if end % 12 + 1 == *start => Self::empty(),
                MonthdayRange::Months { .. } => Self::MONTH,
                MonthdayRange::Dates { .. } => Self::DATE,
            };
        }
        if !rule.weekdays.days.is_empty() && rule.weekdays.days != WeekdaySet::all() {
            mask |= Self::WEEKDAY;
        }
        if !rule.weekdays.nth.is_empty() {
            mask |= Self::NTH_WEEKDAY;
        }
        if !rule.weekdays.holidays.is_empty() {
            mask |= Self::HOLIDAY;
        }
        mask
    }
}

/// How the day-by-day schedule repeats outside the volatile window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Periodicity {
    /// No rule can match any more: every day is the same.
    Constant,
    /// Only plain weekdays, times and holidays: repeats every 7 days.
    Weekly,
    /// Months and dates without weekdays or ISO weeks: repeats with the calendar year.
    Yearly,
    /// Anything mixing weekdays with months, dates, nth weekdays or ISO weeks.
    Gregorian,
}

impl Periodicity {
    fn classify(mask: SelectorMask) -> Self {
        let calendar = SelectorMask::MONTH | SelectorMask::DATE;
        let weekday_based = SelectorMask::WEEKDAY | SelectorMask::NTH_WEEKDAY | SelectorMask::WEEK;
        if !mask.intersects(calendar | SelectorMask::NTH_WEEKDAY | SelectorMask::WEEK) {
            Periodicity::Weekly
        } else if !mask.intersects(weekday_based) {
            Periodicity::Yearly
        } else {
            Periodicity::Gregorian
        }
    }

    /// First day at which a scan that started at `base` has covered a full period.
    fn after(self, base: NaiveDate) -> Option<NaiveDate> {
        match self {
            Periodicity::Constant => calendar::add_days(base, 1),
            Periodicity::Weekly => calendar::add_days(base, 7),
            Periodicity::Yearly => calendar::first_of_year(base.year() + 1 + YEARLY_SCAN_YEARS),
            Periodicity::Gregorian => calendar::add_days(base, GREGORIAN_CYCLE_DAYS),
        }
    }

    /// Mirror of [`Periodicity::after`] for backward scans.
    fn before(self, base: NaiveDate) -> Option<NaiveDate> {
        match self {
            Periodicity::Constant => calendar::add_days(base, -1),
            Periodicity::Weekly => calendar::add_days(base, -7),
            Periodicity::Yearly => calendar::first_of_year(base.year() - YEARLY_SCAN_YEARS),
            Periodicity::Gregorian => calendar::add_days(base, -GREGORIAN_CYCLE_DAYS),
        }
    }
}

/// Periodicity plus the dated window of a rule set under a context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleAnalysis {
    pub mask: SelectorMask,
    /// Periodicity of the whole rule set, ignoring when rules start or end.
    pub periodicity: Periodicity,
    /// First and last dates at which dated selectors can still change behaviour.
    pub volatile: Option<(NaiveDate, NaiveDate)>,
    lifetimes: Vec<Lifetime>,
}

/// Days on which a single rule can match at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Lifetime {
    mask: SelectorMask,
    first: Option<NaiveDate>,
    last: Option<NaiveDate>,
}

impl Lifetime {
    fn of(rule: &Rule) -> Self {
        let (year_first, year_last) = span(rule.years.iter().map(|years| {
            let first = calendar::first_of_year(years.start)?;
            Some((first, years.end.map(|end| NaiveDate::from_ymd_opt(end, 12, 31))))
        }));
        let (date_first, date_last) = span(rule.monthdays.iter().map(|range| {
            let (from, until) = range.absolute_bounds()?;
            Some((from, until.map(|until| until.pred_opt())))
        }));

        Self {
            mask: SelectorMask::of_rule(rule),
            first: year_first.max(date_first),
            last: match (year_last, date_last) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            },
        }
    }
}

/// Earliest start and latest end over a list of bounded selectors. Any
/// unbounded entry leaves that side open.
fn span<I>(bounds: I) -> (Option<NaiveDate>, Option<NaiveDate>)
where
    I: Iterator<Item = Option<(NaiveDate, Option<Option<NaiveDate>>)>>,
{
    let mut first: Option<NaiveDate> = None;
    let mut last: Option<NaiveDate> = None;
    let mut open_end = false;
    let mut any = false;
    for bound in bounds {
        let Some((from, until)) = bound else { return (None, None) };
        any = true;
        first = Some(first.map_or(from, |first| first.min(from)));
        match until.flatten() {
            Some(until) => last = Some(last.map_or(until, |last| last.max(until))),
            None => open_end = true,
        }
    }
    if !any {
        return (None, None);
    }
    (first, if open_end { None } else { last })
}

impl RuleAnalysis {
    pub fn new(rules: &[Rule], context: &Context) -> Self {
        let mask = SelectorMask::of(rules);
        let mut window = Window::default();

        for rule in rules {
            for years in &rule.years {
                window.add(calendar::first_of_year(years.start));
                window.add(years.end.and_then(|end| NaiveDate::from_ymd_opt(end, 12, 31)));
            }
            for range in &rule.monthdays {
                if let Some((from, until)) = range.absolute_bounds() {
                    window.add(Some(from));
                    window.add(until.and_then(|until| until.pred_opt()));
                }
            }
            for kind in &rule.weekdays.holidays {
                let set = match kind {
                    HolidayKind::Public => &context.public_holidays,
                    HolidayKind::School => &context.school_holidays,
                };
                window.add(set.first());
                window.add(set.last());
            }
        }

        Self {
            mask,
            periodicity: Periodicity::classify(mask),
            volatile: window.bounds,
            lifetimes: rules.iter().map(Lifetime::of).collect(),
        }
    }

    /// Periodicity of the rules that can still match on or after `date`.
    pub fn periodicity_after(&self, date: NaiveDate) -> Periodicity {
        let live: Vec<&Lifetime> =
            self.lifetimes.iter().filter(|lifetime| lifetime.last.is_none_or(|last| last >= date)).collect();
        Self::classify_live(&live)
    }

    /// Periodicity of the rules that can already match on or before `date`.
    pub fn periodicity_before(&self, date: NaiveDate) -> Periodicity {
        let live: Vec<&Lifetime> =
            self.lifetimes.iter().filter(|lifetime| lifetime.first.is_none_or(|first| first <= date)).collect();
        Self::classify_live(&live)
    }

    fn classify_live(live: &[&Lifetime]) -> Periodicity {
        if live.is_empty() {
            return Periodicity::Constant;
        }
        Periodicity::classify(live.iter().fold(SelectorMask::empty(), |mask, lifetime| mask | lifetime.mask))
    }

    /// Day after which a forward scan from `from` without any change proves the
    /// state never changes. `None` if that day is beyond the calendar.
    pub fn forward_proof_end(&self, from: NaiveDate) -> Option<NaiveDate> {
        let base = match self.volatile {
            Some((_, hi)) => from.max(hi.succ_opt()?),
            None => from,
        };
        calendar::add_days(self.periodicity_after(base).after(base)?, OVERFLOW_SLACK_DAYS)
    }

    /// Backward counterpart of [`RuleAnalysis::forward_proof_end`].
    pub fn backward_proof_start(&self, from: NaiveDate) -> Option<NaiveDate> {
        let base = match self.volatile {
            Some((lo, _)) => from.min(lo.pred_opt()?),
            None => from,
        };
        calendar::add_days(self.periodicity_before(base).before(base)?, -OVERFLOW_SLACK_DAYS)
    }
}

#[derive(Default)]
struct Window {
    bounds: Option<(NaiveDate, NaiveDate)>,
}

impl Window {
    fn add(&mut self, date: Option<NaiveDate>) {
        let Some(date) = date else { return };
        self.bounds = Some(match self.bounds {
            Some((lo, hi)) => (lo.min(date), hi.max(date)),
            None => (date, date),
        });
    }
}
