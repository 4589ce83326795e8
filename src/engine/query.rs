//! Queries over the evaluated timeline: next change, open intervals and the
//! per-day views built on top of them.

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use tracing::debug;

use super::analysis::RuleAnalysis;
use super::evaluate::{Horizon, Run, Timeline};
use crate::Context;
use crate::calendar;
use crate::error::{Error, Result};
use crate::rule::{Rule, State};

/// An open (or unknown) stretch of time, clipped to the queried range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenInterval {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub state: State,
    pub open_end: bool,
    pub comment: Option<String>,
}

impl OpenInterval {
    pub fn is_unknown(&self) -> bool {
        self.state == State::Unknown
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// One day of a weekly overview.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub weekday: Weekday,
    /// `Open` if the place opens at all that day, `Unknown` if it only has
    /// unknown stretches, `Closed` otherwise.
    pub status: State,
    /// Intervals starting that day; one that runs past midnight keeps its real end.
    pub spans: Vec<(NaiveTime, NaiveTime)>,
}

/// Borrowed view of a parsed rule set ready to answer queries.
pub(crate) struct Query<'a> {
    pub rules: &'a [Rule],
    pub context: &'a Context,
    pub analysis: &'a RuleAnalysis,
}

impl Query<'_> {
    fn timeline(&self) -> Timeline<'_> {
        Timeline::new(self.rules, self.context)
    }

    /// Nearest instant after `from` at which the state, comment or open-end
    /// flag changes. Also returns the number of days evaluated.
    pub(crate) fn next_change(&self, from: NaiveDateTime) -> (Result<Option<NaiveDateTime>>, usize) {
        let mut timeline = self.timeline();
        let years = self.context.max_search_years;
        let horizon = Horizon::new(self.analysis, years, from.date());
        let status = timeline.status_at(from);

        let result = match timeline.scan_forward(from, &status, horizon.stop) {
            Some(change) => Ok(Some(change)),
            None if horizon.proven => Ok(None),
            None => Err(Error::SearchExhausted { from, years }),
        };
        debug!(%from, ?result, days = timeline.days_evaluated(), "next change");
        (result, timeline.days_evaluated())
    }

    /// Open and unknown intervals intersecting `[from, to)`.
    pub(crate) fn open_intervals(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<OpenInterval> {
        if from >= to {
            return Vec::new();
        }

        let mut timeline = self.timeline();
        let last = (to - Duration::seconds(1)).date();
        let mut merged: Vec<Run> = Vec::new();
        let mut date = from.date();
        loop {
            for run in timeline.runs(date) {
                if run.status.state == State::Closed {
                    continue;
                }
                match merged.last_mut() {
                    Some(previous) if previous.end == run.start && previous.status == run.status => {
                        previous.end = run.end;
                    }
                    _ => merged.push(run),
                }
            }
            match date.succ_opt() {
                Some(next) if next <= last => date = next,
                _ => break,
            }
        }

        let intervals: Vec<OpenInterval> = merged
            .into_iter()
            .map(|run| OpenInterval {
                start: run.start.max(from),
                end: run.end.min(to),
                state: run.status.state,
                open_end: run.status.open_end,
                comment: run.status.comment.as_deref().map(str::to_string),
            })
            .filter(|interval| interval.start < interval.end)
            .collect();
        debug!(%from, %to, count = intervals.len(), "open intervals");
        intervals
    }

    /// Intervals of one day. With `overlap_next_day`, intervals starting that
    /// day keep their real end (unless they last more than a day) and those
    /// carried over from the day before are dropped.
    pub(crate) fn intervals_on(&self, date: NaiveDate, overlap_next_day: bool) -> Vec<OpenInterval> {
        let start = calendar::day_start(date);
        let end = calendar::shift_days(start, 1);
        let query_from = calendar::shift_days(start, -1);
        let query_to = calendar::shift_days(end, 1);

        self.open_intervals(query_from, query_to)
            .into_iter()
            .filter_map(|mut interval| {
                if interval.end <= start || interval.start >= end {
                    return None;
                }
                if !overlap_next_day || interval.duration() > Duration::days(1) {
                    interval.start = interval.start.max(start);
                    interval.end = interval.end.min(end);
                }
                if overlap_next_day && !(start <= interval.start && interval.start < end) {
                    return None;
                }
                Some(interval)
            })
            .collect()
    }

    pub(crate) fn is_open_on(&self, date: NaiveDate) -> bool {
        let start = calendar::day_start(date);
        !self.open_intervals(start, calendar::shift_days(start, 1)).is_empty()
    }

    /// Monday to Sunday of the ISO week containing `date`.
    pub(crate) fn week_schedule(&self, date: NaiveDate) -> Vec<DaySummary> {
        let offset = -i64::from(date.weekday().num_days_from_monday());
        let monday = calendar::add_days(date, offset).unwrap_or(NaiveDate::MIN);
        monday
            .iter_days()
            .take(7)
            .map(|day| {
                let intervals = self.intervals_on(day, true);
                let status = if intervals.iter().any(|i| i.state == State::Open) {
                    State::Open
                } else if intervals.iter().any(|i| i.state == State::Unknown) {
                    State::Unknown
                } else {
                    State::Closed
                };
                DaySummary {
                    date: day,
                    weekday: day.weekday(),
                    status,
                    spans: intervals.iter().map(|i| (i.start.time(), i.end.time())).collect(),
                }
            })
            .collect()
    }
}
