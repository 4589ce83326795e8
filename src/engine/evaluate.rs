//! Day-by-day rule evaluation.
//!
//! Every date owns a layer of painted segments covering 00:00..48:00 of that
//! date, produced by folding the rules that match it in declaration order. The
//! effective schedule of a day is its own layer up to 24:00 with the previous
//! day's overflow (24:00..48:00, shifted back one day) painted on top.
//!
//! ```text
//!   Mo layer:  |------ 09:00-18:00 ------|   |22:00 ........ 02:00|
//!   Tu layer:  |off ..........................|
//!   Tu day:    |02:00|off ....................|
//!               ^ Monday's overflow
//! ```

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use tracing::trace;

use super::analysis::RuleAnalysis;
use crate::Context;
use crate::calendar::{self, MINUTES_PER_DAY};
use crate::rule::{Combination, Rule, State};

/// Owned layers kept around; enough for scanning in either direction without
/// rebuilding a day twice.
const LAYER_CACHE_SIZE: usize = 3;

/// What a segment of the timeline says. Two instants have the same status iff
/// nothing changes between them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Status {
    pub state: State,
    pub open_end: bool,
    pub comment: Option<Arc<str>>,
}

impl Status {
    pub(crate) const CLOSED: Status = Status { state: State::Closed, open_end: false, comment: None };

    /// Closed without a comment: nothing worth storing.
    fn is_gap(&self) -> bool {
        self.state == State::Closed && self.comment.is_none()
    }

    fn comment_string(&self) -> Option<String> {
        self.comment.as_deref().map(str::to_string)
    }
}

/// `[start, end)` in minutes since midnight of the day it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Segment {
    pub start: u32,
    pub end: u32,
    pub status: Status,
}

/// A segment placed on the absolute timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Run {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub status: Status,
}

/// The maximal stretch of unchanged state around an instant.
///
/// A bound is `None` when no change was found within the search horizon in
/// that direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interval {
    pub start: Option<NaiveDateTime>,
    pub end: Option<NaiveDateTime>,
    pub state: State,
    pub open_end: bool,
    pub comment: Option<String>,
}

impl Interval {
    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start.is_none_or(|start| start <= instant) && self.end.is_none_or(|end| instant < end)
    }
}

/// Answer to "what is the state at this instant".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedState {
    pub state: State,
    pub comment: Option<String>,
    /// Set for open and unknown states.
    pub interval: Option<Interval>,
}

impl EvaluatedState {
    pub fn is_open(&self) -> bool {
        self.state == State::Open
    }

    pub fn open_end(&self) -> bool {
        self.interval.as_ref().is_some_and(|interval| interval.open_end)
    }
}

/// Paint `status` over `[start, end)`, replacing whatever was there.
fn paint(layer: &mut Vec<Segment>, start: u32, end: u32, status: Status) {
    let mut painted = Vec::with_capacity(layer.len() + 2);
    for segment in layer.drain(..) {
        if segment.end <= start || segment.start >= end {
            painted.push(segment);
            continue;
        }
        if segment.start < start {
            painted.push(Segment { start: segment.start, end: start, status: segment.status.clone() });
        }
        if segment.end > end {
            painted.push(Segment { start: end, end: segment.end, status: segment.status });
        }
    }
    if !status.is_gap() {
        painted.push(Segment { start, end, status });
    }
    painted.sort_by_key(|segment| segment.start);
    *layer = painted;
}

fn push_merged(day: &mut Vec<Segment>, segment: Segment) {
    match day.last_mut() {
        Some(last) if last.end == segment.start && last.status == segment.status => last.end = segment.end,
        _ => day.push(segment),
    }
}

/// Turn a sparse layer into segments covering the whole day.
fn fill_gaps(layer: Vec<Segment>) -> Vec<Segment> {
    let mut day = Vec::with_capacity(layer.len() * 2 + 1);
    let mut cursor = 0;
    for segment in layer {
        if segment.start > cursor {
            push_merged(&mut day, Segment { start: cursor, end: segment.start, status: Status::CLOSED });
        }
        cursor = segment.end;
        push_merged(&mut day, segment);
    }
    if cursor < MINUTES_PER_DAY {
        push_merged(&mut day, Segment { start: cursor, end: MINUTES_PER_DAY, status: Status::CLOSED });
    }
    day
}

/// Lazily evaluated timeline of a rule set.
///
/// Not shared between threads: each query builds its own.
pub(crate) struct Timeline<'a> {
    rules: &'a [Rule],
    context: &'a Context,
    comments: Vec<Option<Arc<str>>>,
    layers: VecDeque<(NaiveDate, Vec<Segment>)>,
    days_evaluated: usize,
}

impl<'a> Timeline<'a> {
    pub(crate) fn new(rules: &'a [Rule], context: &'a Context) -> Self {
        let comments = rules.iter().map(|rule| rule.comment.as_deref().map(Arc::from)).collect();
        Self { rules, context, comments, layers: VecDeque::with_capacity(LAYER_CACHE_SIZE), days_evaluated: 0 }
    }

    pub(crate) fn days_evaluated(&self) -> usize {
        self.days_evaluated
    }

    fn owned_layer(&mut self, date: NaiveDate) -> Vec<Segment> {
        if let Some((_, layer)) = self.layers.iter().find(|(cached, _)| *cached == date) {
            return layer.clone();
        }

        self.days_evaluated += 1;
        let mut layer = Vec::new();
        let mut matched = false;
        for (rule, comment) in self.rules.iter().zip(&self.comments) {
            if rule.combination == Combination::Fallback && matched {
                continue;
            }
            if !rule.matches_date(date, self.context) {
                continue;
            }
            if rule.combination != Combination::Additional {
                layer.clear();
            }
            matched = true;
            for (start, end, open_end) in rule.resolved_spans(self.context) {
                paint(&mut layer, start, end, Status { state: rule.state, open_end, comment: comment.clone() });
            }
        }

        if self.layers.len() == LAYER_CACHE_SIZE {
            self.layers.pop_front();
        }
        self.layers.push_back((date, layer.clone()));
        layer
    }

    /// Effective schedule of `date`: sorted segments covering 00:00..24:00.
    pub(crate) fn day(&mut self, date: NaiveDate) -> Vec<Segment> {
        let previous = date.pred_opt().map(|previous| self.owned_layer(previous)).unwrap_or_default();
        let mut layer: Vec<Segment> = self
            .owned_layer(date)
            .into_iter()
            .filter(|segment| segment.start < MINUTES_PER_DAY)
            .map(|segment| Segment { end: segment.end.min(MINUTES_PER_DAY), ..segment })
            .collect();

        for segment in previous {
            if segment.end > MINUTES_PER_DAY {
                let start = segment.start.saturating_sub(MINUTES_PER_DAY);
                paint(&mut layer, start, segment.end - MINUTES_PER_DAY, segment.status);
            }
        }

        let day = fill_gaps(layer);
        trace!(%date, segments = day.len(), "evaluated day");
        day
    }

    /// Schedule of `date` on the absolute timeline.
    pub(crate) fn runs(&mut self, date: NaiveDate) -> Vec<Run> {
        self.day(date)
            .into_iter()
            .map(|segment| Run {
                start: calendar::at_minutes(date, segment.start),
                end: calendar::at_minutes(date, segment.end),
                status: segment.status,
            })
            .collect()
    }

    pub(crate) fn status_at(&mut self, instant: NaiveDateTime) -> Status {
        let second = calendar::second_of_day(instant);
        self.day(instant.date())
            .into_iter()
            .find(|segment| segment.start * 60 <= second && second < segment.end * 60)
            .map_or(Status::CLOSED, |segment| segment.status)
    }

    /// First instant after `from` whose status differs from `status`, looking
    /// at days up to and including `stop`.
    pub(crate) fn scan_forward(
        &mut self, from: NaiveDateTime, status: &Status, stop: NaiveDate,
    ) -> Option<NaiveDateTime> {
        let mut date = from.date();
        while date <= stop {
            let change = self.runs(date).into_iter().find(|run| run.end > from && run.status != *status);
            if let Some(run) = change {
                return Some(run.start);
            }
            date = date.succ_opt()?;
        }
        None
    }

    /// Start of the stretch of `status` that contains `until`, looking at days
    /// down to and including `floor`.
    pub(crate) fn scan_backward(
        &mut self, until: NaiveDateTime, status: &Status, floor: NaiveDate,
    ) -> Option<NaiveDateTime> {
        let mut date = until.date();
        while date >= floor {
            let change = self.runs(date).into_iter().rev().find(|run| run.start <= until && run.status != *status);
            if let Some(run) = change {
                return Some(run.end);
            }
            date = date.pred_opt()?;
        }
        None
    }

    /// Maximal interval of unchanged state around `instant`; `None` when closed.
    pub(crate) fn interval_containing(
        &mut self, analysis: &RuleAnalysis, max_search_years: u32, instant: NaiveDateTime,
    ) -> Option<Interval> {
        let status = self.status_at(instant);
        if status.state == State::Closed {
            return None;
        }
        let horizon = Horizon::new(analysis, max_search_years, instant.date());
        Some(Interval {
            start: self.scan_backward(instant, &status, horizon.floor),
            end: self.scan_forward(instant, &status, horizon.stop),
            state: status.state,
            open_end: status.open_end,
            comment: status.comment_string(),
        })
    }

    pub(crate) fn state_at(
        &mut self, analysis: &RuleAnalysis, max_search_years: u32, instant: NaiveDateTime,
    ) -> EvaluatedState {
        let status = self.status_at(instant);
        let interval = self.interval_containing(analysis, max_search_years, instant);
        EvaluatedState { state: status.state, comment: status.comment_string(), interval }
    }
}

/// How far a scan from some date may go in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Horizon {
    /// Last day a forward scan looks at.
    pub stop: NaiveDate,
    /// Whether reaching `stop` without a change proves there is none.
    pub proven: bool,
    /// Last day a backward scan looks at.
    pub floor: NaiveDate,
}

impl Horizon {
    pub(crate) fn new(analysis: &RuleAnalysis, max_search_years: u32, date: NaiveDate) -> Self {
        let cap = calendar::add_years(date, max_search_years);
        let (stop, proven) = match analysis.forward_proof_end(date) {
            Some(proof) if proof <= cap => (proof, true),
            _ => (cap, false),
        };

        let cap = calendar::sub_years(date, max_search_years);
        let floor = analysis.backward_proof_start(date).map_or(cap, |proof| proof.max(cap));

        Self { stop, proven, floor }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OpeningHours;

    fn segments(raw: &str, date: NaiveDate) -> Vec<(u32, u32, State)> {
        let hours = OpeningHours::parse(raw).unwrap();
        let mut timeline = Timeline::new(hours.rules(), hours.context());
        timeline.day(date).into_iter().map(|s| (s.start, s.end, s.status.state)).collect()
    }

    #[test]
    fn paint_splits_existing_segments() {
        let open = Status { state: State::Open, open_end: false, comment: None };
        let mut layer = vec![Segment { start: 480, end: 1080, status: open.clone() }];
        paint(&mut layer, 720, 780, Status::CLOSED);
        assert_eq!(
            layer,
            vec![
                Segment { start: 480, end: 720, status: open.clone() },
                Segment { start: 780, end: 1080, status: open },
            ]
        );
    }

    #[test]
    fn day_covers_midnight_to_midnight() {
        // 2024-05-13 is a Monday.
        assert_eq!(segments("Mo 09:00-18:00", date!("2024-05-13")), vec![
            (0, 540, State::Closed),
            (540, 1080, State::Open),
            (1080, 1440, State::Closed),
        ]);
        assert_eq!(segments("Mo 09:00-18:00", date!("2024-05-14")), vec![(0, 1440, State::Closed)]);
    }

    #[test]
    fn override_replaces_the_whole_day() {
        assert_eq!(segments("Mo-Su 09:00-18:00; Tu off", date!("2024-05-14")), vec![(0, 1440, State::Closed)]);
        assert_eq!(segments("Mo-Su 09:00-18:00; Tu 10:00-12:00", date!("2024-05-14")), vec![
            (0, 600, State::Closed),
            (600, 720, State::Open),
            (720, 1440, State::Closed),
        ]);
    }

    #[test]
    fn additional_paints_on_top() {
        assert_eq!(segments("Mo-Fr 08:00-12:00, We 14:00-18:00", date!("2024-05-15")), vec![
            (0, 480, State::Closed),
            (480, 720, State::Open),
            (720, 840, State::Closed),
            (840, 1080, State::Open),
            (1080, 1440, State::Closed),
        ]);
        assert_eq!(segments("Mo-Fr 08:00-18:00, We 12:00-14:00 off", date!("2024-05-15")), vec![
            (0, 480, State::Closed),
            (480, 720, State::Open),
            (720, 840, State::Closed),
            (840, 1080, State::Open),
            (1080, 1440, State::Closed),
        ]);
    }

    #[test]
    fn fallback_only_fills_unmatched_days() {
        let raw = "Mo-Fr 09:00-17:00 || \"by appointment\"";
        assert_eq!(segments(raw, date!("2024-05-13"))[1], (540, 1020, State::Open));
        assert_eq!(segments(raw, date!("2024-05-18")), vec![(0, 1440, State::Unknown)]);
    }

    #[test]
    fn overflow_belongs_to_the_starting_day() {
        let raw = "Mo 22:00-02:00; Tu off";
        assert_eq!(segments(raw, date!("2024-05-14")), vec![(0, 120, State::Open), (120, 1440, State::Closed)]);
    }

    #[test]
    fn timeline_reuses_cached_layers() {
        let hours = OpeningHours::parse("Mo-Fr 09:00-17:00").unwrap();
        let mut timeline = Timeline::new(hours.rules(), hours.context());
        timeline.day(date!("2024-05-13"));
        timeline.day(date!("2024-05-14"));
        timeline.day(date!("2024-05-15"));
        assert_eq!(timeline.days_evaluated(), 4);
    }

    #[test]
    fn interval_contains_its_instant() {
        let interval = Interval {
            start: Some(datetime!("2024-05-13 22:00")),
            end: Some(datetime!("2024-05-14 04:00")),
            state: State::Open,
            open_end: false,
            comment: None,
        };
        assert!(interval.contains(datetime!("2024-05-13 23:30")));
        assert!(!interval.contains(datetime!("2024-05-14 04:00")));
    }
}
