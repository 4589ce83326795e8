use std::fmt;
use std::str::FromStr;
use std::time::Instant;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::debug;

use crate::calendar::HolidaySet;
use crate::engine::{
    self, DaySummary, EvaluatedState, Interval, NextChangeRun, OpenInterval, Query, RuleAnalysis, SearchMetrics,
    Timeline,
};
use crate::error::{Error, Result};
use crate::rule::{Rule, SolarEvent, State};

/// Default forward (and backward) search horizon for change queries.
pub const DEFAULT_MAX_SEARCH_YEARS: u32 = 10;

/// Format of naive timestamps on the string surface.
pub const NAIVE_ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Local times used for `dawn`, `sunrise`, `sunset` and `dusk`.
///
/// The engine does no astronomy; callers that care supply the times for the
/// place they evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolarTimes {
    dawn: u32,
    sunrise: u32,
    sunset: u32,
    dusk: u32,
}

impl Default for SolarTimes {
    fn default() -> Self {
        Self { dawn: 5 * 60 + 30, sunrise: 6 * 60, sunset: 18 * 60, dusk: 18 * 60 + 30 }
    }
}

impl SolarTimes {
    pub fn with(mut self, event: SolarEvent, time: NaiveTime) -> Self {
        let minutes = time.hour() * 60 + time.minute();
        match event {
            SolarEvent::Dawn => self.dawn = minutes,
            SolarEvent::Sunrise => self.sunrise = minutes,
            SolarEvent::Sunset => self.sunset = minutes,
            SolarEvent::Dusk => self.dusk = minutes,
        }
        self
    }

    /// Minutes since midnight.
    pub fn minutes(&self, event: SolarEvent) -> u32 {
        match event {
            SolarEvent::Dawn => self.dawn,
            SolarEvent::Sunrise => self.sunrise,
            SolarEvent::Sunset => self.sunset,
            SolarEvent::Dusk => self.dusk,
        }
    }
}

/// Evaluation context.
///
/// Holds everything outside the expression itself that evaluation depends on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    /// Dates matched by `PH`.
    pub public_holidays: HolidaySet,
    /// Dates matched by `SH`.
    pub school_holidays: HolidaySet,
    pub solar: SolarTimes,
    /// How many years change queries look ahead (and back) before giving up.
    pub max_search_years: u32,
}

impl Default for Context {
    fn default() -> Self {
        Self {
            public_holidays: HolidaySet::new(),
            school_holidays: HolidaySet::new(),
            solar: SolarTimes::default(),
            max_search_years: DEFAULT_MAX_SEARCH_YEARS,
        }
    }
}

impl Context {
    pub fn with_public_holidays(mut self, holidays: HolidaySet) -> Self {
        self.public_holidays = holidays;
        self
    }

    pub fn with_school_holidays(mut self, holidays: HolidaySet) -> Self {
        self.school_holidays = holidays;
        self
    }

    pub fn with_solar(mut self, solar: SolarTimes) -> Self {
        self.solar = solar;
        self
    }

    pub fn with_max_search_years(mut self, years: u32) -> Self {
        self.max_search_years = years;
        self
    }
}

/// A parsed opening hours expression.
///
/// Parsing happens once; queries take `&self` and may run from any number of
/// threads at the same time.
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use openhours::OpeningHours;
///
/// let hours: OpeningHours = "Mo-Fr 09:00-18:00; Sa 10:00-14:00".parse().unwrap();
/// let monday = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap().and_hms_opt(10, 0, 0).unwrap();
/// assert!(hours.is_open(monday));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpeningHours {
    raw: String,
    rules: Vec<Rule>,
    context: Context,
    analysis: RuleAnalysis,
}

impl OpeningHours {
    /// Parse `raw` with a default [`Context`].
    pub fn parse(raw: &str) -> Result<Self> {
        let tokens = engine::tokenize(raw)?;
        let rules = engine::parse(&tokens)?;
        debug!(raw, rules = rules.len(), "parsed opening hours");

        let context = Context::default();
        let analysis = RuleAnalysis::new(&rules, &context);
        Ok(Self { raw: raw.to_string(), rules, context, analysis })
    }

    /// Replace the evaluation context.
    pub fn with_context(mut self, context: Context) -> Self {
        self.analysis = RuleAnalysis::new(&self.rules, &context);
        self.context = context;
        self
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn analysis(&self) -> &RuleAnalysis {
        &self.analysis
    }

    fn query(&self) -> Query<'_> {
        Query { rules: &self.rules, context: &self.context, analysis: &self.analysis }
    }

    fn timeline(&self) -> Timeline<'_> {
        Timeline::new(&self.rules, &self.context)
    }

    /// State at `instant`, with the surrounding interval for open and unknown states.
    pub fn state_at(&self, instant: NaiveDateTime) -> EvaluatedState {
        let state = self.timeline().state_at(&self.analysis, self.context.max_search_years, instant);
        debug!(%instant, state = %state.state, "state at");
        state
    }

    pub fn state(&self, instant: NaiveDateTime) -> State {
        self.timeline().status_at(instant).state
    }

    pub fn is_open(&self, instant: NaiveDateTime) -> bool {
        self.state(instant) == State::Open
    }

    /// Maximal interval of unchanged state around `instant`; `None` when closed.
    pub fn interval_containing(&self, instant: NaiveDateTime) -> Option<Interval> {
        self.timeline().interval_containing(&self.analysis, self.context.max_search_years, instant)
    }

    /// Nearest instant strictly after `instant` where the state (or its
    /// comment) changes.
    ///
    /// `Ok(None)` means the state provably never changes again. Running into
    /// [`Context::max_search_years`] first is [`Error::SearchExhausted`].
    pub fn next_change(&self, instant: NaiveDateTime) -> Result<Option<NaiveDateTime>> {
        self.query().next_change(instant).0
    }

    pub fn next_change_with_metrics(&self, instant: NaiveDateTime) -> NextChangeRun {
        let started = Instant::now();
        let (result, days_evaluated) = self.query().next_change(instant);
        NextChangeRun { result, metrics: SearchMetrics { days_evaluated, elapsed: started.elapsed() } }
    }

    /// Open and unknown intervals intersecting `[from, to)`, clipped to it.
    pub fn open_intervals(&self, from: NaiveDateTime, to: NaiveDateTime) -> Vec<OpenInterval> {
        self.query().open_intervals(from, to)
    }

    /// Open at `instant` and never changing afterwards.
    pub fn is_24_7(&self, instant: NaiveDateTime) -> bool {
        self.is_open(instant) && matches!(self.next_change(instant), Ok(None))
    }

    /// Whether any open or unknown interval touches `date`.
    pub fn is_open_on(&self, date: NaiveDate) -> bool {
        self.query().is_open_on(date)
    }

    /// Intervals of `date`. See [`DaySummary::spans`] for `overlap_next_day`.
    pub fn intervals_on(&self, date: NaiveDate, overlap_next_day: bool) -> Vec<OpenInterval> {
        self.query().intervals_on(date, overlap_next_day)
    }

    /// Monday to Sunday of the week containing `date`.
    pub fn week_schedule(&self, date: NaiveDate) -> Vec<DaySummary> {
        self.query().week_schedule(date)
    }
}

impl FromStr for OpeningHours {
    type Err = Error;

    fn from_str(raw: &str) -> Result<Self> {
        Self::parse(raw)
    }
}

impl fmt::Display for OpeningHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

// --- String surface ----------------------------------------------------------

/// An element of [`open_intervals`] with naive ISO timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoInterval {
    pub start: String,
    pub end: String,
    /// The interval's state is unknown rather than open.
    pub unknown: bool,
    pub open_end: bool,
    pub comment: Option<String>,
}

impl From<&OpenInterval> for IsoInterval {
    fn from(interval: &OpenInterval) -> Self {
        Self {
            start: format_naive_iso(interval.start),
            end: format_naive_iso(interval.end),
            unknown: interval.is_unknown(),
            open_end: interval.open_end,
            comment: interval.comment.clone(),
        }
    }
}

/// Parse a `YYYY-MM-DDTHH:MM:SS` timestamp (zero padded, no offset, no fraction).
pub fn parse_naive_iso(raw: &str) -> Result<NaiveDateTime> {
    if !regex!(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}$").is_match(raw) {
        return Err(Error::InvalidTimestamp(raw.to_string()));
    }
    NaiveDateTime::parse_from_str(raw, NAIVE_ISO_FORMAT).map_err(|_| Error::InvalidTimestamp(raw.to_string()))
}

pub fn format_naive_iso(instant: NaiveDateTime) -> String {
    instant.format(NAIVE_ISO_FORMAT).to_string()
}

/// `Ok(())` if `raw` parses, otherwise the parser's message (with its position).
pub fn validate(raw: &str) -> std::result::Result<(), String> {
    OpeningHours::parse(raw).map(|_| ()).map_err(|err| err.to_string())
}

pub fn is_open(raw: &str, instant: &str) -> Result<State> {
    let hours = OpeningHours::parse(raw)?;
    Ok(hours.state(parse_naive_iso(instant)?))
}

pub fn next_change(raw: &str, instant: &str) -> Result<Option<String>> {
    let hours = OpeningHours::parse(raw)?;
    Ok(hours.next_change(parse_naive_iso(instant)?)?.map(format_naive_iso))
}

pub fn open_intervals(raw: &str, from: &str, to: &str) -> Result<Vec<IsoInterval>> {
    let hours = OpeningHours::parse(raw)?;
    let intervals = hours.open_intervals(parse_naive_iso(from)?, parse_naive_iso(to)?);
    Ok(intervals.iter().map(IsoInterval::from).collect())
}
