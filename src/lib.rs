//! Opening hours expressions (the OpenStreetMap `opening_hours` language),
//! parsed once and evaluated against naive local timestamps.
//!
//! ```
//! use chrono::NaiveDate;
//! use openhours::{OpeningHours, State};
//!
//! let hours = OpeningHours::parse("Mo-Fr 09:00-18:00; Tu off").unwrap();
//! let tuesday = NaiveDate::from_ymd_opt(2024, 5, 14).unwrap().and_hms_opt(10, 0, 0).unwrap();
//! assert_eq!(hours.state(tuesday), State::Closed);
//! ```

#[macro_use]
mod macros;
mod api;
mod calendar;
pub mod engine;
mod error;
mod rule;

pub use api::{
    Context, DEFAULT_MAX_SEARCH_YEARS, IsoInterval, NAIVE_ISO_FORMAT, OpeningHours, SolarTimes, format_naive_iso,
    is_open, next_change, open_intervals, parse_naive_iso, validate,
};
pub use calendar::HolidaySet;
pub use engine::{DaySummary, EvaluatedState, Interval, NextChangeRun, OpenInterval, SearchMetrics, tokenize};
pub use error::{Error, LexError, LexErrorKind, Result, SyntaxError};
pub use rule::{
    Combination, DateSpec, HolidayJoin, HolidayKind, MonthdayRange, NthSet, Rule, SolarEvent, State, TimeRef,
    TimeSpan, WeekRange, WeekdaySelector, WeekdaySet, YearRange,
};

/// Parse `raw` into its rules without building an [`OpeningHours`].
pub fn parse_rules(raw: &str) -> Result<Vec<Rule>> {
    let tokens = tokenize(raw)?;
    Ok(engine::parse(&tokens)?)
}
