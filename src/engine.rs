//! Parsing and evaluation engine.
//!
//! This module is the entry point for turning an opening hours expression into
//! answers. It is split into focused submodules under `src/engine/` while the
//! public paths stay flat (for example `crate::engine::tokenize` and
//! `crate::engine::OpenInterval`).
//!
//! ## How the parts work together
//!
//! ```text
//! raw ── tokenize (lexer.rs) ──> Vec<Token>
//!                                   │
//!                                   v
//!                         parse (parser.rs) ──> Vec<Rule>
//!                                   │
//!            RuleAnalysis::new ─────┤  periodicity + dated window (analysis.rs)
//!                                   v
//!                       Timeline (evaluate.rs)
//!                         - owned layer per date, folded rule by rule
//!                         - previous day's overflow painted on top
//!                         - status_at / interval_containing
//!                                   │
//!                                   v
//!                         Query (query.rs)
//!                         - next_change, bounded by the analysis horizon
//!                         - open_intervals, merged across midnight
//!                         - per-day views
//! ```
//!
//! Parsing happens once; every query builds a fresh `Timeline` over the
//! immutable rules, so queries never share mutable state.
//!
//! ## Responsibilities by module
//!
//! - `lexer.rs`: raw text to tokens, strict about unknown characters and words.
//! - `parser.rs`: recursive descent over tokens, including range checks.
//! - `analysis.rs`: which selectors are used, how the schedule repeats, and how
//!   far a search must go to prove the state never changes.
//! - `evaluate.rs`: per-day schedules and the instant-level views on them.
//! - `query.rs`: multi-day queries.
//! - `metrics.rs`: optional counters for a query.
//!
//! ## Debugging
//!
//! Run with `RUST_LOG=openhours=trace` to see every evaluated day.

#[path = "engine/analysis.rs"]
mod analysis;
#[path = "engine/evaluate.rs"]
mod evaluate;
#[path = "engine/lexer.rs"]
mod lexer;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/query.rs"]
mod query;

#[cfg(test)]
#[path = "engine/tests.rs"]
mod tests;

pub use analysis::{Periodicity, RuleAnalysis, SelectorMask};
pub use evaluate::{EvaluatedState, Interval};
pub(crate) use evaluate::Timeline;
pub use lexer::{Keyword, Symbol, Token, TokenKind, tokenize};
pub use metrics::{NextChangeRun, SearchMetrics};
pub use parser::parse;
pub(crate) use query::Query;
pub use query::{DaySummary, OpenInterval};
