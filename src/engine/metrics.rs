//! Query metrics.
//!
//! Plain structs filled in by the `*_with_metrics` query variants, for
//! profiling and for the CLI's `--verbose` output. The normal query path does
//! not collect them.

use std::time::Duration;

use chrono::NaiveDateTime;

use crate::error::Error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SearchMetrics {
    /// Number of owned day layers built (cache hits are not counted).
    pub days_evaluated: usize,
    /// Total elapsed time for the query.
    pub elapsed: Duration,
}

/// `next_change` output bundled with timing information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextChangeRun {
    pub result: Result<Option<NaiveDateTime>, Error>,
    pub metrics: SearchMetrics,
}
