//! # models::range
//!
//! Defines [`OpeningRange`]: the high/low of the session's first bar.
//! Created at most once per instrument per session and never mutated.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpeningRange {
    pub symbol:       String,
    /// Market-timezone calendar date of the session this range belongs to.
    pub session_date: NaiveDate,
    /// Interval start of the opening bar.
    pub bar_start:    DateTime<Utc>,
    pub high:         f64,
    pub low:          f64,
    pub locked_at:    DateTime<Utc>,
}
