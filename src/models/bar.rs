//! # models::bar
//!
//! Defines [`Bar`]: one closed, immutable OHLC interval for one instrument.
//!
//! A `Bar` only exists once its interval has fully elapsed and been observed
//! as closed. Still-forming data lives in the aggregator's accumulator and
//! never leaves it as a `Bar` until the boundary is crossed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    /// Interval start, aligned to the bar grid. Doubles as the bar identity.
    pub start: DateTime<Utc>,
    pub open:  f64,
    pub high:  f64,
    pub low:   f64,
    pub close: f64,
}

impl Bar {
    /// Exclusive end of the interval.
    #[inline]
    pub fn end(&self, interval_secs: i64) -> DateTime<Utc> {
        self.start + Duration::seconds(interval_secs)
    }
}

/// Returns the reason a price quadruple is unusable, if any.
pub fn malformed_reason(open: f64, high: f64, low: f64, close: f64) -> Option<&'static str> {
    if ![open, high, low, close].iter().all(|p| p.is_finite()) {
        return Some("non-finite price");
    }
    if high < low {
        return Some("high below low");
    }
    if open < low || open > high {
        return Some("open outside high/low");
    }
    if close < low || close > high {
        return Some("close outside high/low");
    }
    None
}
