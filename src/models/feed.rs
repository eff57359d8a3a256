//! # models::feed
//!
//! Wire types the feed collaborator pushes (HTTP) or the poller fetches.
//! Timestamps are RFC 3339 UTC, same as the rest of the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One element of a discrete bar buffer (no symbol: the buffer carries it).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedBar {
    /// Bar interval start.
    pub time:  DateTime<Utc>,
    pub open:  f64,
    pub high:  f64,
    pub low:   f64,
    pub close: f64,
}

/// Discrete mode: the whole keep-up-to-date bar buffer, ascending by time.
///
/// `has_new_bar = true` means the last element just started forming, so the
/// element before it has closed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscreteBarUpdate {
    pub symbol:      String,
    pub bars:        Vec<FeedBar>,
    #[serde(default)]
    pub has_new_bar: bool,
}

/// Tick mode: one small fixed-size snapshot (e.g. a 5-second real-time bar)
/// with OHLC for its own sub-interval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub symbol: String,
    pub time:   DateTime<Utc>,
    pub open:   f64,
    pub high:   f64,
    pub low:    f64,
    pub close:  f64,
}

#[derive(Debug, Clone)]
pub enum FeedEvent {
    Bars(DiscreteBarUpdate),
    Tick(TickSnapshot),
}

impl FeedEvent {
    pub fn symbol(&self) -> &str {
        match self {
            FeedEvent::Bars(update) => &update.symbol,
            FeedEvent::Tick(tick) => &tick.symbol,
        }
    }
}
