//! # engine::locker
//!
//! **Opening-Range Locker**: freezes the first bar of the session per
//! instrument.
//!
//! Check-and-create runs under one write lock, so two closings of the same
//! interval can never both lock. A prior day's range is replaced only by
//! the next session's opening bar; within a session the range is final.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::info;

use crate::engine::clock::SessionClock;
use crate::models::{Bar, OpeningRange};

#[derive(Debug, Clone, PartialEq)]
pub enum LockOutcome {
    /// This bar just became the opening range
    Locked(OpeningRange),
    /// This is the opening bar, but the session's range was locked already
    AlreadyLocked,
    /// Not the opening bar
    NotOpeningBar,
}

/// Shared registry of locked ranges, keyed by symbol.
#[derive(Debug, Clone, Default)]
pub struct RangeBook {
    inner: Arc<RwLock<HashMap<String, OpeningRange>>>,
}

impl RangeBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer a closed bar to the locker.
    pub async fn observe(&self, bar: &Bar, clock: &SessionClock) -> LockOutcome {
        let session_date = clock.session_date(bar.start);
        if clock.opening_bucket(session_date) != Some(bar.start) {
            return LockOutcome::NotOpeningBar;
        }

        let mut ranges = self.inner.write().await;
        if let Some(existing) = ranges.get(&bar.symbol) {
            if existing.session_date >= session_date {
                return LockOutcome::AlreadyLocked;
            }
            info!(
                symbol   = %bar.symbol,
                previous = %existing.session_date,
                session  = %session_date,
                "📅 New session, previous opening range retired"
            );
        }

        let range = OpeningRange {
            symbol:    bar.symbol.clone(),
            session_date,
            bar_start: bar.start,
            high:      bar.high,
            low:       bar.low,
            locked_at: Utc::now(),
        };
        ranges.insert(bar.symbol.clone(), range.clone());

        info!(
            symbol = %range.symbol,
            high   = range.high,
            low    = range.low,
            start  = %range.bar_start,
            "🔒 Opening range locked"
        );
        LockOutcome::Locked(range)
    }

    /// Range for `symbol` belonging to `session_date`, if locked.
    pub async fn get(&self, symbol: &str, session_date: NaiveDate) -> Option<OpeningRange> {
        let ranges = self.inner.read().await;
        ranges
            .get(symbol)
            .filter(|r| r.session_date == session_date)
            .cloned()
    }

    /// Every locked range (clone out to release the lock).
    pub async fn all(&self) -> Vec<OpeningRange> {
        let ranges = self.inner.read().await;
        let mut all: Vec<_> = ranges.values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
