//! # engine::aggregator
//!
//! Turns raw feed events into **closed, immutable** [`Bar`]s. Two feed
//! granularities, one output contract:
//!
//! ```text
//! Discrete mode   [.., B(n-1), B(n)] + has_new_bar  ──▶  B(n-1) closed
//!                                                        B(n) still forming, untouched
//!
//! Tick mode       5s tick ─┐
//!                 5s tick ─┼─ same 5m bucket → high=max, low=min, close=last
//!                 5s tick ─┘
//!                 tick in next bucket ──▶ previous bucket emitted as closed Bar
//! ```

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::engine::clock::bucket_start;
use crate::error::BarRejected;
use crate::models::bar::malformed_reason;
use crate::models::{Bar, FeedBar, TickSnapshot};

// ─── Closed Bar ───────────────────────────────────────────────────────────────

/// How the closed bar reached us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarOrigin {
    /// Closed while we were watching → eligible for detection
    Live,
    /// Already-closed history delivered with the first buffer snapshot.
    /// Feeds the Locker only.
    Backfill,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClosedBar {
    pub bar:    Bar,
    pub origin: BarOrigin,
}

// ─── Tick Aggregator ──────────────────────────────────────────────────────────

/// Buckets sub-bar ticks into fixed intervals for one instrument.
#[derive(Debug, Clone)]
pub struct TickAggregator {
    symbol:         String,
    interval_secs:  i64,
    /// Open accumulator (still forming)
    current:        Option<Bar>,
    /// Start of the newest bucket already emitted
    last_finalized: Option<DateTime<Utc>>,
}

impl TickAggregator {
    pub fn new(symbol: &str, interval_secs: i64) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval_secs,
            current: None,
            last_finalized: None,
        }
    }

    /// Still-forming accumulator.
    #[cfg(test)]
    pub fn current(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    /// Feed one tick. Returns the previous bucket as a closed bar when the
    /// tick crosses a boundary.
    pub fn push(&mut self, tick: &TickSnapshot) -> Result<Option<Bar>, BarRejected> {
        if let Some(reason) = malformed_reason(tick.open, tick.high, tick.low, tick.close) {
            return Err(BarRejected::Malformed {
                symbol: self.symbol.clone(),
                time:   tick.time,
                reason,
            });
        }

        let bucket = bucket_start(tick.time, self.interval_secs);

        // ── Never re-open a bucket that has already been emitted ─────────────
        if let Some(last) = self.last_finalized {
            if bucket <= last {
                return Err(BarRejected::StaleTick {
                    symbol:  self.symbol.clone(),
                    bucket,
                    current: self.current.as_ref().map(|c| c.start).unwrap_or(last),
                });
            }
        }

        match self.current.as_mut() {
            // First tick ever (or right after a flush): seed, emit nothing
            None => {
                self.current = Some(self.seed(bucket, tick));
                Ok(None)
            }

            Some(acc) if bucket == acc.start => {
                acc.high  = acc.high.max(tick.high);
                acc.low   = acc.low.min(tick.low);
                acc.close = tick.close;
                Ok(None)
            }

            Some(acc) if bucket < acc.start => Err(BarRejected::StaleTick {
                symbol:  self.symbol.clone(),
                bucket,
                current: acc.start,
            }),

            // Boundary crossed → finalize previous bucket, start the new one
            Some(_) => {
                let fresh  = self.seed(bucket, tick);
                let closed = self.current.replace(fresh);
                if let Some(bar) = &closed {
                    self.last_finalized = Some(bar.start);
                    debug!(symbol = %self.symbol, start = %bar.start, "Bucket closed by boundary tick");
                }
                Ok(closed)
            }
        }
    }

    /// Close the accumulator if its interval ended at least `grace` ago and
    /// no boundary-crossing tick showed up.
    pub fn flush_elapsed(&mut self, now: DateTime<Utc>, grace: Duration) -> Option<Bar> {
        let due = self
            .current
            .as_ref()
            .map(|acc| acc.end(self.interval_secs) + grace <= now)
            .unwrap_or(false);

        if !due {
            return None;
        }

        let closed = self.current.take();
        if let Some(bar) = &closed {
            self.last_finalized = Some(bar.start);
            debug!(symbol = %self.symbol, start = %bar.start, "Bucket closed by elapsed time");
        }
        closed
    }

    fn seed(&self, bucket: DateTime<Utc>, tick: &TickSnapshot) -> Bar {
        Bar {
            symbol: self.symbol.clone(),
            start:  bucket,
            open:   tick.open,
            high:   tick.high,
            low:    tick.low,
            close:  tick.close,
        }
    }
}

// ─── Discrete Bar Tracker ─────────────────────────────────────────────────────

/// Picks newly closed bars out of a keep-up-to-date bar buffer.
#[derive(Debug, Clone)]
pub struct DiscreteBarTracker {
    symbol:       String,
    primed:       bool,
    last_emitted: Option<DateTime<Utc>>,
}

impl DiscreteBarTracker {
    pub fn new(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            primed: false,
            last_emitted: None,
        }
    }

    /// Process one buffer update.
    ///
    /// * First update: every already-closed element (all but the last, and
    ///   all but the just-closed one when `has_new_bar`) comes out as
    ///   [`BarOrigin::Backfill`].
    /// * `has_new_bar`: closed elements newer than anything emitted so far come
    ///   out as [`BarOrigin::Live`]: normally exactly `bars[n-2]`.
    /// * The last element is never touched.
    pub fn on_update(
        &mut self,
        bars: &[FeedBar],
        has_new_bar: bool,
    ) -> Vec<Result<ClosedBar, BarRejected>> {
        let mut out = Vec::new();

        if bars.len() < 2 {
            if has_new_bar {
                debug!(symbol = %self.symbol, len = bars.len(), "New bar flagged but no closed bar in buffer");
            }
            self.primed |= !bars.is_empty();
            return out;
        }

        let closed = &bars[..bars.len() - 1];

        // ── 1. First snapshot: history ────────────────────────────────────────
        if !self.primed {
            self.primed = true;
            let backfill = if has_new_bar { &closed[..closed.len() - 1] } else { closed };
            for bar in backfill {
                if self.is_newer(bar.time) {
                    out.push(self.emit(bar, BarOrigin::Backfill));
                }
            }
        }

        if !has_new_bar {
            return out;
        }

        // ── 2. Newly closed bar(s) ────────────────────────────────────────────
        let before = out.len();
        for bar in closed {
            if self.is_newer(bar.time) {
                out.push(self.emit(bar, BarOrigin::Live));
            }
        }

        // Nothing new although a new bar was flagged → candidate is behind us
        if out.len() == before {
            let candidate = &closed[closed.len() - 1];
            if let Some(last) = self.last_emitted {
                out.push(Err(BarRejected::OutOfOrder {
                    symbol: self.symbol.clone(),
                    start:  candidate.time,
                    last,
                }));
            }
        }

        out
    }

    fn is_newer(&self, time: DateTime<Utc>) -> bool {
        self.last_emitted.map(|last| time > last).unwrap_or(true)
    }

    fn emit(&mut self, bar: &FeedBar, origin: BarOrigin) -> Result<ClosedBar, BarRejected> {
        if let Some(reason) = malformed_reason(bar.open, bar.high, bar.low, bar.close) {
            return Err(BarRejected::Malformed {
                symbol: self.symbol.clone(),
                time:   bar.time,
                reason,
            });
        }

        self.last_emitted = Some(bar.time);
        Ok(ClosedBar {
            bar: Bar {
                symbol: self.symbol.clone(),
                start:  bar.time,
                open:   bar.open,
                high:   bar.high,
                low:    bar.low,
                close:  bar.close,
            },
            origin,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
