//! # engine::monitor
//!
//! **Instrument Monitor**: one task per symbol, owning that symbol's
//! aggregation state and ordering guard.
//!
//! ## Per closed bar
//! ```text
//! 1. Ordering guard   → start must be after the last accepted bar
//! 2. Locker           → opening bar? lock it and stop here
//! 3. Backfill?        → history only feeds the Locker
//! 4. Range locked?    → otherwise inert
//! 5. Window Gate      → bar interval must lie inside the monitoring window
//! 6. Detector         → upward / downward rebound failure
//! 7. Ledger           → first time for this key?
//! 8. → enqueue notification (never blocks)
//! ```
//!
//! Intake is two functions the loop feeds in order: [`InstrumentMonitor::on_feed_event`]
//! and [`InstrumentMonitor::on_time_tick`].

use std::sync::atomic::Ordering;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::aggregator::{BarOrigin, ClosedBar, DiscreteBarTracker, TickAggregator};
use crate::engine::detector;
use crate::engine::locker::LockOutcome;
use crate::error::BarRejected;
use crate::events::MonitorEvent;
use crate::models::{AlertEvent, FeedEvent};
use crate::notify::Notification;
use crate::state::SharedState;

// ─── Stop Reason ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Shutdown,
    WindowClosed,
    FeedLost,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Shutdown     => write!(f, "shutdown requested"),
            StopReason::WindowClosed => write!(f, "monitoring window closed"),
            StopReason::FeedLost     => write!(f, "feed lost"),
        }
    }
}

// ─── Monitor ──────────────────────────────────────────────────────────────────

pub struct InstrumentMonitor {
    symbol:      String,
    state:       SharedState,
    ticks:       TickAggregator,
    discrete:    DiscreteBarTracker,
    /// Start of the last closed bar that passed the ordering guard
    last_closed: Option<DateTime<Utc>>,
}

impl InstrumentMonitor {
    pub fn new(symbol: &str, state: SharedState) -> Self {
        let interval = state.config.bar_interval_secs;
        Self {
            symbol:      symbol.to_string(),
            ticks:       TickAggregator::new(symbol, interval),
            discrete:    DiscreteBarTracker::new(symbol),
            last_closed: None,
            state,
        }
    }

    // ── Intake ────────────────────────────────────────────────────────────────

    /// Feed event intake. Returns the alerts that were fired.
    pub async fn on_feed_event(&mut self, event: FeedEvent) -> Vec<AlertEvent> {
        let closed: Vec<Result<ClosedBar, BarRejected>> = match event {
            FeedEvent::Tick(tick) => match self.ticks.push(&tick) {
                Ok(Some(bar)) => vec![Ok(ClosedBar { bar, origin: BarOrigin::Live })],
                Ok(None) => Vec::new(),
                Err(e) => vec![Err(e)],
            },
            FeedEvent::Bars(update) => self.discrete.on_update(&update.bars, update.has_new_bar),
        };

        let mut fired = Vec::new();
        for item in closed {
            match item {
                Ok(bar) => fired.extend(self.on_closed_bar(bar).await),
                Err(rejected) => self.reject(rejected),
            }
        }
        fired
    }

    /// Time intake: closes a tick accumulator whose interval has elapsed.
    pub async fn on_time_tick(&mut self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let grace = self.state.config.tick_close_grace;
        match self.ticks.flush_elapsed(now, grace) {
            Some(bar) => self
                .on_closed_bar(ClosedBar { bar, origin: BarOrigin::Live })
                .await
                .into_iter()
                .collect(),
            None => Vec::new(),
        }
    }

    /// Closed-bar intake.
    pub async fn on_closed_bar(&mut self, closed: ClosedBar) -> Option<AlertEvent> {
        let ClosedBar { bar, origin } = closed;
        let state = &self.state;

        // ── 1. Ordering guard ─────────────────────────────────────────────────
        if let Some(last) = self.last_closed {
            if bar.start <= last {
                self.reject(BarRejected::OutOfOrder {
                    symbol: self.symbol.clone(),
                    start:  bar.start,
                    last,
                });
                return None;
            }
        }
        self.last_closed = Some(bar.start);
        state.bars_closed.fetch_add(1, Ordering::Relaxed);
        state.broadcast(&MonitorEvent::BarClosed { bar: bar.clone() });

        debug!(
            symbol = %self.symbol,
            start  = %bar.start,
            origin = ?origin,
            open   = bar.open,
            high   = bar.high,
            low    = bar.low,
            close  = bar.close,
            "Bar closed"
        );

        // ── 2. Locker (the opening bar never evaluates against itself) ───────
        match state.ranges.observe(&bar, &state.clock).await {
            LockOutcome::Locked(range) => {
                state.broadcast(&MonitorEvent::RangeLocked { range });
                return None;
            }
            LockOutcome::AlreadyLocked => return None,
            LockOutcome::NotOpeningBar => {}
        }

        // ── 3. History only feeds the Locker ─────────────────────────────────
        if origin == BarOrigin::Backfill {
            return None;
        }

        // ── 4. Range locked for this bar's session? ──────────────────────────
        let session_date = state.clock.session_date(bar.start);
        let Some(range) = state.ranges.get(&self.symbol, session_date).await else {
            debug!(symbol = %self.symbol, start = %bar.start, "No opening range yet, inert");
            return None;
        };

        // ── 5. Window Gate ────────────────────────────────────────────────────
        if !state.clock.bar_in_window(bar.start) {
            debug!(symbol = %self.symbol, start = %bar.start, "Bar outside monitoring window");
            return None;
        }

        // ── 6. Detector ───────────────────────────────────────────────────────
        let direction = detector::evaluate(&bar, &range, state.config.strictness)?;
        let event = AlertEvent {
            symbol:        self.symbol.clone(),
            direction,
            trigger_bar:   bar,
            opening_range: range,
        };

        // ── 7. Ledger ─────────────────────────────────────────────────────────
        let Some(record) = state.ledger.claim(&event).await else {
            state.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
            debug!(symbol = %self.symbol, key = ?event.key(), "Duplicate alert suppressed");
            return None;
        };

        state.alerts_fired.fetch_add(1, Ordering::Relaxed);
        info!(
            symbol    = %event.symbol,
            direction = %event.direction,
            start     = %event.trigger_bar.start,
            close     = event.trigger_bar.close,
            ref_high  = event.opening_range.high,
            ref_low   = event.opening_range.low,
            alert_id  = %record.alert_id,
            "🚨 Rebound failure"
        );
        state.broadcast(&MonitorEvent::AlertFired {
            record,
            direction,
            bar:   event.trigger_bar.clone(),
            range: event.opening_range.clone(),
        });

        // ── 8. Fire-and-forget ────────────────────────────────────────────────
        if let Err(e) = state.notify_tx.try_send(Notification::Alert(Box::new(event.clone()))) {
            warn!(symbol = %self.symbol, error = %e, "⚠️ Notification dropped");
        }

        Some(event)
    }

    fn reject(&self, rejected: BarRejected) {
        self.state.bars_rejected.fetch_add(1, Ordering::Relaxed);
        warn!(symbol = %self.symbol, reason = %rejected, "Bar rejected");
    }

    // ── Loop ──────────────────────────────────────────────────────────────────

    /// Run until shutdown, window close or feed loss. Always releases the
    /// feed route on the way out.
    pub async fn run(
        mut self,
        mut feed: mpsc::Receiver<FeedEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> StopReason {
        let mut recheck = tokio::time::interval(self.state.config.window_recheck);
        recheck.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(symbol = %self.symbol, "👀 Monitor started");

        let reason = loop {
            if *shutdown.borrow() {
                break StopReason::Shutdown;
            }
            if self.state.clock.is_finished(Utc::now(), self.state.config.window_linger) {
                break StopReason::WindowClosed;
            }

            tokio::select! {
                event = feed.recv() => match event {
                    Some(event) => {
                        self.on_feed_event(event).await;
                    }
                    None => {
                        error!(symbol = %self.symbol, "❌ Feed lost, monitor exiting");
                        break StopReason::FeedLost;
                    }
                },
                _ = recheck.tick() => {
                    self.on_time_tick(Utc::now()).await;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break StopReason::Shutdown;
                    }
                }
            }
        };

        // ── Cleanup ───────────────────────────────────────────────────────────
        self.state.feed.unsubscribe(&self.symbol).await;

        let today = self.state.clock.session_date(Utc::now());
        if self.state.ranges.get(&self.symbol, today).await.is_none() {
            warn!(symbol = %self.symbol, "Opening bar never observed, instrument stayed inert this session");
        }

        self.state.broadcast(&MonitorEvent::MonitorStopped {
            symbol: self.symbol.clone(),
            reason: reason.to_string(),
        });
        info!(symbol = %self.symbol, reason = %reason, "Monitor stopped");
        reason
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    use crate::config::Config;
    use crate::models::{Bar, DiscreteBarUpdate, FailureDirection, FeedBar, TickSnapshot};
    use crate::state::build_state;

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn make_state(extra: &[(&str, &str)]) -> (SharedState, mpsc::Receiver<Notification>) {
        let mut vars: HashMap<String, String> = HashMap::from([("SYMBOLS".to_string(), "X".to_string())]);
        for (k, v) in extra {
            vars.insert(k.to_string(), v.to_string());
        }
        build_state(Config::from_vars(|k| vars.get(k).cloned()).unwrap())
    }

    fn bar(start: &str, open: f64, high: f64, low: f64, close: f64) -> ClosedBar {
        ClosedBar {
            bar: Bar { symbol: "X".into(), start: utc(start), open, high, low, close },
            origin: BarOrigin::Live,
        }
    }

    /// 09:30 EDT, range {98, 100}
    fn opening_bar() -> ClosedBar {
        bar("2026-07-01T13:30:00Z", 99.0, 100.0, 98.0, 99.0)
    }

    fn failing_bar(start: &str) -> ClosedBar {
        bar(start, 97.5, 99.0, 97.0, 97.8)
    }

    fn tick(time: &str, high: f64, low: f64, close: f64) -> FeedEvent {
        FeedEvent::Tick(TickSnapshot {
            symbol: "X".into(),
            time:   utc(time),
            open:   close,
            high,
            low,
            close,
        })
    }

    fn feed_bar(time: &str, open: f64, high: f64, low: f64, close: f64) -> FeedBar {
        FeedBar { time: utc(time), open, high, low, close }
    }

    fn bars_update(bars: &[FeedBar], has_new_bar: bool) -> FeedEvent {
        FeedEvent::Bars(DiscreteBarUpdate { symbol: "X".into(), bars: bars.to_vec(), has_new_bar })
    }

    #[tokio::test]
    async fn test_no_alert_before_range_locked() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state);

        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T14:05:00Z")).await.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_opening_bar_never_alerts() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());

        // high > low and close <= low against its own range
        let self_failing = bar("2026-07-01T13:30:00Z", 99.0, 100.0, 98.0, 98.0);
        assert!(monitor.on_closed_bar(self_failing).await.is_none());
        assert!(rx.try_recv().is_err());
        assert_eq!(state.ranges.all().await.len(), 1);
    }

    #[tokio::test]
    async fn test_upward_failure_scenario() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());

        assert!(monitor.on_closed_bar(opening_bar()).await.is_none());
        let event = monitor
            .on_closed_bar(failing_bar("2026-07-01T14:05:00Z"))
            .await
            .expect("upward failure");

        assert_eq!(event.direction, FailureDirection::UpwardFailure);
        assert_eq!((event.opening_range.low, event.opening_range.high), (98.0, 100.0));
        assert!(matches!(rx.try_recv(), Ok(Notification::Alert(_))));
        assert_eq!(state.alerts_fired.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_downward_failure_scenario() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state);

        monitor.on_closed_bar(opening_bar()).await;
        // dipped back inside to 99, closed above the opening high
        let reclaim = bar("2026-07-01T14:05:00Z", 100.5, 101.0, 99.0, 100.4);
        let event = monitor.on_closed_bar(reclaim).await.expect("downward failure");
        assert_eq!(event.direction, FailureDirection::DownwardFailure);

        match rx.try_recv() {
            Ok(Notification::Alert(alert)) => {
                assert_eq!(alert.direction, FailureDirection::DownwardFailure);
                assert_eq!(alert.trigger_bar.close, 100.4);
            }
            other => panic!("expected alert, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bar_inside_range_no_alert() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state);

        monitor.on_closed_bar(opening_bar()).await;
        let inside = bar("2026-07-01T14:10:00Z", 98.3, 98.5, 98.2, 98.4);
        assert!(monitor.on_closed_bar(inside).await.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_consecutive_failures_both_delivered() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state);

        monitor.on_closed_bar(opening_bar()).await;
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T14:05:00Z")).await.is_some());
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T14:10:00Z")).await.is_some());

        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_same_interval_delivered_once_across_monitors() {
        // two intake paths observing the same closings for one symbol
        let (state, mut rx) = make_state(&[]);
        let mut a = InstrumentMonitor::new("X", state.clone());
        let mut b = InstrumentMonitor::new("X", state.clone());

        a.on_closed_bar(opening_bar()).await;
        b.on_closed_bar(opening_bar()).await;
        let first  = a.on_closed_bar(failing_bar("2026-07-01T14:05:00Z")).await;
        let second = b.on_closed_bar(failing_bar("2026-07-01T14:05:00Z")).await;

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(state.alerts_suppressed.load(Ordering::Relaxed), 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_out_of_order_bar_rejected() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());

        monitor.on_closed_bar(opening_bar()).await;
        monitor.on_closed_bar(bar("2026-07-01T14:10:00Z", 98.3, 98.5, 98.2, 98.4)).await;

        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T14:05:00Z")).await.is_none());
        // a repeated opening bar is rejected too and never re-locks
        assert!(monitor.on_closed_bar(opening_bar()).await.is_none());

        assert_eq!(state.bars_rejected.load(Ordering::Relaxed), 2);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_window_edges_follow_bar_interval() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());
        monitor.on_closed_bar(opening_bar()).await;

        // 09:55 EDT closes at 10:00: before the window
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T13:55:00Z")).await.is_none());
        // 10:00 EDT: first bar inside
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T14:00:00Z")).await.is_some());
        // 11:25 EDT closes at 11:30: last bar inside
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T15:25:00Z")).await.is_some());
        // 11:30 EDT runs past the end
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T15:30:00Z")).await.is_none());

        assert_eq!(state.alerts_fired.load(Ordering::Relaxed), 2);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_strict_mode_requires_open_below() {
        let (state, _rx) = make_state(&[("DETECTOR_STRICT_OPEN", "true")]);
        let mut monitor = InstrumentMonitor::new("X", state);

        monitor.on_closed_bar(opening_bar()).await;
        let opened_inside = bar("2026-07-01T14:05:00Z", 99.0, 99.5, 97.0, 97.5);
        assert!(monitor.on_closed_bar(opened_inside).await.is_none());
        assert!(monitor.on_closed_bar(failing_bar("2026-07-01T14:10:00Z")).await.is_some());
    }

    #[tokio::test]
    async fn test_tick_mode_end_to_end() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());

        // opening bucket 09:30–09:35 EDT
        for t in [
            tick("2026-07-01T13:30:00Z", 99.5, 99.0, 99.2),
            tick("2026-07-01T13:32:00Z", 100.0, 99.1, 99.8),
            tick("2026-07-01T13:34:55Z", 99.9, 98.0, 98.6),
        ] {
            assert!(monitor.on_feed_event(t).await.is_empty());
        }

        // 10:05 bucket: pokes to 99, closes 97.8
        for t in [
            tick("2026-07-01T14:05:00Z", 97.6, 97.4, 97.5),
            tick("2026-07-01T14:06:00Z", 99.0, 97.0, 98.5),
            tick("2026-07-01T14:09:55Z", 98.1, 97.7, 97.8),
        ] {
            assert!(monitor.on_feed_event(t).await.is_empty());
        }
        let range = state.ranges.all().await.pop().expect("range locked by boundary tick");
        assert_eq!((range.low, range.high), (98.0, 100.0));

        let fired = monitor.on_feed_event(tick("2026-07-01T14:10:00Z", 97.9, 97.8, 97.9)).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].trigger_bar.start, utc("2026-07-01T14:05:00Z"));
        assert_eq!(fired[0].trigger_bar.close, 97.8);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_tick_mode_time_flush() {
        let (state, _rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state);

        monitor.on_feed_event(tick("2026-07-01T13:30:00Z", 100.0, 98.0, 99.0)).await;
        monitor.on_feed_event(tick("2026-07-01T14:05:00Z", 99.0, 97.0, 97.8)).await;

        // still inside the 10s grace after 14:10
        assert!(monitor.on_time_tick(utc("2026-07-01T14:10:05Z")).await.is_empty());
        let fired = monitor.on_time_tick(utc("2026-07-01T14:10:10Z")).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].direction, FailureDirection::UpwardFailure);
    }

    #[tokio::test]
    async fn test_discrete_backfill_locks_without_alerting() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());

        // started mid-session: history holds the opening bar and a failing 10:00 bar
        let mut bars = vec![
            feed_bar("2026-07-01T13:30:00Z", 99.0, 100.0, 98.0, 99.0),
            feed_bar("2026-07-01T14:00:00Z", 97.5, 99.0, 97.0, 97.8),
            feed_bar("2026-07-01T14:05:00Z", 97.6, 97.9, 97.5, 97.7),
        ];

        assert!(monitor.on_feed_event(bars_update(&bars, false)).await.is_empty());
        assert_eq!(state.ranges.all().await.len(), 1);
        assert!(rx.try_recv().is_err());

        // 10:05 finishes as another failure, 10:10 starts
        bars[2] = feed_bar("2026-07-01T14:05:00Z", 97.6, 98.6, 97.5, 97.9);
        bars.push(feed_bar("2026-07-01T14:10:00Z", 97.9, 97.9, 97.9, 97.9));
        let fired = monitor.on_feed_event(bars_update(&bars, true)).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].trigger_bar.start, utc("2026-07-01T14:05:00Z"));
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_discrete_malformed_bar_dropped() {
        let (state, mut rx) = make_state(&[]);
        let mut monitor = InstrumentMonitor::new("X", state.clone());

        let mut bars = vec![
            feed_bar("2026-07-01T13:30:00Z", 99.0, 100.0, 98.0, 99.0),
            feed_bar("2026-07-01T14:05:00Z", 97.5, 97.5, 97.5, 97.5),
        ];
        monitor.on_feed_event(bars_update(&bars, false)).await;

        // closes above its own high
        bars[1] = feed_bar("2026-07-01T14:05:00Z", 97.5, 99.0, 97.0, 99.5);
        bars.push(feed_bar("2026-07-01T14:10:00Z", 97.9, 97.9, 97.9, 97.9));
        assert!(monitor.on_feed_event(bars_update(&bars, true)).await.is_empty());
        assert_eq!(state.bars_rejected.load(Ordering::Relaxed), 1);
        assert!(rx.try_recv().is_err());

        // the monitor keeps going: next failing bar still alerts
        bars[2] = feed_bar("2026-07-01T14:10:00Z", 97.5, 99.0, 97.0, 97.8);
        bars.push(feed_bar("2026-07-01T14:15:00Z", 97.8, 97.8, 97.8, 97.8));
        let fired = monitor.on_feed_event(bars_update(&bars, true)).await;
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].trigger_bar.start, utc("2026-07-01T14:10:00Z"));
    }

    /// Window covering the whole UTC day so `run` never finishes on its own.
    fn all_day() -> [(&'static str, &'static str); 4] {
        [
            ("MARKET_TZ", "UTC"),
            ("SESSION_OPEN", "00:00"),
            ("MONITOR_START_OFFSET_MIN", "0"),
            ("MONITOR_END_OFFSET_MIN", "1440"),
        ]
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown_and_unsubscribes() {
        let (state, _rx) = make_state(&all_day());
        let feed = state.feed.subscribe("X").await;
        let (stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(InstrumentMonitor::new("X", state.clone()).run(feed, stop_rx));
        stop_tx.send(true).unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::Shutdown);
        assert!(!state.feed.is_subscribed("X").await);
    }

    #[tokio::test]
    async fn test_run_exits_when_feed_lost() {
        let (state, _rx) = make_state(&all_day());
        let feed = state.feed.subscribe("X").await;
        let (_stop_tx, stop_rx) = watch::channel(false);

        let handle = tokio::spawn(InstrumentMonitor::new("X", state.clone()).run(feed, stop_rx));
        state.feed.unsubscribe("X").await;

        let reason = tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(reason, StopReason::FeedLost);
    }
}
