//! # engine::clock
//!
//! **Window Gate**: which closed bars may alert, and when is the day done?
//!
//! ```text
//!   PreOpen    Opening            Monitoring               Closed
//! ──────────┬─────────────┬───────────────────────────┬──────────────
//!         open      open + start                open + end
//!        09:30         10:00                       11:30   (defaults, ET)
//! ```
//!
//! A bar may alert only when its whole interval lies inside the window, so
//! with the defaults the first candidate is 10:00–10:05 and the last is
//! 11:25–11:30. Monitors linger a little past the end so that last bar can
//! still arrive.
//!
//! The anchor is rebuilt from the calendar date of `now` in the market
//! timezone on every call, so DST switches and day rollovers never reuse a
//! stale offset.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;

use crate::config::Config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// Before today's open
    PreOpen,
    /// Open, but the monitoring window has not started (opening bar forming / locking)
    Opening,
    /// Inside the window: alerts may fire
    Monitoring,
    /// Window over for today
    Closed,
}

#[derive(Debug, Clone)]
pub struct SessionClock {
    tz:            Tz,
    open:          NaiveTime,
    window_start:  Duration,
    window_end:    Duration,
    interval_secs: i64,
}

impl SessionClock {
    pub fn new(
        tz: Tz,
        open: NaiveTime,
        window_start: Duration,
        window_end: Duration,
        interval_secs: i64,
    ) -> Self {
        Self { tz, open, window_start, window_end, interval_secs }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.market_tz,
            config.session_open,
            config.window_start,
            config.window_end,
            config.bar_interval_secs,
        )
    }

    /// Market-timezone calendar date of `t`.
    pub fn session_date(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.tz).date_naive()
    }

    /// That day's open as a UTC instant. `None` only if the local time does
    /// not exist on that date (DST gap).
    pub fn session_open(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.tz
            .from_local_datetime(&date.and_time(self.open))
            .earliest()
            .map(|t| t.with_timezone(&Utc))
    }

    /// Inclusive `[start, end]` monitoring window for `date`.
    pub fn window(&self, date: NaiveDate) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        self.session_open(date)
            .map(|open| (open + self.window_start, open + self.window_end))
    }

    /// Interval start of the opening bar for `date`.
    pub fn opening_bucket(&self, date: NaiveDate) -> Option<DateTime<Utc>> {
        self.session_open(date)
            .map(|open| bucket_start(open, self.interval_secs))
    }

    pub fn phase(&self, now: DateTime<Utc>) -> SessionPhase {
        let date = self.session_date(now);
        let (Some(open), Some((start, end))) = (self.session_open(date), self.window(date)) else {
            return SessionPhase::Closed;
        };

        if now < open {
            SessionPhase::PreOpen
        } else if now < start {
            SessionPhase::Opening
        } else if now <= end {
            SessionPhase::Monitoring
        } else {
            SessionPhase::Closed
        }
    }

    /// Whether the whole interval of the bar starting at `start` lies inside
    /// its session's window: `window_start <= start` and `end <= window_end`.
    pub fn bar_in_window(&self, start: DateTime<Utc>) -> bool {
        let end = start + Duration::seconds(self.interval_secs);
        self.window(self.session_date(start))
            .map(|(from, to)| from <= start && end <= to)
            .unwrap_or(false)
    }

    /// Past today's window end by more than `linger`, so the last in-window
    /// bar has had its chance to arrive.
    pub fn is_finished(&self, now: DateTime<Utc>, linger: Duration) -> bool {
        match self.window(self.session_date(now)) {
            Some((_, end)) => now > end + linger,
            None => true,
        }
    }
}

/// Truncate `t` onto the interval grid: `ts - (ts mod interval)`.
pub fn bucket_start(t: DateTime<Utc>, interval_secs: i64) -> DateTime<Utc> {
    let ts = t.timestamp();
    let start = ts - ts.rem_euclid(interval_secs);
    DateTime::from_timestamp(start, 0).unwrap_or(t)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn eastern() -> SessionClock {
        SessionClock::new(
            chrono_tz::US::Eastern,
            NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            Duration::minutes(30),
            Duration::minutes(120),
            300,
        )
    }

    fn utc(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    #[test]
    fn test_open_follows_dst() {
        let clock = eastern();
        // EST (UTC-5) in January, EDT (UTC-4) in July
        let jan = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        let jul = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        assert_eq!(clock.session_open(jan), Some(utc("2026-01-15T14:30:00Z")));
        assert_eq!(clock.session_open(jul), Some(utc("2026-07-01T13:30:00Z")));
    }

    #[test]
    fn test_anchor_recomputed_across_dst_switch() {
        let clock = eastern();
        // Friday before / Monday after the November 2026 switch
        assert_eq!(clock.phase(utc("2026-10-30T14:00:00Z")), SessionPhase::Monitoring);
        assert_eq!(clock.phase(utc("2026-11-02T14:00:00Z")), SessionPhase::Opening);
        assert_eq!(clock.phase(utc("2026-11-02T15:00:00Z")), SessionPhase::Monitoring);
    }

    #[test]
    fn test_phases() {
        let clock = eastern();
        assert_eq!(clock.phase(utc("2026-07-01T13:00:00Z")), SessionPhase::PreOpen);
        assert_eq!(clock.phase(utc("2026-07-01T13:30:00Z")), SessionPhase::Opening);
        assert_eq!(clock.phase(utc("2026-07-01T13:59:59Z")), SessionPhase::Opening);
        assert_eq!(clock.phase(utc("2026-07-01T14:00:00Z")), SessionPhase::Monitoring);
        assert_eq!(clock.phase(utc("2026-07-01T15:30:00Z")), SessionPhase::Monitoring);
        assert_eq!(clock.phase(utc("2026-07-01T15:30:01Z")), SessionPhase::Closed);
    }

    #[test]
    fn test_bar_in_window_edges() {
        let clock = eastern();
        // 09:55 ET ends at the window start: outside
        assert!(!clock.bar_in_window(utc("2026-07-01T13:55:00Z")));
        // 10:00 ET is the first bar inside
        assert!(clock.bar_in_window(utc("2026-07-01T14:00:00Z")));
        // 11:25 ET ends exactly at 11:30: last bar inside
        assert!(clock.bar_in_window(utc("2026-07-01T15:25:00Z")));
        assert!(!clock.bar_in_window(utc("2026-07-01T15:30:00Z")));
    }

    #[test]
    fn test_finished_after_linger() {
        let clock = eastern();
        let linger = Duration::seconds(60);
        assert!(!clock.is_finished(utc("2026-07-01T15:30:01Z"), linger));
        assert!(!clock.is_finished(utc("2026-07-01T15:31:00Z"), linger));
        assert!(clock.is_finished(utc("2026-07-01T15:31:01Z"), linger));
        assert!(!clock.is_finished(utc("2026-07-01T13:00:00Z"), linger));
    }

    #[test]
    fn test_session_date_uses_market_tz() {
        let clock = eastern();
        // 02:00Z on the 2nd is still 22:00 ET on the 1st
        assert_eq!(
            clock.session_date(utc("2026-07-02T02:00:00Z")),
            NaiveDate::from_ymd_opt(2026, 7, 1).unwrap()
        );
        assert_eq!(clock.phase(utc("2026-07-02T02:00:00Z")), SessionPhase::Closed);
    }

    #[test]
    fn test_opening_bucket_on_grid() {
        let clock = SessionClock::new(
            chrono_tz::US::Eastern,
            NaiveTime::from_hms_opt(9, 32, 0).unwrap(),
            Duration::minutes(30),
            Duration::minutes(120),
            300,
        );
        let date = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        assert_eq!(clock.opening_bucket(date), Some(utc("2026-07-01T13:30:00Z")));
    }

    #[test]
    fn test_bucket_start() {
        assert_eq!(bucket_start(utc("2026-07-01T13:34:55Z"), 300), utc("2026-07-01T13:30:00Z"));
        assert_eq!(bucket_start(utc("2026-07-01T13:35:00Z"), 300), utc("2026-07-01T13:35:00Z"));
    }
}
