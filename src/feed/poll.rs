//! # feed::poll: Candle poller
//!
//! ใช้เมื่อ `FEED_MODE=poll`: ดึง bar buffer จาก market bridge ทุก
//! `POLL_INTERVAL_SECS` แล้ว publish เข้า [`FeedHub`](super::FeedHub)
//! เหมือน push adapter ทุกประการ
//!
//! ```text
//! GET {FEED_URL}/api/market/candles?symbol=SPY&period=300&count=10
//!   → [ {time, open, high, low, close}, ... ]   ascending, last still forming
//! ```
//!
//! * first poll → `has_new_bar = false` (history only), sized to reach back
//!   to the session open
//! * later polls → `has_new_bar = last.time > previous last.time`
//! * `FEED_MAX_FAILURES` consecutive errors → feed lost (route dropped)

use std::time::Duration;

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::engine::clock::SessionClock;
use crate::models::{DiscreteBarUpdate, FeedBar, FeedEvent};
use crate::state::SharedState;

const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// GET one candle buffer from the bridge.
pub async fn fetch_candles(
    client: &reqwest::Client,
    base_url: &str,
    symbol: &str,
    interval_secs: i64,
    count: usize,
) -> anyhow::Result<Vec<FeedBar>> {
    let url = format!("{base_url}/api/market/candles?symbol={symbol}&period={interval_secs}&count={count}");

    let resp = client
        .get(&url)
        .timeout(FETCH_TIMEOUT)
        .send()
        .await
        .context("Market bridge unreachable")?
        .error_for_status()
        .context("Market bridge returned an error status")?;

    let mut bars: Vec<FeedBar> = resp
        .json()
        .await
        .context("Failed to parse candle response")?;

    // bridge promises ascending order; enforce it so the tracker's
    // "last element is forming" rule holds
    bars.sort_by_key(|b| b.time);
    Ok(bars)
}

/// One request against the first instrument. Startup fails without a feed.
pub async fn probe(state: &SharedState) -> anyhow::Result<()> {
    let config = &state.config;
    let base_url = config
        .feed_url
        .as_deref()
        .context("FEED_URL is not configured")?;
    let symbol = config
        .symbols
        .first()
        .context("no instrument configured")?;

    let bars = fetch_candles(
        &state.http_client,
        base_url,
        symbol,
        config.bar_interval_secs,
        config.poll_count,
    )
    .await
    .with_context(|| format!("feed probe failed for {symbol}"))?;

    info!(symbol = %symbol, bars = bars.len(), "✅ Feed probe succeeded");
    Ok(())
}

/// `has_new_bar` for a fresh buffer, given the last element of the previous one.
pub fn detect_new_bar(previous_last: Option<DateTime<Utc>>, bars: &[FeedBar]) -> bool {
    match (previous_last, bars.last()) {
        (Some(prev), Some(last)) => last.time > prev,
        _ => false,
    }
}

/// Candles to request on the first poll: everything from today's open up to
/// the forming bar, never fewer than `poll_count`.
pub fn first_poll_count(
    clock: &SessionClock,
    now: DateTime<Utc>,
    interval_secs: i64,
    poll_count: usize,
) -> usize {
    let Some(open) = clock.session_open(clock.session_date(now)) else {
        return poll_count;
    };
    if now < open || interval_secs <= 0 {
        return poll_count;
    }
    let since_open = ((now - open).num_seconds() / interval_secs + 2) as usize;
    since_open.max(poll_count)
}

/// Poll until shutdown, until the monitor's route disappears, or until the
/// feed is declared lost.
pub async fn run_poller(state: SharedState, symbol: String, mut shutdown: watch::Receiver<bool>) {
    let config = state.config.clone();
    let Some(base_url) = config.feed_url.clone() else {
        error!(symbol = %symbol, "❌ FEED_URL missing, poller not started");
        state.feed.unsubscribe(&symbol).await;
        return;
    };

    let mut ticker = tokio::time::interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut previous_last: Option<DateTime<Utc>> = None;
    let mut failures: u32 = 0;

    info!(symbol = %symbol, every = ?config.poll_interval, "🔁 Poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let count = match previous_last {
            Some(_) => config.poll_count,
            None => first_poll_count(&state.clock, Utc::now(), config.bar_interval_secs, config.poll_count),
        };
        let fetched = fetch_candles(
            &state.http_client,
            &base_url,
            &symbol,
            config.bar_interval_secs,
            count,
        )
        .await;

        match fetched {
            Ok(bars) => {
                failures = 0;
                let has_new_bar = detect_new_bar(previous_last, &bars);
                if let Some(last) = bars.last() {
                    previous_last = Some(last.time);
                }
                debug!(symbol = %symbol, bars = bars.len(), has_new_bar, "Candles polled");

                let update = DiscreteBarUpdate { symbol: symbol.clone(), bars, has_new_bar };
                if let Err(e) = state.feed.publish(FeedEvent::Bars(update)).await {
                    info!(symbol = %symbol, reason = %e, "Monitor gone, poller exiting");
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                warn!(
                    symbol   = %symbol,
                    failures,
                    max      = config.feed_max_failures,
                    error    = %e,
                    "⚠️ Candle poll failed"
                );
                if failures >= config.feed_max_failures {
                    error!(symbol = %symbol, "❌ Feed lost after {failures} consecutive failures");
                    state.feed.unsubscribe(&symbol).await;
                    break;
                }
            }
        }
    }

    info!(symbol = %symbol, "Poller stopped");
}

// ─── Tests ────────────────────────────────────────────────────────────────────
