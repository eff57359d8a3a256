//! # state
//!
//! AppState: the shared registries every monitor task and every Axum handler
//! sees. The registries are keyed per instrument, so monitors for different
//! symbols never contend on the same entry.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use crate::config::Config;
use crate::engine::clock::SessionClock;
use crate::engine::dedup::AlertLedger;
use crate::engine::locker::RangeBook;
use crate::events::MonitorEvent;
use crate::feed::FeedHub;
use crate::notify::{Notification, NOTIFY_CHANNEL_SIZE};

// ─── AppState ─────────────────────────────────────────────────────────────────

/// Top-level shared state injected into every monitor and Axum handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub clock:  SessionClock,

    // ── Registries ────────────────────────────────────────────────────────────
    /// Locked opening ranges, one per instrument
    pub ranges: RangeBook,
    /// Alert keys already delivered (process lifetime)
    pub ledger: AlertLedger,
    /// symbol → monitor route
    pub feed:   FeedHub,

    // ── Outbound ──────────────────────────────────────────────────────────────
    /// Queue towards the notification dispatcher
    pub notify_tx:    mpsc::Sender<Notification>,
    /// Pre-serialized JSON for `/ws/monitor`
    pub broadcast_tx: broadcast::Sender<String>,
    /// Shared reqwest client (connection pooling) for poller + webhook
    pub http_client:  reqwest::Client,

    // ── Metrics ───────────────────────────────────────────────────────────────
    pub bars_closed:       AtomicU64,
    pub bars_rejected:     AtomicU64,
    pub alerts_fired:      AtomicU64,
    pub alerts_suppressed: AtomicU64,
}

impl AppState {
    /// Returns the state plus the receiving end of the notification queue
    /// (handed to the dispatcher).
    pub fn new(config: Config) -> (Self, mpsc::Receiver<Notification>) {
        let (broadcast_tx, _) = broadcast::channel(256);
        let (notify_tx, notify_rx) = mpsc::channel(NOTIFY_CHANNEL_SIZE);
        let clock = SessionClock::from_config(&config);

        let state = Self {
            config: Arc::new(config),
            clock,
            ranges: RangeBook::new(),
            ledger: AlertLedger::new(),
            feed:   FeedHub::new(),
            notify_tx,
            broadcast_tx,
            http_client:       reqwest::Client::new(),
            bars_closed:       AtomicU64::new(0),
            bars_rejected:     AtomicU64::new(0),
            alerts_fired:      AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
        };
        (state, notify_rx)
    }

    /// Broadcast to WebSocket clients. No listener is not an error.
    pub fn broadcast(&self, event: &MonitorEvent) {
        let _ = self.broadcast_tx.send(event.to_json());
    }
}

/// Convenience type alias
pub type SharedState = Arc<AppState>;

pub fn build_state(config: Config) -> (SharedState, mpsc::Receiver<Notification>) {
    let (state, notify_rx) = AppState::new(config);
    (Arc::new(state), notify_rx)
}
