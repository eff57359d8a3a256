//! # feed
//!
//! Feed collaborator plumbing. Whatever produces bars (HTTP push from a
//! broker bridge, or our own poller in [`poll`]) goes through the
//! [`FeedHub`], which routes each event to the one monitor task that owns
//! the instrument.
//!
//! ```text
//!  POST /api/feed/bars ─┐
//!  POST /api/feed/tick ─┼─▶ FeedHub ──mpsc──▶ monitor(SPY)
//!  poll::run_poller  ───┘         └──mpsc──▶ monitor(QQQ) ...
//! ```
//!
//! A route exists from `subscribe` until `unsubscribe`. Dropping the route
//! closes the monitor's receiver, which is how a lost feed reaches it.

pub mod poll;

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::error::AppError;
use crate::models::FeedEvent;

/// Per-instrument queue depth
const FEED_CHANNEL_SIZE: usize = 256;

#[derive(Debug, Default)]
pub struct FeedHub {
    routes: RwLock<HashMap<String, mpsc::Sender<FeedEvent>>>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open (or re-open) the route for `symbol`, returning the monitor side.
    pub async fn subscribe(&self, symbol: &str) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(FEED_CHANNEL_SIZE);
        self.routes.write().await.insert(symbol.to_string(), tx);
        info!(symbol, "📡 Feed subscribed");
        rx
    }

    /// Release the route. Returns whether one existed.
    pub async fn unsubscribe(&self, symbol: &str) -> bool {
        let removed = self.routes.write().await.remove(symbol).is_some();
        if removed {
            info!(symbol, "📴 Feed unsubscribed");
        }
        removed
    }

    #[cfg(test)]
    pub async fn is_subscribed(&self, symbol: &str) -> bool {
        self.routes.read().await.contains_key(symbol)
    }

    pub async fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<_> = self.routes.read().await.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    /// Route one event to its instrument's monitor. Waits if that monitor's
    /// queue is full; other instruments are unaffected.
    pub async fn publish(&self, event: FeedEvent) -> Result<(), AppError> {
        let symbol = event.symbol().to_string();

        // clone the sender out so the map lock is not held across send()
        let tx = {
            let routes = self.routes.read().await;
            routes.get(&symbol).cloned()
        }
        .ok_or_else(|| AppError::NotFound(format!("symbol '{symbol}' is not monitored")))?;

        tx.send(event).await.map_err(|_| {
            debug!(symbol = %symbol, "Monitor receiver gone");
            AppError::FeedClosed(format!("monitor for '{symbol}' has stopped"))
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
