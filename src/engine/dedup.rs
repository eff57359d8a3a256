//! # engine::dedup
//!
//! **Alert Ledger**: at most one delivery per
//! (instrument, direction, bar start) for the lifetime of the process.
//! A key is recorded when claimed, before delivery, so a failed webhook is
//! never retried.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::models::{AlertEvent, AlertKey, AlertRecord};

#[derive(Debug, Clone, Default)]
pub struct AlertLedger {
    seen: Arc<RwLock<HashMap<AlertKey, AlertRecord>>>,
}

impl AlertLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim delivery rights for `event`. `Some(record)` only the first time
    /// its key is seen.
    pub async fn claim(&self, event: &AlertEvent) -> Option<AlertRecord> {
        let key = event.key();
        let mut seen = self.seen.write().await;
        if seen.contains_key(&key) {
            return None;
        }
        let record = AlertRecord::from_event(event);
        seen.insert(key, record.clone());
        Some(record)
    }

    #[cfg(test)]
    pub async fn contains(&self, key: &AlertKey) -> bool {
        self.seen.read().await.contains_key(key)
    }

    /// All records, oldest first.
    pub async fn records(&self) -> Vec<AlertRecord> {
        let seen = self.seen.read().await;
        let mut records: Vec<_> = seen.values().cloned().collect();
        records.sort_by_key(|r| r.fired_at);
        records
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
