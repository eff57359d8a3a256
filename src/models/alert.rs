//! # models::alert
//!
//! Defines the alert side of the pipeline:
//! [`FailureDirection`] → [`AlertEvent`] → [`AlertKey`] (dedup identity) →
//! [`AlertRecord`] (what the ledger remembers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Bar, OpeningRange};

// ─── Direction ────────────────────────────────────────────────────────────────

/// Which rebound failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureDirection {
    /// Price poked back above the opening low from below, then closed under it.
    UpwardFailure,
    /// Price poked back below the opening high from above, then closed over it.
    DownwardFailure,
}

impl FailureDirection {
    pub fn severity(self) -> AlertSeverity {
        match self {
            FailureDirection::UpwardFailure   => AlertSeverity::Bearish,
            FailureDirection::DownwardFailure => AlertSeverity::Bullish,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FailureDirection::UpwardFailure   => "upward rebound failure",
            FailureDirection::DownwardFailure => "downward rebound failure",
        }
    }
}

impl std::fmt::Display for FailureDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ─── Severity ─────────────────────────────────────────────────────────────────

/// Human-readable severity carried to the notifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    /// Failed reclaim of the opening low.
    Bearish,
    /// Failed breakdown of the opening high.
    Bullish,
    /// Lifecycle notices.
    Info,
}

impl AlertSeverity {
    /// Embed colour used by the chat webhook.
    pub fn color(self) -> u32 {
        match self {
            AlertSeverity::Bearish => 16711680, // red
            AlertSeverity::Bullish => 65280,    // green
            AlertSeverity::Info    => 3447003,  // blue
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            AlertSeverity::Bearish => "Bearish: false breakout rejected at the opening low",
            AlertSeverity::Bullish => "Bullish: false breakdown reclaimed at the opening high",
            AlertSeverity::Info    => "Info",
        }
    }
}

// ─── Event ────────────────────────────────────────────────────────────────────

/// Transient: produced by the detector, consumed by the ledger + notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub symbol:        String,
    pub direction:     FailureDirection,
    pub trigger_bar:   Bar,
    pub opening_range: OpeningRange,
}

impl AlertEvent {
    pub fn key(&self) -> AlertKey {
        AlertKey {
            symbol:    self.symbol.clone(),
            direction: self.direction,
            bar_start: self.trigger_bar.start,
        }
    }
}

// ─── Key / Record ─────────────────────────────────────────────────────────────

/// (instrument, direction, bar identity): at most one delivery per process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AlertKey {
    pub symbol:    String,
    pub direction: FailureDirection,
    pub bar_start: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub alert_id: Uuid,
    #[serde(flatten)]
    pub key:      AlertKey,
    pub close:    f64,
    pub fired_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn from_event(event: &AlertEvent) -> Self {
        Self {
            alert_id: Uuid::new_v4(),
            key:      event.key(),
            close:    event.trigger_bar.close,
            fired_at: Utc::now(),
        }
    }
}
