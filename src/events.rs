//! # events
//!
//! Defines [`MonitorEvent`]: every event broadcast to `/ws/monitor`
//! clients.
//!
//! Uses `tokio::sync::broadcast::Sender<String>`, serialising to JSON before
//! sending so the channel payload stays `Clone` trivially.

use serde::Serialize;

use crate::models::{AlertRecord, Bar, FailureDirection, OpeningRange};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MonitorEvent {
    /// Opening bar observed and frozen
    RangeLocked {
        range: OpeningRange,
    },

    /// A bar closed and passed the ordering guard
    BarClosed {
        bar: Bar,
    },

    /// Detector fired and the ledger accepted the key
    AlertFired {
        record:    AlertRecord,
        direction: FailureDirection,
        bar:       Bar,
        range:     OpeningRange,
    },

    /// A monitor task ended
    MonitorStopped {
        symbol: String,
        reason: String,
    },
}

impl MonitorEvent {
    #[inline]
    pub fn to_json(&self) -> String {
        serde_json::to_string(self)
            .unwrap_or_else(|_| r#"{"event":"SERIALIZATION_ERROR"}"#.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_json() {
        let json = MonitorEvent::MonitorStopped {
            symbol: "SPY".into(),
            reason: "window closed".into(),
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["event"], "MONITOR_STOPPED");
        assert_eq!(value["symbol"], "SPY");
    }
}
