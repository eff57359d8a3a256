//! # engine::detector
//!
//! **Breakout-Failure Detector**: pure check of one closed bar against the
//! locked opening range.
//!
//! ```text
//!            ref_high ─────────────────────────────   ▲ low pokes under, close back ≥ high
//!                                                     │ → DOWNWARD rebound failure (bullish)
//!            (opening range)
//!                                                     │ high pokes over, close back ≤ low
//!            ref_low  ─────────────────────────────   ▼ → UPWARD rebound failure (bearish)
//! ```
//!
//! Two strictness variants exist in the field. `Loose` checks only
//! high/low/close; `RequireOpenOutside` also wants the bar to have *opened*
//! on the far side of the boundary. Pick one per deployment
//! (`DETECTOR_STRICT_OPEN`); it applies to both directions.

use crate::models::{Bar, FailureDirection, OpeningRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strictness {
    Loose,
    RequireOpenOutside,
}

/// Evaluate one closed bar. Upward is checked first and wins if both match.
pub fn evaluate(bar: &Bar, range: &OpeningRange, strictness: Strictness) -> Option<FailureDirection> {
    let strict = strictness == Strictness::RequireOpenOutside;

    let upward = bar.high > range.low
        && bar.close <= range.low
        && (!strict || bar.open < range.low);
    if upward {
        return Some(FailureDirection::UpwardFailure);
    }

    let downward = bar.low < range.high
        && bar.close >= range.high
        && (!strict || bar.open > range.high);
    if downward {
        return Some(FailureDirection::DownwardFailure);
    }

    None
}

// ─── Tests ────────────────────────────────────────────────────────────────────
