//! # error
//!
//! Centralised error types.
//!
//! * [`AppError`]: returned by every HTTP handler. Axum's `IntoResponse`
//!   impl converts these into structured JSON error bodies so the feed
//!   adapter always gets a machine-readable response even on failure.
//! * [`BarRejected`]: a closed bar / tick the pipeline refused. Always
//!   recoverable: the monitor logs it and moves on.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    /// The request payload was syntactically correct but semantically invalid.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Missing or wrong `X-API-Key`.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Symbol is not monitored (or its monitor already stopped).
    #[error("Not found: {0}")]
    NotFound(String),

    /// The instrument's monitor dropped its receiver mid-publish.
    #[error("Feed closed: {0}")]
    FeedClosed(String),

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::FeedClosed(msg) => (StatusCode::GONE, msg.clone()),
            AppError::Internal(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {err}"),
            ),
        };

        let body = Json(json!({
            "ok":    false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

// ─── Bar Rejection ────────────────────────────────────────────────────────────

/// Why a bar or tick never reached the Locker / Detector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarRejected {
    /// Non-finite prices or `high < low`.
    #[error("{symbol}: malformed bar at {time}: {reason}")]
    Malformed {
        symbol: String,
        time:   DateTime<Utc>,
        reason: &'static str,
    },

    /// Tick belongs to a bucket behind the open accumulator (or one that was
    /// already finalized).
    #[error("{symbol}: stale tick for bucket {bucket}, current bucket {current}")]
    StaleTick {
        symbol:  String,
        bucket:  DateTime<Utc>,
        current: DateTime<Utc>,
    },

    /// Closed bar is not strictly after the last accepted closed bar.
    #[error("{symbol}: out-of-order bar {start}, last accepted {last}")]
    OutOfOrder {
        symbol: String,
        start:  DateTime<Utc>,
        last:   DateTime<Utc>,
    },
}

// ─── Tests ────────────────────────────────────────────────────────────────────
