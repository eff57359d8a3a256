//! # routes::feed
//!
//! Push adapter สำหรับ feed collaborator (`FEED_MODE=push`): แต่ละ request
//! ถูก route เข้า monitor ของ instrument นั้นผ่าน `FeedHub`

use axum::{extract::State, response::IntoResponse, Json};
use serde_json::json;

use crate::{
    error::AppError,
    models::{DiscreteBarUpdate, FeedEvent, TickSnapshot},
    state::SharedState,
};

fn normalize_symbol(raw: &str) -> Result<String, AppError> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::BadRequest("symbol must not be empty".into()));
    }
    Ok(symbol)
}

// ─── POST /api/feed/bars ──────────────────────────────────────────────────────

/// Discrete mode: the whole bar buffer plus the `has_new_bar` flag.
pub async fn push_bars(
    State(state): State<SharedState>,
    Json(mut update): Json<DiscreteBarUpdate>,
) -> Result<impl IntoResponse, AppError> {
    update.symbol = normalize_symbol(&update.symbol)?;

    if update.bars.windows(2).any(|w| w[1].time <= w[0].time) {
        return Err(AppError::BadRequest("bars must be strictly ascending by time".into()));
    }

    let symbol      = update.symbol.clone();
    let count       = update.bars.len();
    let has_new_bar = update.has_new_bar;
    state.feed.publish(FeedEvent::Bars(update)).await?;

    Ok(Json(json!({
        "ok":          true,
        "symbol":      symbol,
        "bars":        count,
        "has_new_bar": has_new_bar,
    })))
}

// ─── POST /api/feed/tick ──────────────────────────────────────────────────────

/// Tick mode: one sub-interval snapshot.
pub async fn push_tick(
    State(state): State<SharedState>,
    Json(mut tick): Json<TickSnapshot>,
) -> Result<impl IntoResponse, AppError> {
    tick.symbol = normalize_symbol(&tick.symbol)?;

    let symbol = tick.symbol.clone();
    let time   = tick.time;
    state.feed.publish(FeedEvent::Tick(tick)).await?;

    Ok(Json(json!({
        "ok":     true,
        "symbol": symbol,
        "time":   time,
    })))
}
