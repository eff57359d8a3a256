//! # routes::monitor
//!
//! **Monitor Loop**: Endpoints สำหรับ dashboard / operator
//!
//! ## Endpoints
//!
//! | Method    | Path                    | Description                              |
//! |-----------|-------------------------|------------------------------------------|
//! | GET       | `/api/health`           | phase + today's window (no auth)         |
//! | GET (WS)  | `/ws/monitor`           | WebSocket real-time event stream         |
//! | GET       | `/api/monitor/ranges`   | Opening ranges ที่ lock แล้ว               |
//! | GET       | `/api/monitor/alerts`   | Alert ที่ส่งไปแล้วทั้งหมด                    |
//! | GET       | `/api/monitor/stats`    | bar / alert counters                     |

use std::sync::atomic::Ordering;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::state::SharedState;

// ─── GET /api/health ──────────────────────────────────────────────────────────

pub async fn health_check(State(state): State<SharedState>) -> impl IntoResponse {
    let now   = Utc::now();
    let clock = &state.clock;
    let date  = clock.session_date(now);
    let window = clock.window(date);

    Json(json!({
        "ok":           true,
        "phase":        clock.phase(now),
        "session_date": date,
        "session_open": clock.session_open(date),
        "window_start": window.map(|(start, _)| start),
        "window_end":   window.map(|(_, end)| end),
    }))
}

// ─── REST Monitoring Endpoints ────────────────────────────────────────────────

/// GET /api/monitor/ranges: Opening ranges ทั้งหมด
pub async fn get_ranges(State(state): State<SharedState>) -> impl IntoResponse {
    let ranges = state.ranges.all().await;
    Json(json!({
        "ok":     true,
        "count":  ranges.len(),
        "ranges": ranges,
    }))
}

/// GET /api/monitor/alerts: Alert keys ที่ส่งแล้ว
pub async fn get_alerts(State(state): State<SharedState>) -> impl IntoResponse {
    let records = state.ledger.records().await;
    Json(json!({
        "ok":      true,
        "count":   records.len(),
        "records": records,
    }))
}

async fn stats_json(state: &SharedState) -> Value {
    json!({
        "bars_closed":       state.bars_closed.load(Ordering::Relaxed),
        "bars_rejected":     state.bars_rejected.load(Ordering::Relaxed),
        "alerts_fired":      state.alerts_fired.load(Ordering::Relaxed),
        "alerts_suppressed": state.alerts_suppressed.load(Ordering::Relaxed),
        "instruments":       state.feed.symbols().await,
        "ranges_locked":     state.ranges.all().await.len(),
    })
}

/// GET /api/monitor/stats: สถิติ Server
pub async fn get_stats(State(state): State<SharedState>) -> impl IntoResponse {
    let mut body = stats_json(&state).await;
    body["ok"] = json!(true);
    Json(body)
}

// ─── WebSocket Handler ────────────────────────────────────────────────────────

/// Upgrade HTTP → WebSocket แล้ว subscribe broadcast channel
///
/// ทุก MonitorEvent จะถูกส่งมาเป็น JSON text frame
pub async fn ws_monitor(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: SharedState) {
    let mut rx = state.broadcast_tx.subscribe();
    let (mut sender, mut receiver) = socket.split();

    info!("🔌 WebSocket client connected");

    // ── ส่ง Snapshot ปัจจุบันทันทีที่ต่อ ─────────────────────────────────────
    let snapshot = json!({
        "event":  "SNAPSHOT",
        "phase":  state.clock.phase(Utc::now()),
        "ranges": state.ranges.all().await,
        "stats":  stats_json(&state).await,
    })
    .to_string();

    if sender.send(Message::Text(snapshot)).await.is_err() {
        return;
    }

    // ── Event Loop ────────────────────────────────────────────────────────────
    loop {
        tokio::select! {
            result = rx.recv() => {
                match result {
                    Ok(json_str) => {
                        if sender.send(Message::Text(json_str)).await.is_err() {
                            break;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        debug!("WS client lagged, skipped {n} events");
                    }
                    Err(_) => break,
                }
            }

            result = receiver.next() => {
                match result {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("🔌 WebSocket client disconnected");
}
