//! # routes
//!
//! Axum router: push feed adapter + monitoring surface.

pub mod feed;
pub mod monitor;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{auth::require_api_key, state::SharedState};

use self::{
    feed::{push_bars, push_tick},
    monitor::{get_alerts, get_ranges, get_stats, health_check, ws_monitor},
};

pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health",          get(health_check))
        // ── Feed (push mode) ──────────────────────────────────────────────────
        .route("/api/feed/bars",       post(push_bars))
        .route("/api/feed/tick",       post(push_tick))
        // ── Monitor Loop ──────────────────────────────────────────────────────
        .route("/ws/monitor",          get(ws_monitor))
        .route("/api/monitor/ranges",  get(get_ranges))
        .route("/api/monitor/alerts",  get(get_alerts))
        .route("/api/monitor/stats",   get(get_stats))
        // ── Middleware ────────────────────────────────────────────────────────
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_api_key))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
