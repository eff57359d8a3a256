//! # auth: API Key Middleware
//!
//! ป้องกัน Endpoint ด้วย `X-API-Key` header
//!
//! ## Mode
//! - `API_KEY` ไม่ได้ตั้ง (หรือ empty) → **Allow All** (Dev Mode)
//! - `API_KEY` ตั้งค่า → ต้องส่ง `X-API-Key: <key>` ทุก Request
//!
//! ## ยกเว้น
//! `GET /api/health` ไม่ต้อง Auth
//!
//! ```bash
//! curl -H "X-API-Key: $API_KEY" -d @bars.json http://localhost:3000/api/feed/bars
//! ```

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::{error::AppError, state::SharedState};

const HEALTH_PATH: &str = "/api/health";

/// Axum middleware: ตรวจสอบ X-API-Key header กับ `config.api_key`
pub async fn require_api_key(
    State(state): State<SharedState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // ── Dev Mode ──────────────────────────────────────────────────────────────
    let Some(expected) = state.config.api_key.as_deref() else {
        return next.run(request).await;
    };

    let path = request.uri().path().to_string();
    if path == HEALTH_PATH {
        return next.run(request).await;
    }

    let provided = request
        .headers()
        .get("X-API-Key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if provided == expected {
        next.run(request).await
    } else {
        warn!(path = %path, "❌ Unauthorized request, invalid or missing X-API-Key");
        AppError::Unauthorized("invalid or missing X-API-Key header".into()).into_response()
    }
}
