//! # firstbar: Opening-Range Rebound-Failure Monitor
//!
//! ```text
//!  ┌─────────────┐  POST /api/feed/bars    ┌────────────────────────────┐
//!  │ Feed bridge │ ──────────────────────▶ │ FeedHub                    │
//!  │ (push)      │  POST /api/feed/tick    │  └─mpsc─▶ monitor(SPY) ─┐  │
//!  └─────────────┘                         │  └─mpsc─▶ monitor(QQQ) ─┤  │
//!  ┌─────────────┐  GET /api/market/candles│                         │  │
//!  │ poll::      │ ◀─────────────────────▶ │ AppState                │  │
//!  │ run_poller  │ ──────────────────────▶ │ ├─ ranges  🔒           │  │
//!  └─────────────┘                         │ ├─ ledger               │  │
//!                                          │ ├─ notify_tx ◀──────────┘  │
//!                                          │ └─ broadcast_tx ─────────┐ │
//!  ┌─────────────┐  webhook POST           └──────────────────────────┼─┘
//!  │ Chat        │ ◀──────── dispatcher ◀── notify_tx                 │
//!  └─────────────┘                                                    │
//!  ┌─────────────┐  ws://host/ws/monitor  ◀───────────────────────────┘
//!  │  Dashboard  │  GET  /api/monitor/*
//!  └─────────────┘
//! ```
//!
//! ## Environment Variables
//!
//! | Variable              | Default        | Description                             |
//! |-----------------------|----------------|-----------------------------------------|
//! | `SYMBOLS`             | `SPY,QQQ,...`  | Comma-separated instruments             |
//! | `MARKET_TZ`           | `US/Eastern`   | Exchange timezone                       |
//! | `SESSION_OPEN`        | `09:30`        | Daily anchor (exchange-local)           |
//! | `FEED_MODE`           | `push`         | `push` (HTTP intake) or `poll`          |
//! | `FEED_URL`            | -              | Market bridge base URL (poll mode)      |
//! | `DISCORD_WEBHOOK_URL` | -              | Chat webhook; unset → log only          |
//! | `BIND_ADDR`           | `0.0.0.0:3000` | Address Axum listens on                 |
//! | `RUST_LOG`            | `firstbar=debug` | Tracing filter                        |

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod auth;
mod config;
mod engine;
mod error;
mod events;
mod feed;
mod models;
mod notify;
mod routes;
mod state;

use config::{Config, FeedMode};
use engine::monitor::InstrumentMonitor;
use notify::{spawn_dispatcher, startup_notice, WebhookNotifier};
use state::build_state;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env ──────────────────────────────────────────────────────────
    dotenvy::dotenv().ok();

    // ── 2. Structured logging ─────────────────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::from_default_env()
                .add_directive("firstbar=debug".parse()?)
                .add_directive("tower_http=info".parse()?)
                .add_directive("reqwest=warn".parse()?),
        )
        .init();

    info!(r#"

  ╔═══════════════════════════════════════════════════════╗
  ║        FIRSTBAR · Opening Range Monitor               ║
  ║  Lock · Detect · Dedup · Notify                       ║
  ╚═══════════════════════════════════════════════════════╝"#);

    // ── 3. Config ─────────────────────────────────────────────────────────────
    let config = Config::from_env().context("invalid configuration")?;
    info!(
        symbols    = ?config.symbols,
        tz         = %config.market_tz,
        open       = %config.session_open,
        feed_mode  = %config.feed_mode,
        strictness = ?config.strictness,
        "⚙️ Configuration loaded"
    );

    // ── 4. Shared state ───────────────────────────────────────────────────────
    let (state, notify_rx) = build_state(config);
    let config = state.config.clone();

    let now   = Utc::now();
    let today = state.clock.session_date(now);
    if state.clock.is_finished(now, config.window_linger) {
        info!(session_date = %today, "Monitoring window already over for today, nothing to do");
        return Ok(());
    }
    if let Some((start, end)) = state.clock.window(today) {
        info!(session_date = %today, %start, %end, "🕰️ Today's monitoring window");
    }

    // ── 5. Notifier ───────────────────────────────────────────────────────────
    if config.webhook_url.is_none() {
        warn!("DISCORD_WEBHOOK_URL not set, alerts will be logged only");
    }
    let notifier   = Arc::new(WebhookNotifier::from_config(&config, state.http_client.clone()));
    let dispatcher = spawn_dispatcher(notifier, notify_rx);

    // ── 6. Feed probe (poll mode) ─────────────────────────────────────────────
    if config.feed_mode == FeedMode::Poll {
        feed::poll::probe(&state).await?;
    }

    // ── 7. Per-instrument tasks ───────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);

    let mut monitors = Vec::with_capacity(config.symbols.len());
    let mut pollers  = Vec::new();
    for symbol in &config.symbols {
        let rx = state.feed.subscribe(symbol).await;
        let monitor = InstrumentMonitor::new(symbol, state.clone());
        monitors.push(tokio::spawn(monitor.run(rx, stop_rx.clone())));

        if config.feed_mode == FeedMode::Poll {
            pollers.push(tokio::spawn(feed::poll::run_poller(
                state.clone(),
                symbol.clone(),
                stop_rx.clone(),
            )));
        }
    }

    // ── 8. HTTP server ────────────────────────────────────────────────────────
    let app = routes::router(state.clone());
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "🚀 HTTP server starting");

    let mut server_stop = stop_rx.clone();
    let server = tokio::spawn(async move {
        let graceful = async move {
            let _ = server_stop.wait_for(|stop| *stop).await;
        };
        if let Err(e) = axum::serve(listener, app).with_graceful_shutdown(graceful).await {
            error!(error = %e, "HTTP server failed");
        }
    });

    if config.notify_on_start {
        if let Err(e) = state.notify_tx.try_send(startup_notice(&config, today)) {
            warn!(error = %e, "⚠️ Startup notice dropped");
        }
    }

    // ── 9. Wait for monitors or a shutdown signal ─────────────────────────────
    let all_monitors = join_all(monitors);
    tokio::pin!(all_monitors);

    let results = tokio::select! {
        results = &mut all_monitors => results,
        _ = shutdown_signal() => {
            warn!("🛑 Shutdown signal received, stopping monitors");
            let _ = stop_tx.send(true);
            all_monitors.await
        }
    };
    for result in results {
        if let Err(e) = result {
            error!(error = %e, "Monitor task panicked");
        }
    }

    // ── 10. Drain ─────────────────────────────────────────────────────────────
    let _ = stop_tx.send(true);
    join_all(pollers).await;
    if server.await.is_err() {
        error!("HTTP server task panicked");
    }

    // last reference to the state closes the notification queue
    drop(state);
    let drain = config.notify_timeout + Duration::from_secs(1);
    if tokio::time::timeout(drain, dispatcher).await.is_err() {
        warn!("Pending notifications not drained before exit");
    }

    info!("👋 Shutdown complete");
    Ok(())
}

/// SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
