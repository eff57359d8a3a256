//! # notify: Chat webhook delivery
//!
//! Monitors never talk HTTP themselves. They `try_send` a [`Notification`]
//! into a bounded queue; the dispatcher spawns one delivery per message so
//! a slow webhook can't hold up the next alert or any bar processing.
//!
//! Payload is Discord-webhook compatible: a short `content` line (spoken when
//! `tts` is on) plus one embed with the details.
//!
//! No `DISCORD_WEBHOOK_URL` → messages are rendered and logged only.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{AlertEvent, AlertSeverity, FailureDirection};

/// Queue depth between monitors and the dispatcher
pub const NOTIFY_CHANNEL_SIZE: usize = 256;

const FOOTER: &str = "===== Opening range monitor =====";

// ─── Notification ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Notification {
    Alert(Box<AlertEvent>),
    Notice { title: String, description: String },
}

/// Sent once at startup when `NOTIFY_ON_START` is set.
pub fn startup_notice(config: &Config, session_date: NaiveDate) -> Notification {
    Notification::Notice {
        title:       "Opening range monitor started".into(),
        description: format!(
            "Watching {} · session {} · feed {}",
            config.symbols.join(", "),
            session_date,
            config.feed_mode
        ),
    }
}

// ─── Wire Format ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct WebhookMessage {
    pub username: String,
    pub tts:      bool,
    pub content:  String,
    pub embeds:   Vec<Embed>,
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title:       String,
    pub description: String,
    pub color:       u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields:      Vec<EmbedField>,
    pub footer:      EmbedFooter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EmbedField {
    pub name:   String,
    pub value:  String,
    pub inline: bool,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

fn field(name: &str, value: String) -> EmbedField {
    EmbedField { name: name.to_string(), value, inline: true }
}

// ─── Notifier ─────────────────────────────────────────────────────────────────

pub struct WebhookNotifier {
    client:   reqwest::Client,
    url:      Option<String>,
    username: String,
    tts:      bool,
    timeout:  Duration,
    tz:       Tz,
}

impl WebhookNotifier {
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        Self {
            client,
            url:      config.webhook_url.clone(),
            username: config.webhook_username.clone(),
            tts:      config.webhook_tts,
            timeout:  config.notify_timeout,
            tz:       config.market_tz,
        }
    }

    pub fn render(&self, notification: &Notification) -> WebhookMessage {
        let (content, embed) = match notification {
            Notification::Alert(event) => self.render_alert(event),
            Notification::Notice { title, description } => (
                title.clone(),
                Embed {
                    title:       title.clone(),
                    description: description.clone(),
                    color:       AlertSeverity::Info.color(),
                    fields:      Vec::new(),
                    footer:      EmbedFooter { text: FOOTER.to_string() },
                    timestamp:   None,
                },
            ),
        };

        WebhookMessage {
            username: self.username.clone(),
            tts:      self.tts,
            content,
            embeds:   vec![embed],
        }
    }

    fn render_alert(&self, event: &AlertEvent) -> (String, Embed) {
        let bar      = &event.trigger_bar;
        let range    = &event.opening_range;
        let severity = event.direction.severity();

        let (icon, description) = match event.direction {
            FailureDirection::UpwardFailure => (
                "📉",
                format!(
                    "**Status**: false breakout rejected (bearish)\n\
                     **Close**: {:.2} ≤ opening low {:.2}\n\
                     **Probed up to**: {:.2}",
                    bar.close, range.low, bar.high
                ),
            ),
            FailureDirection::DownwardFailure => (
                "📈",
                format!(
                    "**Status**: false breakdown reclaimed (bullish)\n\
                     **Close**: {:.2} ≥ opening high {:.2}\n\
                     **Probed down to**: {:.2}",
                    bar.close, range.high, bar.low
                ),
            ),
        };

        let local = bar.start.with_timezone(&self.tz);
        let embed = Embed {
            title: format!("{icon} {} {}", event.symbol, event.direction),
            description,
            color: severity.color(),
            fields: vec![
                field("Bar", local.format("%H:%M %Z").to_string()),
                field("Open", format!("{:.2}", bar.open)),
                field("High", format!("{:.2}", bar.high)),
                field("Low", format!("{:.2}", bar.low)),
                field("Close", format!("{:.2}", bar.close)),
                field("Opening range", format!("[{:.2} - {:.2}]", range.low, range.high)),
                field("Severity", severity.describe().to_string()),
            ],
            footer: EmbedFooter { text: FOOTER.to_string() },
            timestamp: Some(bar.start.to_rfc3339()),
        };

        (format!("Attention! {} {}", event.symbol, event.direction), embed)
    }

    /// POST one notification to the webhook.
    pub async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        let message = self.render(notification);

        let Some(url) = &self.url else {
            info!(content = %message.content, "🔕 No webhook configured, notification logged only");
            return Ok(());
        };

        let resp = self
            .client
            .post(url)
            .json(&message)
            .timeout(self.timeout)
            .send()
            .await
            .context("webhook unreachable")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("webhook rejected message: HTTP {status}: {body}");
        }

        info!(content = %message.content, "📨 Notification delivered");
        Ok(())
    }
}

// ─── Dispatcher ───────────────────────────────────────────────────────────────

/// Drain the queue until every sender is dropped, then wait for in-flight
/// deliveries (each bounded by the notifier timeout).
pub fn spawn_dispatcher(
    notifier: Arc<WebhookNotifier>,
    mut rx: mpsc::Receiver<Notification>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut inflight = JoinSet::new();

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(notification) => {
                        let notifier = notifier.clone();
                        inflight.spawn(async move {
                            if let Err(e) = notifier.deliver(&notification).await {
                                // at-most-once: no retry
                                warn!(error = %e, "⚠️ Notification delivery failed");
                            }
                        });
                    }
                    None => break,
                },
                Some(_) = inflight.join_next(), if !inflight.is_empty() => {}
            }
        }

        while inflight.join_next().await.is_some() {}
        info!("Notification dispatcher stopped");
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────────
