//! # config: Session config from Environment Variables
//!
//! Read once at startup, immutable afterwards. `from_vars` takes a lookup
//! closure so tests never have to touch the real process environment.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveTime;
use chrono_tz::Tz;

use crate::engine::detector::Strictness;

const DEFAULT_SYMBOLS: &str = "SPY,QQQ,IWM,MSFT,GOOGL,META,AMZN,AAPL,TSLA,NVDA,PLTR";

/// Where feed events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Feed adapter POSTs bars / ticks to `/api/feed/*`
    Push,
    /// We poll `FEED_URL` for candles
    Poll,
}

impl std::fmt::Display for FeedMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedMode::Push => write!(f, "push"),
            FeedMode::Poll => write!(f, "poll"),
        }
    }
}

/// Config ทั้งหมดที่ monitor ต้องการ
#[derive(Debug, Clone)]
pub struct Config {
    /// Instruments to watch, e.g. `["SPY", "QQQ"]`
    pub symbols:           Vec<String>,
    /// Exchange timezone
    pub market_tz:         Tz,
    /// Daily anchor in exchange-local time
    pub session_open:      NaiveTime,
    /// Monitoring window offsets relative to the open
    pub window_start:      chrono::Duration,
    pub window_end:        chrono::Duration,
    /// How long monitors stay up after the window end
    pub window_linger:     chrono::Duration,
    pub bar_interval_secs: i64,
    pub strictness:        Strictness,

    // ── Feed ──────────────────────────────────────────────────────────────────
    pub feed_mode:         FeedMode,
    pub feed_url:          Option<String>,
    pub poll_interval:     Duration,
    pub poll_count:        usize,
    pub feed_max_failures: u32,
    pub window_recheck:    Duration,
    pub tick_close_grace:  chrono::Duration,

    // ── Notifier ──────────────────────────────────────────────────────────────
    /// None = log-only delivery
    pub webhook_url:       Option<String>,
    pub webhook_username:  String,
    pub webhook_tts:       bool,
    pub notify_timeout:    Duration,
    pub notify_on_start:   bool,

    // ── HTTP ──────────────────────────────────────────────────────────────────
    pub api_key:           Option<String>,
    pub bind_addr:         SocketAddr,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let num = |key: &str, default: &str| -> anyhow::Result<i64> {
            var(key, default)
                .trim()
                .parse::<i64>()
                .with_context(|| format!("{key} must be a number"))
        };
        let flag = |key: &str, default: bool| -> bool {
            lookup(key)
                .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0" | "no" | "off"))
                .unwrap_or(default)
        };
        let optional = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // ── Instruments ───────────────────────────────────────────────────────
        let mut symbols: Vec<String> = Vec::new();
        for s in var("SYMBOLS", DEFAULT_SYMBOLS).split(',') {
            let s = s.trim().to_uppercase();
            if !s.is_empty() && !symbols.contains(&s) {
                symbols.push(s);
            }
        }
        if symbols.is_empty() {
            bail!("SYMBOLS must list at least one instrument");
        }

        // ── Session ───────────────────────────────────────────────────────────
        let tz_name = var("MARKET_TZ", "US/Eastern");
        let market_tz: Tz = tz_name
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("Unknown MARKET_TZ '{tz_name}': {e}"))?;

        let open_str = var("SESSION_OPEN", "09:30");
        let session_open = NaiveTime::parse_from_str(open_str.trim(), "%H:%M")
            .with_context(|| format!("SESSION_OPEN must be HH:MM, got '{open_str}'"))?;

        let start_min = num("MONITOR_START_OFFSET_MIN", "30")?;
        let end_min   = num("MONITOR_END_OFFSET_MIN", "120")?;
        if start_min < 0 || end_min <= start_min {
            bail!("Monitoring window must satisfy 0 <= start < end (got {start_min}..{end_min} min)");
        }

        let bar_interval_secs = num("BAR_INTERVAL_SECS", "300")?;
        if bar_interval_secs < 60 || 86_400 % bar_interval_secs != 0 {
            bail!("BAR_INTERVAL_SECS must be >= 60 and divide a day evenly (got {bar_interval_secs})");
        }

        let strictness = if flag("DETECTOR_STRICT_OPEN", false) {
            Strictness::RequireOpenOutside
        } else {
            Strictness::Loose
        };

        // ── Feed ──────────────────────────────────────────────────────────────
        let feed_mode = match var("FEED_MODE", "push").trim().to_lowercase().as_str() {
            "push" => FeedMode::Push,
            "poll" => FeedMode::Poll,
            other => bail!("Unknown FEED_MODE: '{other}'. Use 'push' or 'poll'"),
        };
        let feed_url = optional("FEED_URL").map(|u| u.trim_end_matches('/').to_string());
        if feed_mode == FeedMode::Poll && feed_url.is_none() {
            bail!("FEED_URL is required when FEED_MODE=poll");
        }

        let poll_count = num("POLL_CANDLE_COUNT", "10")?;
        if poll_count < 2 {
            bail!("POLL_CANDLE_COUNT must be at least 2");
        }

        let bind_str = var("BIND_ADDR", "0.0.0.0:3000");
        let bind_addr = bind_str
            .trim()
            .parse()
            .with_context(|| format!("BIND_ADDR is not a socket address: '{bind_str}'"))?;

        Ok(Self {
            symbols,
            market_tz,
            session_open,
            window_start:      chrono::Duration::minutes(start_min),
            window_end:        chrono::Duration::minutes(end_min),
            window_linger:     chrono::Duration::seconds(num("MONITOR_END_GRACE_SECS", "60")?.max(0)),
            bar_interval_secs,
            strictness,
            feed_mode,
            feed_url,
            poll_interval:     Duration::from_secs(num("POLL_INTERVAL_SECS", "20")?.max(1) as u64),
            poll_count:        poll_count as usize,
            feed_max_failures: num("FEED_MAX_FAILURES", "5")?.max(1) as u32,
            window_recheck:    Duration::from_secs(num("WINDOW_RECHECK_SECS", "10")?.max(1) as u64),
            tick_close_grace:  chrono::Duration::seconds(num("TICK_CLOSE_GRACE_SECS", "10")?.max(0)),
            webhook_url:       optional("DISCORD_WEBHOOK_URL"),
            webhook_username:  var("WEBHOOK_USERNAME", "Opening Range Monitor"),
            webhook_tts:       flag("WEBHOOK_TTS", true),
            notify_timeout:    Duration::from_secs(num("NOTIFY_TIMEOUT_SECS", "5")?.max(1) as u64),
            notify_on_start:   flag("NOTIFY_ON_START", true),
            api_key:           optional("API_KEY"),
            bind_addr,
        })
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(|k| vars.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]).unwrap();
        assert_eq!(config.symbols.len(), 11);
        assert_eq!(config.market_tz, chrono_tz::US::Eastern);
        assert_eq!(config.session_open, NaiveTime::from_hms_opt(9, 30, 0).unwrap());
        assert_eq!(config.window_start, chrono::Duration::minutes(30));
        assert_eq!(config.window_end, chrono::Duration::minutes(120));
        assert_eq!(config.bar_interval_secs, 300);
        assert_eq!(config.strictness, Strictness::Loose);
        assert_eq!(config.feed_mode, FeedMode::Push);
        assert!(config.webhook_url.is_none());
        assert!(config.webhook_tts);
    }

    #[test]
    fn test_symbols_normalised() {
        let config = config_with(&[("SYMBOLS", " spy, QQQ ,spy,, nvda")]).unwrap();
        assert_eq!(config.symbols, vec!["SPY", "QQQ", "NVDA"]);
    }

    #[test]
    fn test_strict_toggle() {
        let config = config_with(&[("DETECTOR_STRICT_OPEN", "true")]).unwrap();
        assert_eq!(config.strictness, Strictness::RequireOpenOutside);
        let config = config_with(&[("DETECTOR_STRICT_OPEN", "0")]).unwrap();
        assert_eq!(config.strictness, Strictness::Loose);
    }

    #[test]
    fn test_poll_requires_url() {
        assert!(config_with(&[("FEED_MODE", "poll")]).is_err());
        let config = config_with(&[("FEED_MODE", "poll"), ("FEED_URL", "http://bridge:8080/")]).unwrap();
        assert_eq!(config.feed_url.as_deref(), Some("http://bridge:8080"));
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(config_with(&[("SYMBOLS", " , ")]).is_err());
        assert!(config_with(&[("MARKET_TZ", "Mars/Olympus")]).is_err());
        assert!(config_with(&[("SESSION_OPEN", "9h30")]).is_err());
        assert!(config_with(&[("MONITOR_START_OFFSET_MIN", "60"), ("MONITOR_END_OFFSET_MIN", "30")]).is_err());
        assert!(config_with(&[("BAR_INTERVAL_SECS", "7")]).is_err());
        assert!(config_with(&[("BAR_INTERVAL_SECS", "420")]).is_err());
        assert!(config_with(&[("FEED_MODE", "carrier-pigeon")]).is_err());
    }
}
