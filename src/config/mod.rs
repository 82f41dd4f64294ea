use chrono::FixedOffset;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

use crate::platforms::binance::BINANCE_API_BASE;
use crate::platforms::offerwall::{NOONES_API_BASE, PAXFUL_API_BASE};

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub api_token: Option<String>,
    pub log_format: String,

    // Engine cadence
    pub ingestion_interval_secs: u64,
    pub dispatch_interval_secs: u64,
    pub trade_batch_size: usize,
    pub pending_stale_secs: i64,
    pub adapter_timeout_secs: u64,

    // Shifts
    pub shift_utc_offset_minutes: i32,

    /// Used when `runtime_config` has no selling price yet.
    pub default_selling_price: Option<Decimal>,

    // Notifications
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub notifications_enabled: bool,

    // Platform endpoints
    pub noones_api_url: String,
    pub paxful_api_url: String,
    pub binance_api_url: String,
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            api_token: env::var("API_TOKEN").ok().filter(|t| !t.is_empty()),
            log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".into()),

            ingestion_interval_secs: parse_or("INGESTION_INTERVAL_SECS", 30),
            dispatch_interval_secs: parse_or("DISPATCH_INTERVAL_SECS", 15),
            trade_batch_size: parse_or("TRADE_BATCH_SIZE", 5),
            pending_stale_secs: parse_or("PENDING_STALE_SECS", 300),
            adapter_timeout_secs: parse_or("ADAPTER_TIMEOUT_SECS", 20),

            shift_utc_offset_minutes: parse_or("SHIFT_UTC_OFFSET_MINUTES", 60),

            default_selling_price: env::var("DEFAULT_SELLING_PRICE")
                .ok()
                .and_then(|v| v.parse().ok()),

            telegram_bot_token: env::var("TELEGRAM_BOT_TOKEN").ok(),
            telegram_chat_id: env::var("TELEGRAM_CHAT_ID").ok(),
            notifications_enabled: parse_or("NOTIFICATIONS_ENABLED", true),

            noones_api_url: env::var("NOONES_API_URL").unwrap_or_else(|_| NOONES_API_BASE.into()),
            paxful_api_url: env::var("PAXFUL_API_URL").unwrap_or_else(|_| PAXFUL_API_BASE.into()),
            binance_api_url: env::var("BINANCE_API_URL")
                .unwrap_or_else(|_| BINANCE_API_BASE.into()),
        })
    }

    /// Local offset the shift windows are expressed in.
    pub fn shift_offset(&self) -> anyhow::Result<FixedOffset> {
        FixedOffset::east_opt(self.shift_utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!(
                "SHIFT_UTC_OFFSET_MINUTES out of range: {}",
                self.shift_utc_offset_minutes
            )
        })
    }

    /// Returns true if Telegram credentials are configured and enabled.
    pub fn has_telegram(&self) -> bool {
        self.notifications_enabled
            && self.telegram_bot_token.is_some()
            && self.telegram_chat_id.is_some()
    }
}
