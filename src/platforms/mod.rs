//! External P2P platform adapters.
//!
//! One adapter instance serves one (platform, account) pair. Platforms that
//! cannot post chat messages or mark trades paid return
//! [`PlatformError::Unsupported`] instead of silently doing nothing.

pub mod binance;
pub mod offerwall;
pub mod types;

pub use binance::{BinanceAuth, BinanceClient};
pub use offerwall::OfferwallClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::config::AppConfig;
use crate::db::account_repo::AccountRow;
use crate::models::{Platform, PlatformAccount};

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{platform} does not support {operation}")]
    Unsupported {
        platform: Platform,
        operation: &'static str,
    },

    #[error("platform rejected request: {0}")]
    Rejected(String),

    #[error("unexpected response: {0}")]
    Unexpected(String),

    #[error("request signing failed: {0}")]
    Signing(String),

    #[error("timed out after {0} s")]
    Timeout(u64),
}

/// Raw trade payload exactly as the platform returned it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    pub platform: Platform,
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TradeChat {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

#[async_trait]
pub trait PlatformAdapter: Send + Sync {
    fn account(&self) -> &PlatformAccount;

    async fn list_active_trades(&self) -> Result<Vec<RawTrade>, PlatformError>;

    async fn get_trade_details(&self, trade_hash: &str) -> Result<RawTrade, PlatformError>;

    async fn get_trade_chat(&self, trade_hash: &str) -> Result<TradeChat, PlatformError>;

    async fn mark_trade_as_paid(&self, trade_hash: &str) -> Result<bool, PlatformError>;

    async fn send_trade_message(&self, trade_hash: &str, text: &str) -> Result<(), PlatformError>;
}

/// Build one adapter per usable account row. Rows with an unknown platform
/// or missing credentials are logged and skipped.
pub fn build_adapters(
    rows: &[AccountRow],
    config: &AppConfig,
    http: &reqwest::Client,
) -> Vec<Arc<dyn PlatformAdapter>> {
    let mut adapters: Vec<Arc<dyn PlatformAdapter>> = Vec::with_capacity(rows.len());

    for row in rows {
        let Some(account) = row.account() else {
            tracing::warn!(account_id = %row.id, platform = %row.platform, "Unknown platform, skipping account");
            continue;
        };

        match account.platform {
            Platform::Noones | Platform::Paxful => {
                let base_url = if account.platform == Platform::Noones {
                    config.noones_api_url.clone()
                } else {
                    config.paxful_api_url.clone()
                };
                adapters.push(Arc::new(OfferwallClient::new(
                    http.clone(),
                    base_url,
                    row.api_key.clone(),
                    account,
                )));
            }
            Platform::Binance => {
                let Some(secret) = row.api_secret.clone() else {
                    tracing::warn!(account = %account, "Binance account has no API secret, skipping");
                    continue;
                };
                adapters.push(Arc::new(BinanceClient::new(
                    http.clone(),
                    config.binance_api_url.clone(),
                    BinanceAuth::new(row.api_key.clone(), secret),
                    account,
                )));
            }
        }
    }

    adapters
}
