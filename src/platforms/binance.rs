use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::de::DeserializeOwned;
use sha2::Sha256;

use super::types::{BinanceOrder, BinanceResponse, BINANCE_ACTIVE_STATUSES};
use super::{PlatformAdapter, PlatformError, RawTrade, TradeChat};
use crate::models::PlatformAccount;

type HmacSha256 = Hmac<Sha256>;

pub const BINANCE_API_BASE: &str = "https://api.binance.com";

const RECV_WINDOW_MS: u64 = 5_000;

#[derive(Debug, Clone)]
pub struct BinanceAuth {
    pub api_key: String,
    pub api_secret: String,
}

impl BinanceAuth {
    pub fn new(api_key: String, api_secret: String) -> Self {
        Self {
            api_key,
            api_secret,
        }
    }

    /// Hex HMAC-SHA256 of the full query string, as Binance SAPI expects.
    pub fn sign(&self, query: &str) -> Result<String, PlatformError> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| PlatformError::Signing(e.to_string()))?;
        mac.update(query.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn signed_query(&self, params: &[(&str, String)], timestamp_ms: i64) -> Result<String, PlatformError> {
        let mut query: Vec<String> = params.iter().map(|(k, v)| format!("{k}={v}")).collect();
        query.push(format!("recvWindow={RECV_WINDOW_MS}"));
        query.push(format!("timestamp={timestamp_ms}"));
        let query = query.join("&");
        let signature = self.sign(&query)?;
        Ok(format!("{query}&signature={signature}"))
    }
}

/// Binance P2P (C2C) adapter. Read-only: the public API exposes no chat or
/// release endpoints, so those operations report `Unsupported`.
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    auth: BinanceAuth,
    account: PlatformAccount,
}

impl BinanceClient {
    pub fn new(http: Client, base_url: String, auth: BinanceAuth, account: PlatformAccount) -> Self {
        Self {
            http,
            base_url,
            auth,
            account,
        }
    }

    async fn signed_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, PlatformError> {
        let query = self
            .auth
            .signed_query(params, chrono::Utc::now().timestamp_millis())?;
        let url = format!("{}{}?{}", self.base_url.trim_end_matches('/'), path, query);

        let resp: BinanceResponse<T> = self
            .http
            .get(&url)
            .header("X-MBX-APIKEY", &self.auth.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        unwrap_response(resp, path)
    }

    fn unsupported(&self, operation: &'static str) -> PlatformError {
        PlatformError::Unsupported {
            platform: self.account.platform,
            operation,
        }
    }
}

fn unwrap_response<T>(resp: BinanceResponse<T>, path: &str) -> Result<T, PlatformError> {
    let ok_code = resp.code.as_deref().map_or(true, |c| c == "000000");
    if resp.success == Some(false) || !ok_code {
        return Err(PlatformError::Rejected(format!(
            "{path}: {} ({})",
            resp.message.unwrap_or_default(),
            resp.code.unwrap_or_default()
        )));
    }
    resp.data
        .ok_or_else(|| PlatformError::Unexpected(format!("{path}: missing data")))
}

fn to_raw(account: &PlatformAccount, order: &BinanceOrder) -> Result<RawTrade, PlatformError> {
    Ok(RawTrade {
        platform: account.platform,
        payload: serde_json::to_value(order)
            .map_err(|e| PlatformError::Unexpected(e.to_string()))?,
    })
}

#[async_trait]
impl PlatformAdapter for BinanceClient {
    fn account(&self) -> &PlatformAccount {
        &self.account
    }

    async fn list_active_trades(&self) -> Result<Vec<RawTrade>, PlatformError> {
        let mut active = Vec::new();
        for trade_type in ["BUY", "SELL"] {
            let orders: Vec<BinanceOrder> = self
                .signed_get(
                    "/sapi/v1/c2c/orderMatch/listUserOrderHistory",
                    &[("tradeType", trade_type.to_string()), ("rows", "100".into())],
                )
                .await?;

            for order in orders.iter().filter(|o| {
                o.order_status
                    .as_deref()
                    .is_some_and(|s| BINANCE_ACTIVE_STATUSES.contains(&s))
            }) {
                active.push(to_raw(&self.account, order)?);
            }
        }
        Ok(active)
    }

    async fn get_trade_details(&self, trade_hash: &str) -> Result<RawTrade, PlatformError> {
        let order: BinanceOrder = self
            .signed_get(
                "/sapi/v1/c2c/orderMatch/getUserOrderDetail",
                &[("adOrderNo", trade_hash.to_string())],
            )
            .await?;
        to_raw(&self.account, &order)
    }

    async fn get_trade_chat(&self, _trade_hash: &str) -> Result<TradeChat, PlatformError> {
        Err(self.unsupported("get_trade_chat"))
    }

    async fn mark_trade_as_paid(&self, _trade_hash: &str) -> Result<bool, PlatformError> {
        Err(self.unsupported("mark_trade_as_paid"))
    }

    async fn send_trade_message(&self, _trade_hash: &str, _text: &str) -> Result<(), PlatformError> {
        Err(self.unsupported("send_trade_message"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use uuid::Uuid;

    #[test]
    fn sign_matches_published_vector() {
        let auth = BinanceAuth::new(
            "key".into(),
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".into(),
        );
        let sig = auth
            .sign("symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559")
            .unwrap();
        assert_eq!(
            sig,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn signed_query_appends_timestamp_and_signature() {
        let auth = BinanceAuth::new("key".into(), "secret".into());
        let query = auth
            .signed_query(&[("tradeType", "BUY".into())], 1_700_000_000_000)
            .unwrap();
        assert!(query.starts_with("tradeType=BUY&recvWindow=5000&timestamp=1700000000000&signature="));
        let sig = query.rsplit('=').next().unwrap();
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn error_code_is_rejected() {
        let resp: BinanceResponse<Vec<BinanceOrder>> = serde_json::from_value(serde_json::json!({
            "code": "-1022",
            "message": "Signature for this request is not valid.",
            "success": false
        }))
        .unwrap();
        assert!(matches!(
            unwrap_response(resp, "/x"),
            Err(PlatformError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn chat_and_release_are_unsupported() {
        let client = BinanceClient::new(
            Client::new(),
            BINANCE_API_BASE.into(),
            BinanceAuth::new("k".into(), "s".into()),
            PlatformAccount {
                id: Uuid::new_v4(),
                platform: Platform::Binance,
                label: "main".into(),
            },
        );
        assert!(matches!(
            client.mark_trade_as_paid("1").await,
            Err(PlatformError::Unsupported { .. })
        ));
        assert!(matches!(
            client.send_trade_message("1", "hi").await,
            Err(PlatformError::Unsupported { .. })
        ));
    }
}
