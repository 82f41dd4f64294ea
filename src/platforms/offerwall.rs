use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;

use super::types::{ApiEnvelope, SuccessData, TradeData, TradeListData};
use super::{PlatformAdapter, PlatformError, RawTrade, TradeChat};
use crate::models::PlatformAccount;

pub const NOONES_API_BASE: &str = "https://api.noones.com/noones/v1";
pub const PAXFUL_API_BASE: &str = "https://api.paxful.com/paxful/v1";

/// Client for the offer-wall style APIs shared by Noones and Paxful:
/// form-encoded POSTs with a bearer token, JSON `{status, data}` envelopes.
#[derive(Debug, Clone)]
pub struct OfferwallClient {
    http: Client,
    base_url: String,
    access_token: String,
    account: PlatformAccount,
}

impl OfferwallClient {
    pub fn new(http: Client, base_url: String, access_token: String, account: PlatformAccount) -> Self {
        Self {
            http,
            base_url,
            access_token,
            account,
        }
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, &str)],
    ) -> Result<T, PlatformError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), path);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await?
            .error_for_status()?;

        let envelope: ApiEnvelope<T> = resp.json().await?;
        unwrap_envelope(envelope, path)
    }
}

fn unwrap_envelope<T>(envelope: ApiEnvelope<T>, path: &str) -> Result<T, PlatformError> {
    if envelope.status.as_deref() == Some("error") || envelope.error.is_some() {
        let message = envelope
            .error
            .and_then(|e| e.message)
            .unwrap_or_else(|| "unknown error".into());
        return Err(PlatformError::Rejected(format!("{path}: {message}")));
    }
    envelope
        .data
        .ok_or_else(|| PlatformError::Unexpected(format!("{path}: missing data")))
}

#[async_trait]
impl PlatformAdapter for OfferwallClient {
    fn account(&self) -> &PlatformAccount {
        &self.account
    }

    async fn list_active_trades(&self) -> Result<Vec<RawTrade>, PlatformError> {
        let data: TradeListData = self.post("trade/list", &[]).await?;
        Ok(data
            .trades
            .into_iter()
            .map(|payload| RawTrade {
                platform: self.account.platform,
                payload,
            })
            .collect())
    }

    async fn get_trade_details(&self, trade_hash: &str) -> Result<RawTrade, PlatformError> {
        let data: TradeData = self.post("trade/get", &[("trade_hash", trade_hash)]).await?;
        Ok(RawTrade {
            platform: self.account.platform,
            payload: data.trade,
        })
    }

    async fn get_trade_chat(&self, trade_hash: &str) -> Result<TradeChat, PlatformError> {
        self.post("trade-chat/get", &[("trade_hash", trade_hash)]).await
    }

    async fn mark_trade_as_paid(&self, trade_hash: &str) -> Result<bool, PlatformError> {
        let data: SuccessData = self.post("trade/paid", &[("trade_hash", trade_hash)]).await?;
        Ok(data.success)
    }

    async fn send_trade_message(&self, trade_hash: &str, text: &str) -> Result<(), PlatformError> {
        let data: SuccessData = self
            .post("trade-chat/post", &[("trade_hash", trade_hash), ("message", text)])
            .await?;
        if data.success {
            Ok(())
        } else {
            Err(PlatformError::Rejected(format!("message to {trade_hash} not accepted")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_envelope_success() {
        let envelope: ApiEnvelope<TradeListData> = serde_json::from_value(json!({
            "status": "success",
            "data": { "trades": [{ "trade_hash": "abc" }] }
        }))
        .unwrap();
        let data = unwrap_envelope(envelope, "trade/list").unwrap();
        assert_eq!(data.trades.len(), 1);
    }

    #[test]
    fn test_unwrap_envelope_error() {
        let envelope: ApiEnvelope<TradeListData> = serde_json::from_value(json!({
            "status": "error",
            "error": { "code": 401, "message": "Unauthorized" }
        }))
        .unwrap();
        let err = unwrap_envelope(envelope, "trade/list").unwrap_err();
        assert!(matches!(err, PlatformError::Rejected(msg) if msg.contains("Unauthorized")));
    }

    #[test]
    fn test_chat_payload_shape() {
        let envelope: ApiEnvelope<TradeChat> = serde_json::from_value(json!({
            "status": "success",
            "data": {
                "messages": [{ "id": "m1", "author": "alice", "text": "paid", "timestamp": 1700000000 }],
                "attachments": []
            }
        }))
        .unwrap();
        let chat = unwrap_envelope(envelope, "trade-chat/get").unwrap();
        assert_eq!(chat.messages[0].text.as_deref(), Some("paid"));
    }
}
