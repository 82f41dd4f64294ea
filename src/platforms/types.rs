use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Offer-wall platforms (Noones, Paxful): REST envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub status: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeListData {
    #[serde(default)]
    pub trades: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeData {
    pub trade: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SuccessData {
    #[serde(default)]
    pub success: bool,
}

/// Trade as served by the offer-wall APIs. Crypto amounts are integers in
/// the coin's smallest unit (satoshi for BTC).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OfferwallTrade {
    pub trade_hash: String,
    #[serde(default)]
    pub trade_status: Option<String>,
    #[serde(default)]
    pub fiat_amount_requested: Option<Decimal>,
    #[serde(default)]
    pub fiat_currency_code: Option<String>,
    #[serde(default)]
    pub crypto_currency_code: Option<String>,
    #[serde(default)]
    pub crypto_amount_requested: Option<Decimal>,
    #[serde(default)]
    pub crypto_amount_total: Option<Decimal>,
    #[serde(default)]
    pub fee_crypto_amount: Option<Decimal>,
    #[serde(default)]
    pub fee_percentage: Option<Decimal>,
    #[serde(default)]
    pub fiat_price_per_btc: Option<Decimal>,
    #[serde(default)]
    pub crypto_current_rate_usd: Option<Decimal>,
    #[serde(default)]
    pub payment_method_name: Option<String>,
    #[serde(default)]
    pub responder_username: Option<String>,
    #[serde(default)]
    pub started_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Binance P2P (C2C)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceResponse<T> {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<T>,
    #[serde(default)]
    pub success: Option<bool>,
}

/// Binance C2C order. Amounts are decimal strings in asset units.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceOrder {
    pub order_number: String,
    #[serde(default)]
    pub order_status: Option<String>,
    #[serde(default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub asset: Option<String>,
    #[serde(default)]
    pub fiat: Option<String>,
    #[serde(default)]
    pub amount: Option<Decimal>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Option<Decimal>,
    #[serde(default)]
    pub commission: Option<Decimal>,
    #[serde(default)]
    pub counter_part_nick_name: Option<String>,
    #[serde(default)]
    pub pay_method_name: Option<String>,
    #[serde(default)]
    pub create_time: Option<i64>,
}

/// Binance order statuses that still need work on our side.
pub const BINANCE_ACTIVE_STATUSES: &[&str] = &[
    "PENDING",
    "TRADING",
    "BUYER_PAYED",
    "DISTRIBUTING",
    "IN_APPEAL",
    "APPEALING",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_without_data() {
        let env: ApiEnvelope<TradeListData> =
            serde_json::from_str(r#"{"status":"error","error":{"code":401,"message":"bad token"}}"#)
                .unwrap();
        assert!(env.data.is_none());
        assert_eq!(env.error.unwrap().code, Some(401));

        let env: ApiEnvelope<TradeListData> =
            serde_json::from_str(r#"{"status":"success","data":{"trades":[{"trade_hash":"abc"}]}}"#)
                .unwrap();
        assert_eq!(env.data.unwrap().trades.len(), 1);
    }

    #[test]
    fn test_binance_response_without_data() {
        let resp: BinanceResponse<Vec<BinanceOrder>> =
            serde_json::from_str(r#"{"code":"000002","message":"signature invalid","success":false}"#)
                .unwrap();
        assert!(resp.data.is_none());
        assert_eq!(resp.success, Some(false));

        let resp: BinanceResponse<Vec<BinanceOrder>> = serde_json::from_str(
            r#"{"code":"000000","data":[{"orderNumber":"2201","orderStatus":"TRADING","amount":"0.01"}],"success":true}"#,
        )
        .unwrap();
        let orders = resp.data.unwrap();
        assert_eq!(orders[0].order_number, "2201");
        assert_eq!(orders[0].amount, Some(Decimal::new(1, 2)));
    }
}
