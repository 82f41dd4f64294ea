use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use thiserror::Error;

use crate::models::activity::actions;
use crate::models::{ActivityEntry, NewTrade, Platform, PlatformAccount};
use crate::platforms::types::{BinanceOrder, OfferwallTrade};
use crate::platforms::RawTrade;

/// Offer-wall platforms report crypto amounts in satoshi-like integer units.
pub const OFFERWALL_CRYPTO_SCALE: i64 = 100_000_000;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("malformed {platform} payload: {reason}")]
    Malformed { platform: Platform, reason: String },

    #[error("{0} payload has no trade hash")]
    MissingHash(Platform),

    #[error("payload from {payload} delivered to {account} adapter")]
    PlatformMismatch { payload: Platform, account: Platform },
}

/// Convert one raw platform payload into the canonical projection.
///
/// Pure: no I/O, no clock. Absent financial fields stay `None`; only the two
/// rate fields default to zero.
pub fn normalize(
    raw: &RawTrade,
    account: &PlatformAccount,
    now: DateTime<Utc>,
) -> Result<NewTrade, NormalizeError> {
    if raw.platform != account.platform {
        return Err(NormalizeError::PlatformMismatch {
            payload: raw.platform,
            account: account.platform,
        });
    }

    let mut trade = match raw.platform {
        Platform::Noones | Platform::Paxful => normalize_offerwall(raw, account)?,
        Platform::Binance => normalize_binance(raw, account)?,
    };

    if trade.trade_hash.trim().is_empty() {
        return Err(NormalizeError::MissingHash(raw.platform));
    }

    trade.activity_log = vec![ActivityEntry::system(
        actions::TRADE_INGESTED,
        now,
        json!({
            "platform": account.platform.as_str(),
            "account_id": account.id,
            "account": account.label,
        }),
    )];

    Ok(trade)
}

fn metadata(raw: &RawTrade, account: &PlatformAccount) -> serde_json::Value {
    json!({
        "raw": raw.payload,
        "account": {
            "id": account.id,
            "platform": account.platform.as_str(),
            "label": account.label,
        }
    })
}

fn malformed(platform: Platform, e: serde_json::Error) -> NormalizeError {
    NormalizeError::Malformed {
        platform,
        reason: e.to_string(),
    }
}

fn normalize_offerwall(raw: &RawTrade, account: &PlatformAccount) -> Result<NewTrade, NormalizeError> {
    let t: OfferwallTrade =
        serde_json::from_value(raw.payload.clone()).map_err(|e| malformed(raw.platform, e))?;

    let btc_amount = t
        .crypto_amount_total
        .map(|total| total / Decimal::from(OFFERWALL_CRYPTO_SCALE));

    Ok(NewTrade {
        trade_hash: t.trade_hash,
        platform: account.platform,
        account_id: account.id,
        trade_status: t.trade_status,
        amount: t.fiat_amount_requested,
        fiat_currency: t.fiat_currency_code,
        crypto_currency: t.crypto_currency_code,
        crypto_amount_requested: t.crypto_amount_requested,
        crypto_amount_total: t.crypto_amount_total,
        fee_amount: t.fee_crypto_amount,
        fee_percentage: t.fee_percentage,
        btc_rate: t.fiat_price_per_btc.unwrap_or(Decimal::ZERO),
        dollar_rate: t.crypto_current_rate_usd.unwrap_or(Decimal::ZERO),
        btc_amount,
        payment_method: t.payment_method_name,
        counterparty: t.responder_username,
        activity_log: Vec::new(),
        platform_metadata: metadata(raw, account),
    })
}

fn normalize_binance(raw: &RawTrade, account: &PlatformAccount) -> Result<NewTrade, NormalizeError> {
    let o: BinanceOrder =
        serde_json::from_value(raw.payload.clone()).map_err(|e| malformed(raw.platform, e))?;

    let is_btc = o.asset.as_deref() == Some("BTC");
    let btc_rate = if is_btc { o.unit_price } else { None };

    Ok(NewTrade {
        trade_hash: o.order_number,
        platform: account.platform,
        account_id: account.id,
        trade_status: o.order_status,
        amount: o.total_price,
        fiat_currency: o.fiat,
        crypto_currency: o.asset,
        crypto_amount_requested: o.amount,
        crypto_amount_total: o.amount,
        fee_amount: o.commission,
        fee_percentage: None,
        btc_rate: btc_rate.unwrap_or(Decimal::ZERO),
        dollar_rate: Decimal::ZERO,
        btc_amount: if is_btc { o.amount } else { None },
        payment_method: o.pay_method_name,
        counterparty: o.counter_part_nick_name,
        activity_log: Vec::new(),
        platform_metadata: metadata(raw, account),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn account(platform: Platform) -> PlatformAccount {
        PlatformAccount {
            id: Uuid::new_v4(),
            platform,
            label: "desk-1".into(),
        }
    }

    #[test]
    fn test_offerwall_full_payload() {
        let acct = account(Platform::Noones);
        let raw = RawTrade {
            platform: Platform::Noones,
            payload: json!({
                "trade_hash": "aB3xYz",
                "trade_status": "Active funded",
                "fiat_amount_requested": "150000",
                "fiat_currency_code": "NGN",
                "crypto_currency_code": "BTC",
                "crypto_amount_requested": 9800,
                "crypto_amount_total": 10000,
                "fee_crypto_amount": 200,
                "fee_percentage": "1",
                "fiat_price_per_btc": "1500000000",
                "crypto_current_rate_usd": "1650",
                "payment_method_name": "Bank Transfer",
                "responder_username": "bob",
            }),
        };

        let now = Utc::now();
        let t = normalize(&raw, &acct, now).unwrap();

        assert_eq!(t.trade_hash, "aB3xYz");
        assert_eq!(t.account_id, acct.id);
        assert_eq!(t.amount, Some(Decimal::from(150_000)));
        assert_eq!(t.btc_rate, Decimal::from(1_500_000_000));
        assert_eq!(t.dollar_rate, Decimal::from(1650));
        assert_eq!(t.btc_amount, Some(Decimal::new(10_000, 8)));
        assert_eq!(t.counterparty.as_deref(), Some("bob"));
        assert_eq!(t.activity_log.len(), 1);
        assert_eq!(t.activity_log[0].action, actions::TRADE_INGESTED);
        assert_eq!(t.activity_log[0].performed_at, now);
        assert_eq!(t.platform_metadata["account"]["label"], "desk-1");
        assert_eq!(t.platform_metadata["raw"]["trade_hash"], "aB3xYz");
    }

    #[test]
    fn test_absent_financials_stay_none() {
        let acct = account(Platform::Paxful);
        let raw = RawTrade {
            platform: Platform::Paxful,
            payload: json!({ "trade_hash": "h1", "fiat_amount_requested": null }),
        };
        let t = normalize(&raw, &acct, Utc::now()).unwrap();

        assert_eq!(t.amount, None);
        assert_eq!(t.fee_amount, None);
        assert_eq!(t.btc_amount, None);
        assert_eq!(t.btc_rate, Decimal::ZERO);
        assert_eq!(t.dollar_rate, Decimal::ZERO);
    }

    #[test]
    fn test_missing_hash_rejected() {
        let acct = account(Platform::Noones);
        let raw = RawTrade {
            platform: Platform::Noones,
            payload: json!({ "trade_status": "Paid" }),
        };
        assert!(matches!(
            normalize(&raw, &acct, Utc::now()),
            Err(NormalizeError::Malformed { .. })
        ));

        let blank = RawTrade {
            platform: Platform::Noones,
            payload: json!({ "trade_hash": "  " }),
        };
        assert!(matches!(
            normalize(&blank, &acct, Utc::now()),
            Err(NormalizeError::MissingHash(Platform::Noones))
        ));
    }

    #[test]
    fn test_binance_order() {
        let acct = account(Platform::Binance);
        let raw = RawTrade {
            platform: Platform::Binance,
            payload: json!({
                "orderNumber": "2045",
                "orderStatus": "BUYER_PAYED",
                "asset": "BTC",
                "fiat": "NGN",
                "amount": "0.0021",
                "totalPrice": "3150000",
                "unitPrice": "1500000000",
                "commission": "0.000002",
                "counterPartNickName": "carol",
            }),
        };
        let t = normalize(&raw, &acct, Utc::now()).unwrap();

        assert_eq!(t.trade_hash, "2045");
        assert_eq!(t.btc_amount, Some(Decimal::new(21, 4)));
        assert_eq!(t.btc_rate, Decimal::from(1_500_000_000));
        assert_eq!(t.dollar_rate, Decimal::ZERO);
        assert_eq!(t.amount, Some(Decimal::from(3_150_000)));
    }

    #[test]
    fn test_non_btc_binance_order_has_no_btc_fields() {
        let acct = account(Platform::Binance);
        let raw = RawTrade {
            platform: Platform::Binance,
            payload: json!({ "orderNumber": "9", "asset": "USDT", "amount": "100", "unitPrice": "1600" }),
        };
        let t = normalize(&raw, &acct, Utc::now()).unwrap();
        assert_eq!(t.btc_amount, None);
        assert_eq!(t.btc_rate, Decimal::ZERO);
    }

    #[test]
    fn test_platform_mismatch() {
        let acct = account(Platform::Binance);
        let raw = RawTrade {
            platform: Platform::Noones,
            payload: json!({ "trade_hash": "x" }),
        };
        assert!(matches!(
            normalize(&raw, &acct, Utc::now()),
            Err(NormalizeError::PlatformMismatch { .. })
        ));
    }
}
