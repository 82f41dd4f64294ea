use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Platform, Trade};

/// A dispute raised against a trade, handed to the resolution workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: Uuid,
    pub trade_id: Uuid,
    pub trade_hash: String,
    pub platform: Platform,
    pub amount: Option<Decimal>,
    pub reason: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl Escalation {
    pub fn for_trade(trade: &Trade, reason: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trade_id: trade.id,
            trade_hash: trade.trade_hash.clone(),
            platform: trade.platform,
            amount: trade.amount,
            reason: reason.into(),
            status: escalation_status::PENDING.into(),
            created_at: now,
        }
    }
}

/// Escalation status constants.
pub mod escalation_status {
    pub const PENDING: &str = "PENDING";
}
