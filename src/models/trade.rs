use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{ActivityEntry, Platform};

// ---------------------------------------------------------------------------
// TradeStatus: internal lifecycle, independent of the platform's own status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeStatus {
    Pending,
    Assigned,
    Completed,
    Cancelled,
    Disputed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "PENDING",
            TradeStatus::Assigned => "ASSIGNED",
            TradeStatus::Completed => "COMPLETED",
            TradeStatus::Cancelled => "CANCELLED",
            TradeStatus::Disputed => "DISPUTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(TradeStatus::Pending),
            "ASSIGNED" => Some(TradeStatus::Assigned),
            "COMPLETED" => Some(TradeStatus::Completed),
            "CANCELLED" => Some(TradeStatus::Cancelled),
            "DISPUTED" => Some(TradeStatus::Disputed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TradeStatus::Completed | TradeStatus::Cancelled | TradeStatus::Disputed
        )
    }

    /// PENDING → ASSIGNED → COMPLETED | CANCELLED | DISPUTED.
    /// CANCELLED and DISPUTED are also reachable straight from PENDING.
    pub fn can_transition_to(&self, next: TradeStatus) -> bool {
        match (self, next) {
            (TradeStatus::Pending, TradeStatus::Assigned) => true,
            (TradeStatus::Assigned, TradeStatus::Completed) => true,
            (TradeStatus::Pending | TradeStatus::Assigned, TradeStatus::Cancelled) => true,
            (TradeStatus::Pending | TradeStatus::Assigned, TradeStatus::Disputed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// NewTrade: canonical projection produced by the normalizer
// ---------------------------------------------------------------------------

/// Platform-sourced view of a trade, not yet persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTrade {
    pub trade_hash: String,
    pub platform: Platform,
    pub account_id: Uuid,
    /// Raw remote status string ("Paid", "Dispute open", "IN_APPEAL", ...).
    pub trade_status: Option<String>,
    pub amount: Option<Decimal>,
    pub fiat_currency: Option<String>,
    pub crypto_currency: Option<String>,
    pub crypto_amount_requested: Option<Decimal>,
    pub crypto_amount_total: Option<Decimal>,
    pub fee_amount: Option<Decimal>,
    pub fee_percentage: Option<Decimal>,
    pub btc_rate: Decimal,
    pub dollar_rate: Decimal,
    pub btc_amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub counterparty: Option<String>,
    pub activity_log: Vec<ActivityEntry>,
    pub platform_metadata: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Trade: stored row
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub trade_hash: String,
    pub platform: Platform,
    pub account_id: Uuid,
    pub status: TradeStatus,
    pub trade_status: Option<String>,
    pub amount: Option<Decimal>,
    pub fiat_currency: Option<String>,
    pub crypto_currency: Option<String>,
    pub crypto_amount_requested: Option<Decimal>,
    pub crypto_amount_total: Option<Decimal>,
    pub fee_amount: Option<Decimal>,
    pub fee_percentage: Option<Decimal>,
    pub btc_rate: Decimal,
    pub dollar_rate: Decimal,
    pub btc_amount: Option<Decimal>,
    pub payment_method: Option<String>,
    pub counterparty: Option<String>,
    pub assigned_payer_id: Option<Uuid>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub flagged: bool,
    pub activity_log: Vec<ActivityEntry>,
    pub platform_metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trade {
    /// Build a fresh PENDING row from an incoming projection.
    pub fn from_projection(incoming: NewTrade, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trade_hash: incoming.trade_hash,
            platform: incoming.platform,
            account_id: incoming.account_id,
            status: TradeStatus::Pending,
            trade_status: incoming.trade_status,
            amount: incoming.amount,
            fiat_currency: incoming.fiat_currency,
            crypto_currency: incoming.crypto_currency,
            crypto_amount_requested: incoming.crypto_amount_requested,
            crypto_amount_total: incoming.crypto_amount_total,
            fee_amount: incoming.fee_amount,
            fee_percentage: incoming.fee_percentage,
            btc_rate: incoming.btc_rate,
            dollar_rate: incoming.dollar_rate,
            btc_amount: incoming.btc_amount,
            payment_method: incoming.payment_method,
            counterparty: incoming.counterparty,
            assigned_payer_id: None,
            assigned_at: None,
            completed_at: None,
            flagged: false,
            activity_log: incoming.activity_log,
            platform_metadata: incoming.platform_metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge a re-ingested projection into this row.
    ///
    /// Platform-sourced fields are overwritten; the activity log is extended;
    /// identity, provenance (`account_id`, `created_at`), internal status,
    /// assignment and the sticky `flagged` bit are kept.
    pub fn apply_projection(&mut self, incoming: NewTrade, now: DateTime<Utc>) {
        self.trade_status = incoming.trade_status;
        self.amount = incoming.amount;
        self.fiat_currency = incoming.fiat_currency;
        self.crypto_currency = incoming.crypto_currency;
        self.crypto_amount_requested = incoming.crypto_amount_requested;
        self.crypto_amount_total = incoming.crypto_amount_total;
        self.fee_amount = incoming.fee_amount;
        self.fee_percentage = incoming.fee_percentage;
        self.btc_rate = incoming.btc_rate;
        self.dollar_rate = incoming.dollar_rate;
        self.btc_amount = incoming.btc_amount;
        self.payment_method = incoming.payment_method;
        self.counterparty = incoming.counterparty;
        self.platform_metadata = incoming.platform_metadata;
        self.activity_log.extend(incoming.activity_log);
        self.updated_at = now;
    }

    /// Move to `next` if the lifecycle allows it. Returns false otherwise.
    pub fn transition(&mut self, next: TradeStatus, now: DateTime<Utc>) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next == TradeStatus::Completed {
            self.completed_at = Some(now);
        }
        self.updated_at = now;
        true
    }

    pub fn log(&mut self, entry: ActivityEntry) {
        self.activity_log.push(entry);
    }
}
