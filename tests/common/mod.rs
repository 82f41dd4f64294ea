use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::json;
use uuid::Uuid;

use tradedesk::models::{Operator, Platform, PlatformAccount, Shift, ShiftType};
use tradedesk::platforms::{PlatformAdapter, PlatformError, RawTrade, TradeChat};
use tradedesk::services::activity::TracingActivitySink;
use tradedesk::services::events::{EngineEvent, EventSink};
use tradedesk::services::notifier::{NotificationSink, Priority};
use tradedesk::services::Sinks;
use tradedesk::store::MemoryStore;

/// Parse an RFC 3339 timestamp.
#[allow(dead_code)]
pub fn at(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid timestamp")
        .with_timezone(&Utc)
}

#[allow(dead_code)]
pub fn account(platform: Platform, label: &str) -> PlatformAccount {
    PlatformAccount {
        id: Uuid::new_v4(),
        platform,
        label: label.into(),
    }
}

/// Offer-wall trade payload with a given remote status and USD rate.
#[allow(dead_code)]
pub fn offerwall_payload(trade_hash: &str, status: &str, usd_rate: Decimal) -> serde_json::Value {
    json!({
        "trade_hash": trade_hash,
        "trade_status": status,
        "fiat_amount_requested": "150000",
        "fiat_currency_code": "NGN",
        "crypto_currency_code": "BTC",
        "crypto_amount_requested": 9800,
        "crypto_amount_total": 10000,
        "fee_crypto_amount": 200,
        "fee_percentage": "1",
        "fiat_price_per_btc": "1500000000",
        "crypto_current_rate_usd": usd_rate.to_string(),
        "payment_method_name": "Bank Transfer",
        "responder_username": "counterparty",
    })
}

#[allow(dead_code)]
pub fn offerwall_raw(trade_hash: &str, status: &str, usd_rate: Decimal) -> RawTrade {
    RawTrade {
        platform: Platform::Noones,
        payload: offerwall_payload(trade_hash, status, usd_rate),
    }
}

// ---------------------------------------------------------------------------
// FakeAdapter
// ---------------------------------------------------------------------------

/// Adapter serving canned trades, or failing every call.
pub struct FakeAdapter {
    account: PlatformAccount,
    trades: Mutex<Vec<RawTrade>>,
    failing: bool,
    can_mark_paid: bool,
    pub marked_paid: Mutex<Vec<String>>,
    pub sent: Mutex<Vec<(String, String)>>,
}

#[allow(dead_code)]
impl FakeAdapter {
    pub fn new(account: PlatformAccount, trades: Vec<RawTrade>) -> Self {
        Self {
            account,
            trades: Mutex::new(trades),
            failing: false,
            can_mark_paid: true,
            marked_paid: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(account: PlatformAccount) -> Self {
        Self {
            failing: true,
            ..Self::new(account, Vec::new())
        }
    }

    /// Behave like a platform without a remote "mark paid" call.
    pub fn without_mark_paid(mut self) -> Self {
        self.can_mark_paid = false;
        self
    }

    pub fn set_trades(&self, trades: Vec<RawTrade>) {
        *self.trades.lock().unwrap() = trades;
    }

    fn check(&self) -> Result<(), PlatformError> {
        if self.failing {
            Err(PlatformError::Rejected("account suspended".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PlatformAdapter for FakeAdapter {
    fn account(&self) -> &PlatformAccount {
        &self.account
    }

    async fn list_active_trades(&self) -> Result<Vec<RawTrade>, PlatformError> {
        self.check()?;
        Ok(self.trades.lock().unwrap().clone())
    }

    async fn get_trade_details(&self, trade_hash: &str) -> Result<RawTrade, PlatformError> {
        self.check()?;
        self.trades
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.payload["trade_hash"] == trade_hash)
            .cloned()
            .ok_or_else(|| PlatformError::Rejected(format!("unknown trade {trade_hash}")))
    }

    async fn get_trade_chat(&self, _trade_hash: &str) -> Result<TradeChat, PlatformError> {
        self.check()?;
        Ok(TradeChat::default())
    }

    async fn mark_trade_as_paid(&self, trade_hash: &str) -> Result<bool, PlatformError> {
        self.check()?;
        if !self.can_mark_paid {
            return Err(PlatformError::Unsupported {
                platform: self.account.platform,
                operation: "mark trade as paid",
            });
        }
        self.marked_paid.lock().unwrap().push(trade_hash.to_string());
        Ok(true)
    }

    async fn send_trade_message(&self, trade_hash: &str, text: &str) -> Result<(), PlatformError> {
        self.check()?;
        self.sent
            .lock()
            .unwrap()
            .push((trade_hash.to_string(), text.to_string()));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Recording sinks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(Uuid, String, Priority)>>,
}

#[async_trait]
impl NotificationSink for RecordingNotifier {
    async fn notify(&self, operator_id: Uuid, title: &str, _description: &str, priority: Priority) {
        self.sent
            .lock()
            .unwrap()
            .push((operator_id, title.to_string(), priority));
    }
}

#[derive(Default)]
pub struct RecordingEvents {
    pub events: Mutex<Vec<EngineEvent>>,
}

#[allow(dead_code)]
impl RecordingEvents {
    pub fn count(&self, pred: impl Fn(&EngineEvent) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingEvents {
    fn publish(&self, event: EngineEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Sinks that record notifications and events for assertions.
#[allow(dead_code)]
pub fn recording_sinks() -> (Sinks, Arc<RecordingNotifier>, Arc<RecordingEvents>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let events = Arc::new(RecordingEvents::default());
    let sinks = Sinks::new(
        notifier.clone(),
        events.clone(),
        Arc::new(TracingActivitySink),
    );
    (sinks, notifier, events)
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// Seed a payer holding an ACTIVE, clocked-in shift.
#[allow(dead_code)]
pub async fn payer_on_shift(
    store: &MemoryStore,
    username: &str,
    created_at: DateTime<Utc>,
    shift_start: DateTime<Utc>,
) -> Operator {
    let operator = store.add_operator(username, created_at).await;
    let mut shift = Shift::new(operator.id, ShiftType::Morning, shift_start);
    shift.is_clocked_in = true;
    shift.clock_in_time = Some(shift_start);
    store.put_shift(shift).await;
    operator
}
