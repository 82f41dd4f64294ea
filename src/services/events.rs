use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Escalation, Platform, Shift, Trade};

/// Events broadcast to connected WebSocket clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum EngineEvent {
    #[serde(rename = "trade_ingested")]
    TradeIngested(TradeSummary),

    #[serde(rename = "trade_flagged")]
    TradeFlagged(TradeSummary),

    #[serde(rename = "trade_assigned")]
    TradeAssigned { trade: TradeSummary, operator_id: Uuid },

    #[serde(rename = "trade_updated")]
    TradeUpdated(TradeSummary),

    #[serde(rename = "escalation_raised")]
    EscalationRaised(Escalation),

    #[serde(rename = "shift_changed")]
    ShiftChanged(Shift),
}

/// Compact trade view for the event stream; raw payloads stay server side.
#[derive(Debug, Clone, Serialize)]
pub struct TradeSummary {
    pub id: Uuid,
    pub trade_hash: String,
    pub platform: Platform,
    pub status: String,
    pub trade_status: Option<String>,
    pub amount: Option<String>,
    pub flagged: bool,
    pub assigned_payer_id: Option<Uuid>,
}

impl From<&Trade> for TradeSummary {
    fn from(t: &Trade) -> Self {
        Self {
            id: t.id,
            trade_hash: t.trade_hash.clone(),
            platform: t.platform,
            status: t.status.as_str().to_string(),
            trade_status: t.trade_status.clone(),
            amount: t.amount.map(|a| a.to_string()),
            flagged: t.flagged,
            assigned_payer_id: t.assigned_payer_id,
        }
    }
}

/// Where the engine publishes state changes. Publishing never fails.
pub trait EventSink: Send + Sync {
    fn publish(&self, event: EngineEvent);
}

/// Production sink backed by a tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<EngineEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, event: EngineEvent) {
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

#[derive(Debug, Clone, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn publish(&self, _event: EngineEvent) {}
}
