//! Operator and admin actions on a single trade.
//!
//! Platform calls always happen before the transaction that records their
//! outcome, never inside it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::ingestion::pipeline::{IngestionSettings, UpsertTrade};
use crate::ingestion::{normalize, NormalizeError};
use crate::models::activity::actions;
use crate::models::{ActivityEntry, Trade, TradeStatus};
use crate::platforms::{PlatformAdapter, PlatformError, TradeChat};
use crate::services::events::{EngineEvent, TradeSummary};
use crate::services::notifier::alert_escalation;
use crate::services::Sinks;
use crate::store::{execute, Store, StoreError, StoreTx, UnitOfWork};

#[derive(Debug, Error)]
pub enum TradeActionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),

    #[error("trade {0} not found")]
    TradeNotFound(Uuid),

    #[error("no adapter configured for account {0}")]
    NoAdapter(Uuid),

    #[error("cannot move trade from {from} to {to}")]
    InvalidTransition { from: TradeStatus, to: TradeStatus },

    #[error("trade {trade_id} is not assigned to operator {operator_id}")]
    NotAssignee { trade_id: Uuid, operator_id: Uuid },

    #[error("platform did not confirm payment for {0}")]
    NotMarkedPaid(String),
}

async fn load_trade(store: &dyn Store, trade_id: Uuid) -> Result<Trade, TradeActionError> {
    let mut tx = store.begin().await?;
    let trade = tx.find_trade(trade_id).await?;
    tx.rollback().await?;
    trade.ok_or(TradeActionError::TradeNotFound(trade_id))
}

fn adapter_for<'a>(
    adapters: &'a [Arc<dyn PlatformAdapter>],
    trade: &Trade,
) -> Result<&'a dyn PlatformAdapter, TradeActionError> {
    adapters
        .iter()
        .find(|a| a.account().id == trade.account_id)
        .map(|a| a.as_ref())
        .ok_or(TradeActionError::NoAdapter(trade.account_id))
}

async fn announce(sinks: &Sinks, trade: &Trade, action: &str, performed_by: &str, details: serde_json::Value) {
    sinks
        .activity
        .append_activity(trade.id, action, performed_by, details)
        .await;
    sinks
        .events
        .publish(EngineEvent::TradeUpdated(TradeSummary::from(trade)));
}

// ---------------------------------------------------------------------------
// Status changes
// ---------------------------------------------------------------------------

struct Transition {
    trade_id: Uuid,
    to: TradeStatus,
    /// When set, only this payer may make the change.
    assignee: Option<Uuid>,
    entry: ActivityEntry,
}

#[async_trait]
impl UnitOfWork for Transition {
    type Output = Trade;
    type Error = TradeActionError;

    fn describe(&self) -> String {
        format!("move trade {} to {}", self.trade_id, self.to)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Trade, TradeActionError> {
        let mut trade = tx
            .find_trade(self.trade_id)
            .await?
            .ok_or(TradeActionError::TradeNotFound(self.trade_id))?;

        if let Some(operator_id) = self.assignee {
            if trade.assigned_payer_id != Some(operator_id) {
                return Err(TradeActionError::NotAssignee {
                    trade_id: trade.id,
                    operator_id,
                });
            }
        }

        let from = trade.status;
        if !trade.transition(self.to, self.entry.performed_at) {
            return Err(TradeActionError::InvalidTransition { from, to: self.to });
        }
        trade.log(self.entry.clone());
        tx.update_trade(&trade).await?;
        Ok(trade)
    }
}

/// ASSIGNED → COMPLETED for the assigned payer.
///
/// Marks the trade paid on the platform first. Platforms that cannot do that
/// remotely are completed locally with a warning.
pub async fn complete_trade(
    store: &dyn Store,
    sinks: &Sinks,
    adapters: &[Arc<dyn PlatformAdapter>],
    trade_id: Uuid,
    operator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Trade, TradeActionError> {
    let trade = load_trade(store, trade_id).await?;
    if trade.status != TradeStatus::Assigned {
        return Err(TradeActionError::InvalidTransition {
            from: trade.status,
            to: TradeStatus::Completed,
        });
    }
    if trade.assigned_payer_id != Some(operator_id) {
        return Err(TradeActionError::NotAssignee {
            trade_id,
            operator_id,
        });
    }

    let adapter = adapter_for(adapters, &trade)?;
    let marked_remotely = match adapter.mark_trade_as_paid(&trade.trade_hash).await {
        Ok(true) => true,
        Ok(false) => return Err(TradeActionError::NotMarkedPaid(trade.trade_hash)),
        Err(PlatformError::Unsupported { platform, .. }) => {
            tracing::warn!(
                trade_hash = %trade.trade_hash,
                platform = %platform,
                "Platform cannot mark paid remotely, completing locally"
            );
            false
        }
        Err(e) => return Err(e.into()),
    };

    let unit = Transition {
        trade_id,
        to: TradeStatus::Completed,
        assignee: Some(operator_id),
        entry: ActivityEntry::new(
            actions::TRADE_COMPLETED,
            operator_id.to_string(),
            now,
            json!({ "marked_paid_remotely": marked_remotely }),
        ),
    };
    let completed = execute(store, &unit).await?;

    tracing::info!(trade_hash = %completed.trade_hash, operator_id = %operator_id, "Trade completed");
    announce(
        sinks,
        &completed,
        actions::TRADE_COMPLETED,
        &operator_id.to_string(),
        json!({ "marked_paid_remotely": marked_remotely }),
    )
    .await;
    Ok(completed)
}

/// Any non-terminal status → CANCELLED.
pub async fn cancel_trade(
    store: &dyn Store,
    sinks: &Sinks,
    trade_id: Uuid,
    performed_by: &str,
    reason: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Trade, TradeActionError> {
    let details = json!({ "reason": reason });
    let unit = Transition {
        trade_id,
        to: TradeStatus::Cancelled,
        assignee: None,
        entry: ActivityEntry::new(actions::TRADE_CANCELLED, performed_by, now, details.clone()),
    };
    let cancelled = execute(store, &unit).await?;

    tracing::info!(trade_hash = %cancelled.trade_hash, performed_by, "Trade cancelled");
    announce(sinks, &cancelled, actions::TRADE_CANCELLED, performed_by, details).await;
    Ok(cancelled)
}

// ---------------------------------------------------------------------------
// Platform round trips
// ---------------------------------------------------------------------------

/// Re-fetch one trade from its platform and run it through the normal upsert.
pub async fn refresh_trade(
    store: &dyn Store,
    sinks: &Sinks,
    adapters: &[Arc<dyn PlatformAdapter>],
    settings: &IngestionSettings,
    trade_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Trade, TradeActionError> {
    let trade = load_trade(store, trade_id).await?;
    let adapter = adapter_for(adapters, &trade)?;

    let raw = tokio::time::timeout(
        settings.adapter_timeout,
        adapter.get_trade_details(&trade.trade_hash),
    )
    .await
    .map_err(|_| PlatformError::Timeout(settings.adapter_timeout.as_secs()))??;

    let incoming = normalize(&raw, adapter.account(), now)?;
    let outcome = execute(
        store,
        &UpsertTrade {
            incoming,
            now,
            default_selling_price: settings.default_selling_price,
        },
    )
    .await?;

    if let Some(escalation) = outcome.escalation {
        counter!("escalations_created_total").increment(1);
        alert_escalation(sinks.notifier.as_ref(), &escalation).await;
        sinks.events.publish(EngineEvent::EscalationRaised(escalation));
    }
    sinks
        .events
        .publish(EngineEvent::TradeUpdated(TradeSummary::from(&outcome.trade)));
    Ok(outcome.trade)
}

/// Current chat for a trade, straight from the platform.
pub async fn fetch_trade_chat(
    store: &dyn Store,
    adapters: &[Arc<dyn PlatformAdapter>],
    trade_id: Uuid,
) -> Result<TradeChat, TradeActionError> {
    let trade = load_trade(store, trade_id).await?;
    let adapter = adapter_for(adapters, &trade)?;
    Ok(adapter.get_trade_chat(&trade.trade_hash).await?)
}

struct AppendLog {
    trade_id: Uuid,
    entry: ActivityEntry,
}

#[async_trait]
impl UnitOfWork for AppendLog {
    type Output = Trade;
    type Error = TradeActionError;

    fn describe(&self) -> String {
        format!("append {} to trade {}", self.entry.action, self.trade_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Trade, TradeActionError> {
        let mut trade = tx
            .find_trade(self.trade_id)
            .await?
            .ok_or(TradeActionError::TradeNotFound(self.trade_id))?;
        trade.log(self.entry.clone());
        trade.updated_at = self.entry.performed_at;
        tx.update_trade(&trade).await?;
        Ok(trade)
    }
}

/// Post a chat message on the platform and record it on the trade.
pub async fn send_trade_message(
    store: &dyn Store,
    sinks: &Sinks,
    adapters: &[Arc<dyn PlatformAdapter>],
    trade_id: Uuid,
    performed_by: &str,
    text: &str,
    now: DateTime<Utc>,
) -> Result<Trade, TradeActionError> {
    let trade = load_trade(store, trade_id).await?;
    let adapter = adapter_for(adapters, &trade)?;
    adapter.send_trade_message(&trade.trade_hash, text).await?;

    let details = json!({ "length": text.chars().count() });
    let unit = AppendLog {
        trade_id,
        entry: ActivityEntry::new(actions::TRADE_MESSAGE_SENT, performed_by, now, details.clone()),
    };
    let updated = execute(store, &unit).await?;

    announce(sinks, &updated, actions::TRADE_MESSAGE_SENT, performed_by, details).await;
    Ok(updated)
}
