//! Fair dispatch of PENDING trades to payers on shift.
//!
//! Trades are served oldest first; payers are scanned in account-creation
//! order. Each assignment is its own transaction and re-checks that the payer
//! is still free right before writing. The `trades_one_assigned_per_payer`
//! partial unique index backs the same rule at the storage level.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use metrics::{counter, gauge};
use serde::Serialize;
use serde_json::json;
use std::collections::HashSet;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::models::activity::actions;
use crate::models::{ActivityEntry, DispatchCandidate, Trade, TradeStatus};
use crate::services::events::{EngineEvent, TradeSummary};
use crate::services::notifier::{format_assignment, Priority};
use crate::services::Sinks;
use crate::store::{execute, Store, StoreError, StoreTx, UnitOfWork};

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// PENDING trades older than this are reported as overdue.
    pub pending_stale: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            pending_stale: Duration::minutes(5),
        }
    }
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            pending_stale: Duration::seconds(config.pending_stale_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub trade_id: Uuid,
    pub trade_hash: String,
    pub operator_id: Uuid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub pending: usize,
    pub candidates: usize,
    pub assigned: Vec<Assignment>,
    /// Re-verification found the payer busy; the next payer was tried.
    pub conflicts: usize,
    /// Assignment transactions that failed; those trades stay PENDING.
    pub failed: usize,
    /// PENDING trades left after this pass.
    pub unassigned: usize,
    /// True when the pass stopped because no payer qualified.
    pub exhausted: bool,
    pub overdue: usize,
}

// ---------------------------------------------------------------------------
// AssignTrade
// ---------------------------------------------------------------------------

#[derive(Debug)]
enum AssignResult {
    Assigned(Trade),
    /// The payer picked up another trade since the snapshot.
    OperatorBusy,
    /// The trade left PENDING since the snapshot.
    TradeGone,
}

struct AssignTrade<'a> {
    trade: &'a Trade,
    candidate: &'a DispatchCandidate,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for AssignTrade<'_> {
    type Output = AssignResult;
    type Error = StoreError;

    fn describe(&self) -> String {
        format!(
            "assign trade {} to {}",
            self.trade.trade_hash, self.candidate.username
        )
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<AssignResult, StoreError> {
        if tx.has_assigned_trade(self.candidate.operator_id).await? {
            return Ok(AssignResult::OperatorBusy);
        }

        match tx.find_trade(self.trade.id).await? {
            Some(t) if t.status == TradeStatus::Pending => {}
            _ => return Ok(AssignResult::TradeGone),
        }

        let entry = ActivityEntry::system(
            actions::TRADE_ASSIGNED,
            self.now,
            json!({
                "operator_id": self.candidate.operator_id,
                "username": self.candidate.username,
            }),
        );

        match tx
            .assign_trade(self.trade.id, self.candidate.operator_id, self.now, &entry)
            .await
        {
            Ok(()) => {}
            Err(StoreError::Conflict(_)) => return Ok(AssignResult::OperatorBusy),
            Err(e) => return Err(e),
        }

        let assigned = tx
            .find_trade(self.trade.id)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("trade {}", self.trade.id)))?;

        Ok(AssignResult::Assigned(assigned))
    }
}

async fn snapshot(store: &dyn Store) -> Result<(Vec<Trade>, Vec<DispatchCandidate>), StoreError> {
    let mut tx = store.begin().await?;
    let pending = tx.pending_trades().await?;
    let candidates = tx.dispatch_candidates().await?;
    tx.rollback().await?;
    Ok((pending, candidates))
}

async fn is_busy(store: &dyn Store, operator_id: Uuid) -> Result<bool, StoreError> {
    let mut tx = store.begin().await?;
    let busy = tx.has_assigned_trade(operator_id).await?;
    tx.rollback().await?;
    Ok(busy)
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// Run one dispatch pass.
///
/// Fails only when the initial snapshot cannot be read. Individual assignment
/// failures are logged and leave the trade PENDING.
pub async fn run_dispatch_pass(
    store: &dyn Store,
    sinks: &Sinks,
    settings: &DispatchSettings,
    now: DateTime<Utc>,
) -> Result<DispatchReport, StoreError> {
    let (pending, candidates) = snapshot(store).await?;

    let mut report = DispatchReport {
        pending: pending.len(),
        candidates: candidates.len(),
        ..Default::default()
    };
    gauge!("available_operators").set(candidates.len() as f64);

    let mut claimed: HashSet<Uuid> = HashSet::new();
    let mut assigned_ids: HashSet<Uuid> = HashSet::new();

    'trades: for trade in &pending {
        let mut placed = false;

        for candidate in &candidates {
            if claimed.contains(&candidate.operator_id) {
                continue;
            }

            match is_busy(store, candidate.operator_id).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(operator_id = %candidate.operator_id, error = %e, "Availability check failed");
                    continue;
                }
            }

            let unit = AssignTrade {
                trade,
                candidate,
                now,
            };

            match execute(store, &unit).await {
                Ok(AssignResult::Assigned(assigned)) => {
                    claimed.insert(candidate.operator_id);
                    assigned_ids.insert(trade.id);
                    placed = true;
                    on_assigned(sinks, &assigned, candidate).await;
                    report.assigned.push(Assignment {
                        trade_id: assigned.id,
                        trade_hash: assigned.trade_hash.clone(),
                        operator_id: candidate.operator_id,
                    });
                    break;
                }
                Ok(AssignResult::OperatorBusy) => {
                    report.conflicts += 1;
                    counter!("dispatch_conflicts_total").increment(1);
                    tracing::warn!(
                        trade_hash = %trade.trade_hash,
                        operator_id = %candidate.operator_id,
                        "Payer became busy before commit, trying next"
                    );
                }
                Ok(AssignResult::TradeGone) => {
                    tracing::debug!(trade_hash = %trade.trade_hash, "Trade no longer pending");
                    continue 'trades;
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(
                        trade_hash = %trade.trade_hash,
                        operator_id = %candidate.operator_id,
                        error = %e,
                        "Assignment failed, trade stays pending"
                    );
                    continue 'trades;
                }
            }
        }

        if !placed {
            report.exhausted = true;
            break;
        }
    }

    let remaining: Vec<&Trade> = pending
        .iter()
        .filter(|t| !assigned_ids.contains(&t.id))
        .collect();
    report.unassigned = remaining.len();
    report.overdue = remaining
        .iter()
        .filter(|t| now - t.created_at > settings.pending_stale)
        .count();

    gauge!("pending_trades").set(report.unassigned as f64);

    if report.overdue > 0 {
        tracing::warn!(
            overdue = report.overdue,
            threshold_secs = settings.pending_stale.num_seconds(),
            "Pending trades waiting past threshold"
        );
    }

    if report.pending == 0 {
        tracing::debug!("Dispatch pass: no pending trades");
    } else {
        tracing::info!(
            pending = report.pending,
            candidates = report.candidates,
            assigned = report.assigned.len(),
            unassigned = report.unassigned,
            conflicts = report.conflicts,
            failed = report.failed,
            "Dispatch pass complete"
        );
    }

    Ok(report)
}

async fn on_assigned(sinks: &Sinks, trade: &Trade, candidate: &DispatchCandidate) {
    counter!("trades_assigned_total").increment(1);
    tracing::info!(
        trade_hash = %trade.trade_hash,
        operator = %candidate.username,
        last_assigned_at = ?candidate.last_assigned_at,
        "Trade assigned"
    );

    sinks
        .notifier
        .notify(
            candidate.operator_id,
            "New trade assigned",
            &format_assignment(trade),
            Priority::High,
        )
        .await;

    sinks
        .activity
        .append_activity(
            trade.id,
            actions::TRADE_ASSIGNED,
            crate::models::activity::SYSTEM_ACTOR,
            json!({ "operator_id": candidate.operator_id, "trade_hash": trade.trade_hash }),
        )
        .await;

    sinks.events.publish(EngineEvent::TradeAssigned {
        trade: TradeSummary::from(trade),
        operator_id: candidate.operator_id,
    });
}
