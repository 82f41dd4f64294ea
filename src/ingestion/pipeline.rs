use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::escalation::{ensure_escalation, is_dispute};
use super::normalizer::normalize;
use crate::config::AppConfig;
use crate::models::activity::actions;
use crate::models::{ActivityEntry, Escalation, NewTrade, PlatformAccount, Trade, TradeStatus};
use crate::platforms::{PlatformAdapter, PlatformError, RawTrade};
use crate::services::events::{EngineEvent, TradeSummary};
use crate::services::notifier::alert_escalation;
use crate::services::Sinks;
use crate::store::{execute_batch, Store, StoreError, StoreTx, UnitOfWork};

/// Knobs for one ingestion cycle.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub batch_size: usize,
    pub adapter_timeout: Duration,
    pub default_selling_price: Option<Decimal>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            adapter_timeout: Duration::from_secs(20),
            default_selling_price: None,
        }
    }
}

impl IngestionSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.trade_batch_size,
            adapter_timeout: Duration::from_secs(config.adapter_timeout_secs),
            default_selling_price: config.default_selling_price,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub accounts_polled: usize,
    pub accounts_failed: usize,
    pub fetched: usize,
    pub normalize_errors: usize,
    pub inserted: usize,
    pub updated: usize,
    pub flagged: usize,
    pub disputed: usize,
    pub escalations: usize,
    pub errors: usize,
}

// ---------------------------------------------------------------------------
// UpsertTrade: one isolated transaction per incoming trade
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub trade: Trade,
    pub inserted: bool,
    pub newly_flagged: bool,
    pub disputed: bool,
    pub escalation: Option<Escalation>,
}

/// Insert or merge one projection, then apply the selling-price flag and the
/// dispute check against the stored row.
pub struct UpsertTrade {
    pub incoming: NewTrade,
    pub now: DateTime<Utc>,
    pub default_selling_price: Option<Decimal>,
}

#[async_trait]
impl UnitOfWork for UpsertTrade {
    type Output = UpsertOutcome;
    type Error = StoreError;

    fn describe(&self) -> String {
        format!("upsert trade {}", self.incoming.trade_hash)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<UpsertOutcome, StoreError> {
        let now = self.now;
        let selling_price = tx.selling_price().await?.or(self.default_selling_price);

        let existing = tx.find_trade_by_hash(&self.incoming.trade_hash).await?;
        let inserted = existing.is_none();
        let mut trade = match existing {
            Some(mut stored) => {
                stored.apply_projection(self.incoming.clone(), now);
                stored
            }
            None => Trade::from_projection(self.incoming.clone(), now),
        };

        let was_flagged = trade.flagged;
        if let Some(price) = selling_price {
            if trade.dollar_rate > price {
                trade.flagged = true;
            }
        }

        let mut disputed = false;
        if is_dispute(trade.trade_status.as_deref()) && !trade.status.is_terminal() {
            let from = trade.status;
            if trade.transition(TradeStatus::Disputed, now) {
                trade.log(ActivityEntry::system(
                    actions::TRADE_DISPUTED,
                    now,
                    json!({ "from": from.as_str(), "trade_status": trade.trade_status }),
                ));
                disputed = true;
            }
        }

        if inserted {
            tx.insert_trade(&trade).await?;
        } else {
            tx.update_trade(&trade).await?;
        }

        let escalation = ensure_escalation(tx, &trade, now).await?;

        Ok(UpsertOutcome {
            newly_flagged: trade.flagged && !was_flagged,
            trade,
            inserted,
            disputed,
            escalation,
        })
    }
}

// ---------------------------------------------------------------------------
// Cycle
// ---------------------------------------------------------------------------

/// Poll one account with a deadline. Never panics, never blocks the others.
async fn fetch_account(
    adapter: &dyn PlatformAdapter,
    timeout: Duration,
) -> Result<Vec<RawTrade>, PlatformError> {
    match tokio::time::timeout(timeout, adapter.list_active_trades()).await {
        Ok(result) => result,
        Err(_) => Err(PlatformError::Timeout(timeout.as_secs())),
    }
}

/// Persist projections in sequential batches and publish the resulting events.
pub async fn persist_trades(
    store: &dyn Store,
    sinks: &Sinks,
    projections: Vec<NewTrade>,
    settings: &IngestionSettings,
    now: DateTime<Utc>,
    report: &mut IngestionReport,
) {
    let units: Vec<UpsertTrade> = projections
        .into_iter()
        .map(|incoming| UpsertTrade {
            incoming,
            now,
            default_selling_price: settings.default_selling_price,
        })
        .collect();

    let batch = execute_batch(store, &units, settings.batch_size).await;

    report.errors += batch.failed_count();
    counter!("trade_upsert_errors_total").increment(batch.failed_count() as u64);

    let events = sinks.events.as_ref();
    for outcome in batch.succeeded {
        let summary = TradeSummary::from(&outcome.trade);

        if outcome.inserted {
            report.inserted += 1;
            counter!("trades_ingested_total").increment(1);
            events.publish(EngineEvent::TradeIngested(summary.clone()));
        } else {
            report.updated += 1;
            counter!("trades_updated_total").increment(1);
        }

        if outcome.newly_flagged {
            report.flagged += 1;
            counter!("trades_flagged_total").increment(1);
            tracing::warn!(
                trade_hash = %outcome.trade.trade_hash,
                dollar_rate = %outcome.trade.dollar_rate,
                "Trade flagged: rate above selling price"
            );
            events.publish(EngineEvent::TradeFlagged(summary.clone()));
        }

        if outcome.disputed {
            report.disputed += 1;
            events.publish(EngineEvent::TradeUpdated(summary));
        }

        if let Some(escalation) = outcome.escalation {
            report.escalations += 1;
            counter!("escalations_created_total").increment(1);
            alert_escalation(sinks.notifier.as_ref(), &escalation).await;
            events.publish(EngineEvent::EscalationRaised(escalation));
        }
    }
}

/// One ingestion cycle: poll every account concurrently, normalize, upsert.
///
/// A failing or slow account is skipped for this cycle only. Malformed
/// records are dropped and counted. Each upsert commits on its own.
pub async fn run_ingestion_cycle(
    store: &dyn Store,
    adapters: &[Arc<dyn PlatformAdapter>],
    sinks: &Sinks,
    settings: &IngestionSettings,
    now: DateTime<Utc>,
) -> IngestionReport {
    let start = Instant::now();
    let mut report = IngestionReport {
        accounts_polled: adapters.len(),
        ..Default::default()
    };

    let fetches = adapters.iter().map(|adapter| async move {
        let result = fetch_account(adapter.as_ref(), settings.adapter_timeout).await;
        (adapter.account().clone(), result)
    });
    let results: Vec<(PlatformAccount, Result<Vec<RawTrade>, PlatformError>)> =
        join_all(fetches).await;

    let mut projections = Vec::new();
    for (account, result) in results {
        let raws = match result {
            Ok(raws) => raws,
            Err(e) => {
                report.accounts_failed += 1;
                counter!("adapter_failures_total").increment(1);
                tracing::warn!(account = %account, error = %e, "Skipping account this cycle");
                continue;
            }
        };

        report.fetched += raws.len();
        for raw in &raws {
            match normalize(raw, &account, now) {
                Ok(trade) => projections.push(trade),
                Err(e) => {
                    report.normalize_errors += 1;
                    tracing::warn!(account = %account, error = %e, "Dropping malformed trade");
                }
            }
        }
    }

    persist_trades(store, sinks, projections, settings, now, &mut report).await;

    histogram!("ingestion_cycle_seconds").record(start.elapsed().as_secs_f64());

    if report.fetched == 0 && report.accounts_failed == 0 {
        tracing::debug!(accounts = report.accounts_polled, "Ingestion cycle: nothing to do");
    } else {
        tracing::info!(
            accounts = report.accounts_polled,
            accounts_failed = report.accounts_failed,
            fetched = report.fetched,
            inserted = report.inserted,
            updated = report.updated,
            flagged = report.flagged,
            escalations = report.escalations,
            errors = report.errors + report.normalize_errors,
            "Ingestion cycle complete"
        );
    }

    report
}
