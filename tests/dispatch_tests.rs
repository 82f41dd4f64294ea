mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Duration;
use rust_decimal::Decimal;

use common::{account, at, payer_on_shift, recording_sinks};
use tradedesk::dispatch::{run_dispatch_pass, DispatchSettings};
use tradedesk::ingestion::normalize;
use tradedesk::models::{Platform, Trade, TradeStatus};
use tradedesk::services::events::EngineEvent;
use tradedesk::services::notifier::Priority;
use tradedesk::store::{MemoryStore, Store, StoreError, StoreTx};

async fn seed_pending(store: &MemoryStore, hash: &str, created_at: chrono::DateTime<chrono::Utc>) -> Trade {
    let acct = account(Platform::Noones, "desk-1");
    let raw = common::offerwall_raw(hash, "Active funded", Decimal::from(1500));
    let incoming = normalize(&raw, &acct, created_at).unwrap();
    let trade = Trade::from_projection(incoming, created_at);
    store.put_trade(trade.clone()).await;
    trade
}

#[tokio::test]
async fn test_oldest_trade_goes_to_longest_standing_payer() {
    let store = MemoryStore::new();
    let (sinks, notifier, events) = recording_sinks();
    let shift_start = at("2024-06-03T08:00:00Z");

    let senior = payer_on_shift(&store, "senior", at("2023-01-01T00:00:00Z"), shift_start).await;
    let junior = payer_on_shift(&store, "junior", at("2024-01-01T00:00:00Z"), shift_start).await;

    let newer = seed_pending(&store, "newer", at("2024-06-03T09:05:00Z")).await;
    let older = seed_pending(&store, "older", at("2024-06-03T09:00:00Z")).await;

    let report = run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), at("2024-06-03T09:06:00Z"))
        .await
        .unwrap();

    assert_eq!(report.assigned.len(), 2);
    assert_eq!(report.assigned[0].trade_id, older.id);
    assert_eq!(report.assigned[0].operator_id, senior.id);
    assert_eq!(report.assigned[1].trade_id, newer.id);
    assert_eq!(report.assigned[1].operator_id, junior.id);
    assert_eq!(report.unassigned, 0);
    assert!(!report.exhausted);

    let sent = notifier.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(_, _, p)| *p == Priority::High));
    drop(sent);
    assert_eq!(events.count(|e| matches!(e, EngineEvent::TradeAssigned { .. })), 2);
}

#[tokio::test]
async fn test_payer_never_holds_two_assigned_trades() {
    let store = MemoryStore::new();
    let (sinks, _, _) = recording_sinks();
    let payer = payer_on_shift(&store, "solo", at("2023-01-01T00:00:00Z"), at("2024-06-03T08:00:00Z")).await;

    for (i, hash) in ["t1", "t2", "t3"].iter().enumerate() {
        seed_pending(&store, hash, at("2024-06-03T09:00:00Z") + Duration::minutes(i as i64)).await;
    }

    let now = at("2024-06-03T09:10:00Z");
    let first = run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), now).await.unwrap();
    assert_eq!(first.assigned.len(), 1);
    assert!(first.exhausted);
    assert_eq!(first.unassigned, 2);

    // A second pass changes nothing while the payer is busy.
    let second = run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), now).await.unwrap();
    assert!(second.assigned.is_empty());

    let held = store
        .trades()
        .await
        .into_iter()
        .filter(|t| t.status == TradeStatus::Assigned && t.assigned_payer_id == Some(payer.id))
        .count();
    assert_eq!(held, 1);
}

#[tokio::test]
async fn test_payer_on_break_is_skipped() {
    let store = MemoryStore::new();
    let (sinks, _, _) = recording_sinks();
    let sched = tradedesk::shifts::ShiftSchedule::utc();
    let op = store.add_operator("breaker", at("2023-01-01T00:00:00Z")).await;

    tradedesk::shifts::clock_in(&store, &sinks, &sched, op.id, at("2024-06-03T08:00:00Z"))
        .await
        .unwrap();
    tradedesk::shifts::start_break(&store, &sinks, op.id, at("2024-06-03T09:00:00Z"))
        .await
        .unwrap();
    seed_pending(&store, "waiting", at("2024-06-03T09:01:00Z")).await;

    let report = run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), at("2024-06-03T09:02:00Z"))
        .await
        .unwrap();

    assert_eq!(report.candidates, 0);
    assert!(report.assigned.is_empty());
    assert_eq!(report.unassigned, 1);
}

#[tokio::test]
async fn test_failed_assignment_leaves_trade_pending() {
    let store = MemoryStore::new();
    let (sinks, notifier, _) = recording_sinks();
    payer_on_shift(&store, "payer", at("2023-01-01T00:00:00Z"), at("2024-06-03T08:00:00Z")).await;
    let trade = seed_pending(&store, "t1", at("2024-06-03T09:00:00Z")).await;

    store.fail_next("assign_trade").await;
    let report = run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), at("2024-06-03T09:01:00Z"))
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert!(report.assigned.is_empty());
    let stored = store.trades().await;
    let stored = stored.iter().find(|t| t.id == trade.id).unwrap();
    assert_eq!(stored.status, TradeStatus::Pending);
    assert!(stored.assigned_payer_id.is_none());
    assert!(notifier.sent.lock().unwrap().is_empty());

    // Next pass picks it up.
    let retry = run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), at("2024-06-03T09:02:00Z"))
        .await
        .unwrap();
    assert_eq!(retry.assigned.len(), 1);
}

#[tokio::test]
async fn test_overdue_trades_are_counted() {
    let store = MemoryStore::new();
    let (sinks, _, _) = recording_sinks();
    seed_pending(&store, "stale", at("2024-06-03T09:00:00Z")).await;
    seed_pending(&store, "fresh", at("2024-06-03T09:09:00Z")).await;

    let settings = DispatchSettings {
        pending_stale: Duration::minutes(5),
    };
    let report = run_dispatch_pass(&store, &sinks, &settings, at("2024-06-03T09:10:00Z"))
        .await
        .unwrap();

    assert_eq!(report.unassigned, 2);
    assert_eq!(report.overdue, 1);
    assert!(report.exhausted);
}

#[tokio::test]
async fn test_assignment_is_logged_on_trade() {
    let store = MemoryStore::new();
    let (sinks, _, _) = recording_sinks();
    let payer = payer_on_shift(&store, "payer", at("2023-01-01T00:00:00Z"), at("2024-06-03T08:00:00Z")).await;
    let trade = seed_pending(&store, "t1", at("2024-06-03T09:00:00Z")).await;
    let now = at("2024-06-03T09:01:00Z");

    run_dispatch_pass(&store, &sinks, &DispatchSettings::default(), now).await.unwrap();

    let stored = store.trades().await;
    let stored = stored.iter().find(|t| t.id == trade.id).unwrap();
    assert_eq!(stored.assigned_payer_id, Some(payer.id));
    assert_eq!(stored.assigned_at, Some(now));
    let last = stored.activity_log.last().unwrap();
    assert_eq!(last.action, "trade_assigned");
    assert_eq!(last.performed_at, now);
}

/// Store that lands a competing assignment just before the n-th transaction
/// opens, as a concurrent dispatcher would.
struct RacingStore {
    inner: MemoryStore,
    begins: AtomicUsize,
    race_on: usize,
    competing: Mutex<Option<Trade>>,
}

#[async_trait]
impl Store for RacingStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let n = self.begins.fetch_add(1, Ordering::SeqCst) + 1;
        if n == self.race_on {
            let competing = self.competing.lock().unwrap().take();
            if let Some(trade) = competing {
                self.inner.put_trade(trade).await;
            }
        }
        self.inner.begin().await
    }
}

#[tokio::test]
async fn test_payer_taken_before_commit_falls_through_to_next() {
    let store = MemoryStore::new();
    let (sinks, _, _) = recording_sinks();
    let shift_start = at("2024-06-03T08:00:00Z");
    let senior = payer_on_shift(&store, "senior", at("2023-01-01T00:00:00Z"), shift_start).await;
    let junior = payer_on_shift(&store, "junior", at("2024-01-01T00:00:00Z"), shift_start).await;
    let trade = seed_pending(&store, "t1", at("2024-06-03T09:00:00Z")).await;

    // Built off-store so it is not part of the pass snapshot.
    let acct = account(Platform::Noones, "desk-2");
    let raw = common::offerwall_raw("elsewhere", "Active funded", Decimal::from(1500));
    let mut competing = Trade::from_projection(normalize(&raw, &acct, shift_start).unwrap(), shift_start);
    competing.status = TradeStatus::Assigned;
    competing.assigned_payer_id = Some(senior.id);
    competing.assigned_at = Some(at("2024-06-03T09:00:30Z"));

    // Transactions: snapshot, availability check, then the assignment itself.
    let racing = RacingStore {
        inner: store.clone(),
        begins: AtomicUsize::new(0),
        race_on: 3,
        competing: Mutex::new(Some(competing)),
    };

    let report = run_dispatch_pass(&racing, &sinks, &DispatchSettings::default(), at("2024-06-03T09:01:00Z"))
        .await
        .unwrap();

    assert_eq!(report.conflicts, 1);
    assert_eq!(report.assigned.len(), 1);
    assert_eq!(report.assigned[0].trade_id, trade.id);
    assert_eq!(report.assigned[0].operator_id, junior.id);
    assert_eq!(report.unassigned, 0);

    let held_by_senior = store
        .trades()
        .await
        .into_iter()
        .filter(|t| t.status == TradeStatus::Assigned && t.assigned_payer_id == Some(senior.id))
        .count();
    assert_eq!(held_by_senior, 1);
}
