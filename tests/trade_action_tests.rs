mod common;

use std::sync::Arc;

use rust_decimal::Decimal;

use common::{account, at, offerwall_raw, payer_on_shift, recording_sinks, FakeAdapter};
use tradedesk::dispatch::{run_dispatch_pass, DispatchSettings};
use tradedesk::ingestion::{run_ingestion_cycle, IngestionSettings};
use tradedesk::models::{Platform, Trade, TradeStatus};
use tradedesk::platforms::PlatformAdapter;
use tradedesk::services::trade_actions::{
    cancel_trade, complete_trade, refresh_trade, send_trade_message, TradeActionError,
};
use tradedesk::services::Sinks;
use tradedesk::store::MemoryStore;

struct Desk {
    store: MemoryStore,
    sinks: Sinks,
    fake: Arc<FakeAdapter>,
    adapters: Vec<Arc<dyn PlatformAdapter>>,
}

async fn desk_with_trade(fake: FakeAdapter) -> (Desk, Trade) {
    let store = MemoryStore::new();
    let (sinks, _, _) = recording_sinks();
    let fake = Arc::new(fake);
    let adapters: Vec<Arc<dyn PlatformAdapter>> = vec![fake.clone()];

    run_ingestion_cycle(
        &store,
        &adapters,
        &sinks,
        &IngestionSettings::default(),
        at("2024-06-03T09:00:00Z"),
    )
    .await;
    let trade = store.trades().await.remove(0);
    (
        Desk {
            store,
            sinks,
            fake,
            adapters,
        },
        trade,
    )
}

fn noones_fake() -> FakeAdapter {
    FakeAdapter::new(
        account(Platform::Noones, "desk-1"),
        vec![offerwall_raw("h1", "Active funded", Decimal::from(1500))],
    )
}

#[tokio::test]
async fn test_complete_marks_paid_remotely() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    let payer = payer_on_shift(&desk.store, "payer", at("2023-01-01T00:00:00Z"), at("2024-06-03T08:00:00Z")).await;
    run_dispatch_pass(&desk.store, &desk.sinks, &DispatchSettings::default(), at("2024-06-03T09:01:00Z"))
        .await
        .unwrap();

    let now = at("2024-06-03T09:20:00Z");
    let done = complete_trade(&desk.store, &desk.sinks, &desk.adapters, trade.id, payer.id, now)
        .await
        .unwrap();

    assert_eq!(done.status, TradeStatus::Completed);
    assert_eq!(done.completed_at, Some(now));
    assert_eq!(desk.fake.marked_paid.lock().unwrap().as_slice(), ["h1".to_string()]);

    // The payer is free again.
    let report = run_dispatch_pass(&desk.store, &desk.sinks, &DispatchSettings::default(), now)
        .await
        .unwrap();
    assert_eq!(report.pending, 0);
}

#[tokio::test]
async fn test_complete_without_remote_support_completes_locally() {
    let (desk, trade) = desk_with_trade(noones_fake().without_mark_paid()).await;
    let payer = payer_on_shift(&desk.store, "payer", at("2023-01-01T00:00:00Z"), at("2024-06-03T08:00:00Z")).await;
    run_dispatch_pass(&desk.store, &desk.sinks, &DispatchSettings::default(), at("2024-06-03T09:01:00Z"))
        .await
        .unwrap();

    let done = complete_trade(
        &desk.store,
        &desk.sinks,
        &desk.adapters,
        trade.id,
        payer.id,
        at("2024-06-03T09:20:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(done.status, TradeStatus::Completed);
    let last = done.activity_log.last().unwrap();
    assert_eq!(last.details["marked_paid_remotely"], false);
}

#[tokio::test]
async fn test_only_assignee_may_complete() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    payer_on_shift(&desk.store, "payer", at("2023-01-01T00:00:00Z"), at("2024-06-03T08:00:00Z")).await;
    run_dispatch_pass(&desk.store, &desk.sinks, &DispatchSettings::default(), at("2024-06-03T09:01:00Z"))
        .await
        .unwrap();

    let res = complete_trade(
        &desk.store,
        &desk.sinks,
        &desk.adapters,
        trade.id,
        uuid::Uuid::new_v4(),
        at("2024-06-03T09:20:00Z"),
    )
    .await;

    assert!(matches!(res, Err(TradeActionError::NotAssignee { .. })));
    assert!(desk.fake.marked_paid.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_pending_trade_cannot_be_completed() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    let res = complete_trade(
        &desk.store,
        &desk.sinks,
        &desk.adapters,
        trade.id,
        uuid::Uuid::new_v4(),
        at("2024-06-03T09:20:00Z"),
    )
    .await;
    assert!(matches!(res, Err(TradeActionError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_cancel_is_terminal() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    let cancelled = cancel_trade(
        &desk.store,
        &desk.sinks,
        trade.id,
        "admin",
        Some("buyer left"),
        at("2024-06-03T09:05:00Z"),
    )
    .await
    .unwrap();
    assert_eq!(cancelled.status, TradeStatus::Cancelled);

    let again = cancel_trade(&desk.store, &desk.sinks, trade.id, "admin", None, at("2024-06-03T09:06:00Z")).await;
    assert!(matches!(again, Err(TradeActionError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_refresh_picks_up_dispute() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    desk.fake
        .set_trades(vec![offerwall_raw("h1", "Dispute open", Decimal::from(1500))]);

    let refreshed = refresh_trade(
        &desk.store,
        &desk.sinks,
        &desk.adapters,
        &IngestionSettings::default(),
        trade.id,
        at("2024-06-03T09:10:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(refreshed.id, trade.id);
    assert_eq!(refreshed.status, TradeStatus::Disputed);
    assert_eq!(desk.store.escalations().await.len(), 1);
}

#[tokio::test]
async fn test_send_message_records_activity() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    let updated = send_trade_message(
        &desk.store,
        &desk.sinks,
        &desk.adapters,
        trade.id,
        "payer-1",
        "Payment sent",
        at("2024-06-03T09:15:00Z"),
    )
    .await
    .unwrap();

    assert_eq!(
        desk.fake.sent.lock().unwrap().as_slice(),
        [("h1".to_string(), "Payment sent".to_string())]
    );
    let last = updated.activity_log.last().unwrap();
    assert_eq!(last.action, "trade_message_sent");
    assert_eq!(last.performed_by, "payer-1");
}

#[tokio::test]
async fn test_trade_without_adapter() {
    let (desk, trade) = desk_with_trade(noones_fake()).await;
    let res = send_trade_message(
        &desk.store,
        &desk.sinks,
        &[],
        trade.id,
        "payer-1",
        "hello",
        at("2024-06-03T09:15:00Z"),
    )
    .await;
    assert!(matches!(res, Err(TradeActionError::NoAdapter(_))));
}
