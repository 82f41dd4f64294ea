mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::Decimal;
use tower::ServiceExt;

use common::{account, at, offerwall_raw, FakeAdapter};
use tradedesk::api::router::create_router;
use tradedesk::config::AppConfig;
use tradedesk::dispatch::DispatchSettings;
use tradedesk::ingestion::IngestionSettings;
use tradedesk::models::Platform;
use tradedesk::platforms::PlatformAdapter;
use tradedesk::services::events::{BroadcastEventSink, EventSink};
use tradedesk::services::scheduler::Engine;
use tradedesk::services::Sinks;
use tradedesk::shifts::ShiftSchedule;
use tradedesk::store::{MemoryStore, Store};
use tradedesk::AppState;

fn test_config(api_token: Option<&str>) -> AppConfig {
    AppConfig {
        database_url: "postgres://unused".into(),
        host: "127.0.0.1".into(),
        port: 0,
        api_token: api_token.map(str::to_string),
        log_format: "pretty".into(),
        ingestion_interval_secs: 30,
        dispatch_interval_secs: 15,
        trade_batch_size: 5,
        pending_stale_secs: 300,
        adapter_timeout_secs: 5,
        shift_utc_offset_minutes: 0,
        default_selling_price: None,
        telegram_bot_token: None,
        telegram_chat_id: None,
        notifications_enabled: false,
        noones_api_url: "http://localhost".into(),
        paxful_api_url: "http://localhost".into(),
        binance_api_url: "http://localhost".into(),
    }
}

fn build_app(store: MemoryStore, api_token: Option<&str>) -> axum::Router {
    let adapter: Arc<dyn PlatformAdapter> = Arc::new(FakeAdapter::new(
        account(Platform::Noones, "desk-1"),
        vec![offerwall_raw("api-1", "Active funded", Decimal::from(1500))],
    ));
    let events = Arc::new(BroadcastEventSink::new(16));
    let event_sink: Arc<dyn EventSink> = events.clone();
    let noop = Sinks::noop();
    let sinks = Sinks::new(noop.notifier, event_sink, noop.activity);

    let store: Arc<dyn Store> = Arc::new(store);
    let engine = Engine::new(
        store,
        vec![adapter],
        sinks,
        ShiftSchedule::utc(),
        IngestionSettings::default(),
        DispatchSettings::default(),
    );

    let state = AppState {
        engine,
        config: test_config(api_token),
        events,
        metrics_handle: PrometheusBuilder::new().build_recorder().handle(),
        db: None,
    };
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_without_database() {
    let app = build_app(MemoryStore::new(), None);
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn test_protected_routes_need_token() {
    let app = build_app(MemoryStore::new(), Some("s3cret"));

    let denied = app
        .clone()
        .oneshot(Request::builder().uri("/api/trades").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

    let allowed = app
        .oneshot(
            Request::builder()
                .uri("/api/trades")
                .header(header::AUTHORIZATION, "Bearer s3cret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(allowed.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_manual_ingestion_then_list() {
    let app = build_app(MemoryStore::new(), None);

    let run = app
        .clone()
        .oneshot(post("/api/ingestion/run", serde_json::json!({})))
        .await
        .unwrap();
    assert_eq!(run.status(), StatusCode::OK);
    let report = body_json(run).await;
    assert_eq!(report["data"]["inserted"], 1);

    let list = app
        .oneshot(
            Request::builder()
                .uri("/api/trades?status=PENDING")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = body_json(list).await;
    assert_eq!(json["success"], true);
    assert_eq!(json["data"][0]["trade_hash"], "api-1");
}

#[tokio::test]
async fn test_unknown_status_filter_is_bad_request() {
    let app = build_app(MemoryStore::new(), None);
    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/trades?status=PAID")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_trade_is_not_found() {
    let app = build_app(MemoryStore::new(), None);
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/trades/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_clock_in_twice_conflicts() {
    let store = MemoryStore::new();
    let op = store.add_operator("ada", at("2023-01-01T00:00:00Z")).await;
    let app = build_app(store, None);
    let uri = format!("/api/operators/{}/clock-in", op.id);

    let first = app.clone().oneshot(post(&uri, serde_json::json!({}))).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let json = body_json(first).await;
    assert_eq!(json["data"]["status"], "ACTIVE");

    let second = app.oneshot(post(&uri, serde_json::json!({}))).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_selling_price_update_needs_database() {
    let app = build_app(MemoryStore::new(), None);
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/api/config/selling-price")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"selling_price":"1000"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
