use std::sync::Arc;

use tradedesk::api::router::create_router;
use tradedesk::config::AppConfig;
use tradedesk::db::{self, account_repo};
use tradedesk::dispatch::DispatchSettings;
use tradedesk::ingestion::IngestionSettings;
use tradedesk::platforms::build_adapters;
use tradedesk::services::activity::PgActivitySink;
use tradedesk::services::events::{BroadcastEventSink, EventSink};
use tradedesk::services::notifier::{NoopNotifier, NotificationSink, TelegramNotifier};
use tradedesk::services::scheduler::{
    run_dispatch_loop, run_ingestion_loop, run_rotation_loop, Engine,
};
use tradedesk::services::Sinks;
use tradedesk::shifts::ShiftSchedule;
use tradedesk::store::{PgStore, Store};
use tradedesk::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env()?;
    init_tracing(&config.log_format);
    let addr = format!("{}:{}", config.host, config.port);

    let metrics_handle = tradedesk::metrics::init_metrics()?;

    tracing::info!("Connecting to database...");
    let pool = db::init_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("Database connected, migrations applied");

    // --- Platform adapters ---
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(config.adapter_timeout_secs))
        .build()?;
    let accounts = account_repo::get_active_accounts(&pool).await?;
    let adapters = build_adapters(&accounts, &config, &http);
    if adapters.is_empty() {
        tracing::warn!("No usable platform accounts, ingestion will idle");
    } else {
        tracing::info!(accounts = adapters.len(), "Platform adapters ready");
    }

    // --- Sinks ---
    let notifier: Arc<dyn NotificationSink> = match (
        config.has_telegram(),
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    ) {
        (true, Some(token), Some(chat_id)) => {
            tracing::info!("Telegram notifications enabled");
            Arc::new(TelegramNotifier::new(token, chat_id))
        }
        _ => {
            tracing::info!("Telegram not configured, notifications disabled");
            Arc::new(NoopNotifier)
        }
    };
    let events = Arc::new(BroadcastEventSink::new(256));
    let event_sink: Arc<dyn EventSink> = events.clone();
    let sinks = Sinks::new(notifier, event_sink, Arc::new(PgActivitySink::new(pool.clone())));

    // --- Engine ---
    let store: Arc<dyn Store> = Arc::new(PgStore::new(pool.clone()));
    let engine = Engine::new(
        store,
        adapters,
        sinks,
        ShiftSchedule::new(config.shift_offset()?),
        IngestionSettings::from_config(&config),
        DispatchSettings::from_config(&config),
    );

    tokio::spawn(run_ingestion_loop(engine.clone(), config.ingestion_interval_secs));
    tokio::spawn(run_dispatch_loop(engine.clone(), config.dispatch_interval_secs));
    tokio::spawn(run_rotation_loop(engine.clone()));

    let state = AppState {
        engine,
        config,
        events,
        metrics_handle,
        db: Some(pool),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
