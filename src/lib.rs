pub mod api;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod errors;
pub mod ingestion;
pub mod metrics;
pub mod models;
pub mod platforms;
pub mod services;
pub mod shifts;
pub mod store;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::events::BroadcastEventSink;
use crate::services::scheduler::Engine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: AppConfig,
    /// Source of the `/ws` event stream; the same sink the engine publishes to.
    pub events: Arc<BroadcastEventSink>,
    pub metrics_handle: metrics_exporter_prometheus::PrometheusHandle,
    /// Set when running against Postgres; `/health` pings it.
    pub db: Option<sqlx::PgPool>,
}
