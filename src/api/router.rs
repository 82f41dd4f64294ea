use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::auth::require_auth;
use super::handlers;
use crate::AppState;

pub fn create_router(state: AppState) -> Router {
    // Public routes, no authentication
    let public = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/metrics", get(handlers::metrics::render));

    // Protected API routes, Bearer token when API_TOKEN is set
    let protected = Router::new()
        // Trades
        .route("/api/trades", get(handlers::trades::list))
        .route("/api/trades/:id", get(handlers::trades::detail))
        .route("/api/trades/:id/complete", post(handlers::trades::complete))
        .route("/api/trades/:id/cancel", post(handlers::trades::cancel))
        .route("/api/trades/:id/refresh", post(handlers::trades::refresh))
        .route("/api/trades/:id/chat", get(handlers::trades::chat))
        .route("/api/trades/:id/messages", post(handlers::trades::send_message))
        // Operators
        .route("/api/operators", get(handlers::operators::list).post(handlers::operators::create))
        .route("/api/activity/:entity_id", get(handlers::operators::activity))
        // Operator shift actions
        .route("/api/operators/:id/clock-in", post(handlers::shifts::clock_in))
        .route("/api/operators/:id/clock-out", post(handlers::shifts::clock_out))
        .route("/api/operators/:id/break/start", post(handlers::shifts::start_break))
        .route("/api/operators/:id/break/end", post(handlers::shifts::end_break))
        // Admin shift actions
        .route("/api/shifts/:id/force-end", post(handlers::shifts::force_end))
        .route("/api/shifts/:id/approve", post(handlers::shifts::approve))
        .route("/api/shifts/:id/reject", post(handlers::shifts::reject))
        // Manual triggers
        .route("/api/ingestion/run", post(handlers::engine::run_ingestion))
        .route("/api/dispatch/run", post(handlers::engine::run_dispatch))
        .route("/api/shifts/rotate", post(handlers::engine::run_rotation))
        // Config
        .route("/api/config", get(handlers::config::get_config))
        .route("/api/config/selling-price", put(handlers::config::update_selling_price))
        // WebSocket
        .route("/ws", get(handlers::ws::handler))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    public
        .merge(protected)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
