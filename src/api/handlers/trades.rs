use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::errors::AppError;
use crate::models::{Trade, TradeStatus};
use crate::platforms::TradeChat;
use crate::services::trade_actions;
use crate::AppState;

const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

/// GET /api/trades?status=PENDING&limit=100
pub async fn list(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<Trade>>>, AppError> {
    let status = match q.status.as_deref() {
        Some(s) => Some(
            TradeStatus::parse(s).ok_or_else(|| AppError::BadRequest(format!("unknown status {s}")))?,
        ),
        None => None,
    };
    let limit = q.limit.unwrap_or(100).clamp(1, MAX_LIMIT);

    let mut tx = state.engine.store.begin().await?;
    let trades = tx.list_trades(status, limit).await?;
    tx.rollback().await?;

    Ok(Json(ApiResponse::ok(trades)))
}

/// GET /api/trades/:id
pub async fn detail(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let mut tx = state.engine.store.begin().await?;
    let trade = tx.find_trade(id).await?;
    tx.rollback().await?;

    trade
        .map(|t| Json(ApiResponse::ok(t)))
        .ok_or_else(|| AppError::NotFound(format!("trade {id}")))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub operator_id: Uuid,
}

/// POST /api/trades/:id/complete
pub async fn complete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CompleteRequest>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let engine = &state.engine;
    let trade = trade_actions::complete_trade(
        engine.store.as_ref(),
        &engine.sinks,
        &engine.adapters,
        id,
        body.operator_id,
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(trade)))
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub performed_by: String,
    pub reason: Option<String>,
}

/// POST /api/trades/:id/cancel
pub async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let engine = &state.engine;
    let trade = trade_actions::cancel_trade(
        engine.store.as_ref(),
        &engine.sinks,
        id,
        &body.performed_by,
        body.reason.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(trade)))
}

/// POST /api/trades/:id/refresh
pub async fn refresh(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    let engine = &state.engine;
    let trade = trade_actions::refresh_trade(
        engine.store.as_ref(),
        &engine.sinks,
        &engine.adapters,
        &engine.ingestion,
        id,
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(trade)))
}

/// GET /api/trades/:id/chat
pub async fn chat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<TradeChat>>, AppError> {
    let engine = &state.engine;
    let chat = trade_actions::fetch_trade_chat(engine.store.as_ref(), &engine.adapters, id).await?;
    Ok(Json(ApiResponse::ok(chat)))
}

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub performed_by: String,
    pub text: String,
}

/// POST /api/trades/:id/messages
pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<ApiResponse<Trade>>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::BadRequest("message text is empty".into()));
    }
    let engine = &state.engine;
    let trade = trade_actions::send_trade_message(
        engine.store.as_ref(),
        &engine.sinks,
        &engine.adapters,
        id,
        &body.performed_by,
        &body.text,
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(trade)))
}
