use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use super::ApiResponse;
use crate::errors::AppError;
use crate::models::Shift;
use crate::shifts;
use crate::AppState;

/// POST /api/operators/:id/clock-in
pub async fn clock_in(
    State(state): State<AppState>,
    Path(operator_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::clock_in(e.store.as_ref(), &e.sinks, &e.schedule, operator_id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(shift)))
}

/// POST /api/operators/:id/clock-out
pub async fn clock_out(
    State(state): State<AppState>,
    Path(operator_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::clock_out(e.store.as_ref(), &e.sinks, operator_id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(shift)))
}

/// POST /api/operators/:id/break/start
pub async fn start_break(
    State(state): State<AppState>,
    Path(operator_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::start_break(e.store.as_ref(), &e.sinks, operator_id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(shift)))
}

/// POST /api/operators/:id/break/end
pub async fn end_break(
    State(state): State<AppState>,
    Path(operator_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::end_break(e.store.as_ref(), &e.sinks, operator_id, Utc::now()).await?;
    Ok(Json(ApiResponse::ok(shift)))
}

#[derive(Debug, Deserialize)]
pub struct AdminAction {
    pub admin_id: Uuid,
    pub notes: Option<String>,
}

/// POST /api/shifts/:id/force-end
pub async fn force_end(
    State(state): State<AppState>,
    Path(shift_id): Path<Uuid>,
    Json(body): Json<AdminAction>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::force_end(
        e.store.as_ref(),
        &e.sinks,
        shift_id,
        body.admin_id,
        body.notes.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(shift)))
}

/// POST /api/shifts/:id/approve
pub async fn approve(
    State(state): State<AppState>,
    Path(shift_id): Path<Uuid>,
    Json(body): Json<AdminAction>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::approve_shift(
        e.store.as_ref(),
        &e.sinks,
        shift_id,
        body.admin_id,
        body.notes.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(shift)))
}

/// POST /api/shifts/:id/reject
pub async fn reject(
    State(state): State<AppState>,
    Path(shift_id): Path<Uuid>,
    Json(body): Json<AdminAction>,
) -> Result<Json<ApiResponse<Shift>>, AppError> {
    let e = &state.engine;
    let shift = shifts::reject_shift(
        e.store.as_ref(),
        &e.sinks,
        shift_id,
        body.admin_id,
        body.notes.as_deref(),
        Utc::now(),
    )
    .await?;
    Ok(Json(ApiResponse::ok(shift)))
}
