use axum::extract::State;
use axum::Json;

use super::ApiResponse;
use crate::dispatch::DispatchReport;
use crate::errors::AppError;
use crate::ingestion::IngestionReport;
use crate::shifts::RotationReport;
use crate::AppState;

/// POST /api/ingestion/run: poll all accounts now.
pub async fn run_ingestion(State(state): State<AppState>) -> Json<ApiResponse<IngestionReport>> {
    Json(ApiResponse::ok(state.engine.ingest_now().await))
}

/// POST /api/dispatch/run: assign pending trades now.
pub async fn run_dispatch(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DispatchReport>>, AppError> {
    let report = state.engine.dispatch_now().await?;
    Ok(Json(ApiResponse::ok(report)))
}

/// POST /api/shifts/rotate: run the shift rotation now.
pub async fn run_rotation(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<RotationReport>>, AppError> {
    let report = state.engine.rotate_now().await?;
    Ok(Json(ApiResponse::ok(report)))
}
