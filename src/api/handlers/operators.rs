use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::ApiResponse;
use crate::db::activity_repo::{self, ActivityRow};
use crate::db::operator_repo;
use crate::errors::AppError;
use crate::models::operator::operator_role;
use crate::models::Operator;
use crate::AppState;

fn pool(state: &AppState) -> Result<&PgPool, AppError> {
    state
        .db
        .as_ref()
        .ok_or_else(|| AppError::BadRequest("operator directory needs a database".into()))
}

/// GET /api/operators
pub async fn list(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<Operator>>>, AppError> {
    let operators = operator_repo::get_operators(pool(&state)?).await?;
    Ok(Json(ApiResponse::ok(operators)))
}

#[derive(Debug, Deserialize)]
pub struct CreateOperator {
    pub username: String,
    pub role: Option<String>,
}

/// POST /api/operators
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateOperator>,
) -> Result<Json<ApiResponse<Operator>>, AppError> {
    let username = body.username.trim();
    if username.is_empty() {
        return Err(AppError::BadRequest("username is required".into()));
    }
    let role = body.role.as_deref().unwrap_or(operator_role::PAYER);

    let operator = operator_repo::upsert_operator(pool(&state)?, username, role).await?;
    tracing::info!(operator_id = %operator.id, username, role = %operator.role, "Operator registered");
    Ok(Json(ApiResponse::ok(operator)))
}

#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub limit: Option<i64>,
}

/// GET /api/activity/:entity_id: audit trail of a trade or shift.
pub async fn activity(
    State(state): State<AppState>,
    Path(entity_id): Path<Uuid>,
    Query(q): Query<ActivityQuery>,
) -> Result<Json<ApiResponse<Vec<ActivityRow>>>, AppError> {
    let limit = q.limit.unwrap_or(50).clamp(1, 500);
    let rows = activity_repo::get_activity_for_entity(pool(&state)?, entity_id, limit).await?;
    Ok(Json(ApiResponse::ok(rows)))
}
