use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::services::trade_actions::TradeActionError;
use crate::shifts::ShiftError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".into()),
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => AppError::NotFound(msg),
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Internal(other.into()),
        }
    }
}

impl From<ShiftError> for AppError {
    fn from(e: ShiftError) -> Self {
        match e {
            ShiftError::Store(inner) => inner.into(),
            ShiftError::OperatorNotFound(_) | ShiftError::ShiftNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            other => AppError::Conflict(other.to_string()),
        }
    }
}

impl From<TradeActionError> for AppError {
    fn from(e: TradeActionError) -> Self {
        match e {
            TradeActionError::Store(inner) => inner.into(),
            TradeActionError::TradeNotFound(_) | TradeActionError::NoAdapter(_) => {
                AppError::NotFound(e.to_string())
            }
            TradeActionError::Platform(inner) => AppError::Internal(inner.into()),
            other => AppError::Conflict(other.to_string()),
        }
    }
}
