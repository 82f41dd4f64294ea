use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::ApiResponse;
use crate::db::config_repo;
use crate::errors::AppError;
use crate::store::SELLING_PRICE_KEY;
use crate::AppState;

const ALLOWED_KEYS: &[&str] = &[SELLING_PRICE_KEY];

#[derive(Serialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

/// GET /api/config: runtime settings, env defaults overlaid by stored values.
pub async fn get_config(State(state): State<AppState>) -> Result<Json<Vec<ConfigEntry>>, AppError> {
    let mut merged: HashMap<String, String> = HashMap::new();
    if let Some(price) = state.config.default_selling_price {
        merged.insert(SELLING_PRICE_KEY.into(), price.to_string());
    }

    if let Some(db) = &state.db {
        for entry in config_repo::get_all_config(db).await? {
            if ALLOWED_KEYS.contains(&entry.key.as_str()) {
                merged.insert(entry.key, entry.value);
            }
        }
    }

    let entries = merged
        .into_iter()
        .map(|(key, value)| ConfigEntry { key, value })
        .collect();

    Ok(Json(entries))
}

#[derive(Deserialize)]
pub struct UpdateSellingPrice {
    pub selling_price: Decimal,
}

/// PUT /api/config/selling-price
pub async fn update_selling_price(
    State(state): State<AppState>,
    Json(body): Json<UpdateSellingPrice>,
) -> Result<Json<ApiResponse<String>>, AppError> {
    if body.selling_price <= Decimal::ZERO {
        return Err(AppError::BadRequest("selling_price must be positive".into()));
    }
    let Some(db) = &state.db else {
        return Err(AppError::BadRequest("runtime config needs a database".into()));
    };

    config_repo::set_selling_price(db, body.selling_price).await?;
    tracing::info!(selling_price = %body.selling_price, "Selling price updated");
    Ok(Json(ApiResponse::ok(body.selling_price.to_string())))
}
