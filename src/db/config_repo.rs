use rust_decimal::Decimal;
use sqlx::PgPool;
use std::collections::HashMap;

use crate::store::SELLING_PRICE_KEY;

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct RuntimeConfigEntry {
    pub key: String,
    pub value: String,
}

/// Get all runtime config entries.
pub async fn get_all_config(pool: &PgPool) -> anyhow::Result<Vec<RuntimeConfigEntry>> {
    let rows = sqlx::query_as::<_, RuntimeConfigEntry>(
        "SELECT key, value FROM runtime_config ORDER BY key",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Batch upsert runtime config entries.
pub async fn upsert_config(pool: &PgPool, entries: &HashMap<String, String>) -> anyhow::Result<()> {
    for (key, value) in entries {
        sqlx::query(
            r#"
            INSERT INTO runtime_config (key, value, updated_at)
            VALUES ($1, $2, NOW())
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    }

    Ok(())
}

/// Set the selling price the ingestion flagging rule compares against.
pub async fn set_selling_price(pool: &PgPool, price: Decimal) -> anyhow::Result<()> {
    let entries = HashMap::from([(SELLING_PRICE_KEY.to_string(), price.to_string())]);
    upsert_config(pool, &entries).await
}
