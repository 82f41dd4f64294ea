use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

#[derive(Debug, Clone, serde::Serialize, sqlx::FromRow)]
pub struct ActivityRow {
    pub id: i64,
    pub entity_id: Uuid,
    pub action: String,
    pub performed_by: String,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Append one audit entry.
pub async fn insert_activity(
    pool: &PgPool,
    entity_id: Uuid,
    action: &str,
    performed_by: &str,
    details: &serde_json::Value,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO activity_logs (entity_id, action, performed_by, details)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(entity_id)
    .bind(action)
    .bind(performed_by)
    .bind(details)
    .execute(pool)
    .await?;

    Ok(())
}

/// Audit entries for one entity, newest first.
pub async fn get_activity_for_entity(
    pool: &PgPool,
    entity_id: Uuid,
    limit: i64,
) -> anyhow::Result<Vec<ActivityRow>> {
    let rows = sqlx::query_as::<_, ActivityRow>(
        r#"
        SELECT id, entity_id, action, performed_by, details, created_at
        FROM activity_logs
        WHERE entity_id = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2
        "#,
    )
    .bind(entity_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
