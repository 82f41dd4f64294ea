use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::db::activity_repo;

/// Append-only audit trail keyed by the entity the action touched.
#[async_trait]
pub trait ActivitySink: Send + Sync {
    async fn append_activity(
        &self,
        entity_id: Uuid,
        action: &str,
        performed_by: &str,
        details: serde_json::Value,
    );
}

/// Writes to the `activity_logs` table. Failures are logged and dropped.
#[derive(Debug, Clone)]
pub struct PgActivitySink {
    pool: PgPool,
}

impl PgActivitySink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySink for PgActivitySink {
    async fn append_activity(
        &self,
        entity_id: Uuid,
        action: &str,
        performed_by: &str,
        details: serde_json::Value,
    ) {
        if let Err(e) =
            activity_repo::insert_activity(&self.pool, entity_id, action, performed_by, &details).await
        {
            tracing::warn!(
                entity_id = %entity_id,
                action,
                error = %e,
                "Failed to persist activity entry"
            );
        }
    }
}

/// Emits activity as structured log records only.
#[derive(Debug, Clone, Default)]
pub struct TracingActivitySink;

#[async_trait]
impl ActivitySink for TracingActivitySink {
    async fn append_activity(
        &self,
        entity_id: Uuid,
        action: &str,
        performed_by: &str,
        details: serde_json::Value,
    ) {
        tracing::info!(
            entity_id = %entity_id,
            action,
            performed_by,
            details = %details,
            "Activity"
        );
    }
}
