use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Platform, PlatformAccount};

/// Database row for platform_accounts. Credentials never leave this module
/// except through the adapter factory.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: Uuid,
    pub platform: String,
    pub label: String,
    pub api_key: String,
    pub api_secret: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl AccountRow {
    /// Public view of the account. `None` for an unknown platform name.
    pub fn account(&self) -> Option<PlatformAccount> {
        Platform::parse(&self.platform).map(|platform| PlatformAccount {
            id: self.id,
            platform,
            label: self.label.clone(),
        })
    }
}

/// Fetch every active external account.
pub async fn get_active_accounts(pool: &PgPool) -> anyhow::Result<Vec<AccountRow>> {
    let rows = sqlx::query_as::<_, AccountRow>(
        r#"
        SELECT id, platform, label, api_key, api_secret, is_active, created_at
        FROM platform_accounts
        WHERE is_active = true
        ORDER BY created_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
