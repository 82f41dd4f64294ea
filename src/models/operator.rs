use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Database row for operators table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Operator {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub is_active: bool,
    pub clocked_in: bool,
    pub created_at: DateTime<Utc>,
}

impl Operator {
    pub fn is_payer(&self) -> bool {
        self.role == operator_role::PAYER
    }
}

/// Operator role constants.
pub mod operator_role {
    pub const PAYER: &str = "payer";
    pub const ADMIN: &str = "admin";
}

/// A payer holding an ACTIVE shift, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct DispatchCandidate {
    pub operator_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub last_assigned_at: Option<DateTime<Utc>>,
}
