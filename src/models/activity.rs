use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Performer recorded for engine-initiated actions.
pub const SYSTEM_ACTOR: &str = "system";

/// One entry of a trade's append-only activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub action: String,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl ActivityEntry {
    pub fn new(
        action: impl Into<String>,
        performed_by: impl Into<String>,
        performed_at: DateTime<Utc>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            performed_by: performed_by.into(),
            performed_at,
            details,
        }
    }

    /// Entry performed by the engine itself.
    pub fn system(action: impl Into<String>, performed_at: DateTime<Utc>, details: serde_json::Value) -> Self {
        Self::new(action, SYSTEM_ACTOR, performed_at, details)
    }
}

/// Action names written to activity logs.
pub mod actions {
    pub const TRADE_INGESTED: &str = "trade_ingested";
    pub const TRADE_ASSIGNED: &str = "trade_assigned";
    pub const TRADE_COMPLETED: &str = "trade_completed";
    pub const TRADE_CANCELLED: &str = "trade_cancelled";
    pub const TRADE_DISPUTED: &str = "trade_disputed";
    pub const TRADE_MESSAGE_SENT: &str = "trade_message_sent";
    pub const CLOCK_IN: &str = "clock_in";
    pub const CLOCK_OUT: &str = "clock_out";
    pub const BREAK_STARTED: &str = "break_started";
    pub const BREAK_ENDED: &str = "break_ended";
    pub const SHIFT_FORCE_CLOSED: &str = "shift_force_closed";
    pub const SHIFT_ROTATED: &str = "shift_rotated";
    pub const SHIFT_REVIEWED: &str = "shift_reviewed";
}
