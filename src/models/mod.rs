pub mod activity;
pub mod escalation;
pub mod operator;
pub mod shift;
pub mod trade;

pub use activity::ActivityEntry;
pub use escalation::Escalation;
pub use operator::{DispatchCandidate, Operator};
pub use shift::{Shift, ShiftBreak, ShiftEndType, ShiftStatus, ShiftType};
pub use trade::{NewTrade, Trade, TradeStatus};

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

/// External P2P marketplaces trades are pulled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Noones,
    Paxful,
    Binance,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Noones => "noones",
            Platform::Paxful => "paxful",
            Platform::Binance => "binance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "noones" => Some(Platform::Noones),
            "paxful" => Some(Platform::Paxful),
            "binance" => Some(Platform::Binance),
            _ => None,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// PlatformAccount: ingestion provenance
// ---------------------------------------------------------------------------

/// One external trading account. Credentials live with the adapter, not here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformAccount {
    pub id: Uuid,
    pub platform: Platform,
    pub label: String,
}

impl fmt::Display for PlatformAccount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.platform, self.label)
    }
}
