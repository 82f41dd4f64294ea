pub mod escalation;
pub mod normalizer;
pub mod pipeline;

pub use escalation::{ensure_escalation, is_dispute};
pub use normalizer::{normalize, NormalizeError};
pub use pipeline::{
    persist_trades, run_ingestion_cycle, IngestionReport, IngestionSettings, UpsertOutcome,
    UpsertTrade,
};
