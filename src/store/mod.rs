//! Transactional persistence contract for trades, escalations, operators and
//! shifts.
//!
//! Every mutation in the engine runs inside one [`StoreTx`] obtained from a
//! [`Store`]. Callers never hold a transaction across platform I/O. The
//! [`unit_of_work`] module wraps begin/commit/rollback so that each unit's
//! isolation scope is explicit.

pub mod memory;
pub mod postgres;
pub mod unit_of_work;

pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use unit_of_work::{execute, execute_batch, BatchReport, UnitOfWork};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    ActivityEntry, DispatchCandidate, Escalation, Operator, Shift, ShiftStatus, ShiftType, Trade,
    TradeStatus,
};

/// Runtime config key holding the current global selling price.
pub const SELLING_PRICE_KEY: &str = "selling_price";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A uniqueness or state precondition was violated at commit time.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Source of transactions.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// One open transaction. Dropping it without `commit` discards its writes.
#[async_trait]
pub trait StoreTx: Send {
    // --- runtime config ---

    async fn selling_price(&mut self) -> Result<Option<Decimal>, StoreError>;

    // --- trades ---

    async fn find_trade(&mut self, id: Uuid) -> Result<Option<Trade>, StoreError>;

    async fn find_trade_by_hash(&mut self, trade_hash: &str) -> Result<Option<Trade>, StoreError>;

    /// Insert a new row. Fails with `Conflict` if the trade hash already exists.
    async fn insert_trade(&mut self, trade: &Trade) -> Result<(), StoreError>;

    /// Overwrite every mutable column of an existing row.
    async fn update_trade(&mut self, trade: &Trade) -> Result<(), StoreError>;

    async fn list_trades(
        &mut self,
        status: Option<TradeStatus>,
        limit: i64,
    ) -> Result<Vec<Trade>, StoreError>;

    /// PENDING trades, oldest first.
    async fn pending_trades(&mut self) -> Result<Vec<Trade>, StoreError>;

    async fn has_assigned_trade(&mut self, operator_id: Uuid) -> Result<bool, StoreError>;

    /// PENDING → ASSIGNED for `operator_id`, appending `entry` to the trade's log.
    ///
    /// Fails with `Conflict` if the trade is no longer PENDING or the operator
    /// already holds an ASSIGNED trade.
    async fn assign_trade(
        &mut self,
        trade_id: Uuid,
        operator_id: Uuid,
        assigned_at: DateTime<Utc>,
        entry: &ActivityEntry,
    ) -> Result<(), StoreError>;

    // --- escalations ---

    async fn find_escalation_for_trade(
        &mut self,
        trade_id: Uuid,
    ) -> Result<Option<Escalation>, StoreError>;

    async fn insert_escalation(&mut self, escalation: &Escalation) -> Result<(), StoreError>;

    // --- operators ---

    async fn find_operator(&mut self, id: Uuid) -> Result<Option<Operator>, StoreError>;

    async fn set_operator_clocked_in(
        &mut self,
        operator_id: Uuid,
        clocked_in: bool,
    ) -> Result<(), StoreError>;

    /// Active payers holding an ACTIVE shift, oldest account first.
    async fn dispatch_candidates(&mut self) -> Result<Vec<DispatchCandidate>, StoreError>;

    // --- shifts ---

    async fn find_shift(&mut self, id: Uuid) -> Result<Option<Shift>, StoreError>;

    /// Most recent shift of `operator_id` in one of `statuses`, optionally of one type.
    async fn find_operator_shift(
        &mut self,
        operator_id: Uuid,
        shift_type: Option<ShiftType>,
        statuses: &[ShiftStatus],
    ) -> Result<Option<Shift>, StoreError>;

    /// Every ACTIVE or ON_BREAK shift.
    async fn open_shifts(&mut self) -> Result<Vec<Shift>, StoreError>;

    async fn insert_shift(&mut self, shift: &Shift) -> Result<(), StoreError>;

    async fn update_shift(&mut self, shift: &Shift) -> Result<(), StoreError>;

    // --- lifecycle ---

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}
