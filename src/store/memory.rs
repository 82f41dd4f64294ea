//! In-process store with the same transactional contract as [`super::PgStore`].
//!
//! A transaction takes the store lock for its whole lifetime and works on a
//! copy of the state; commit swaps the copy in, rollback drops it. This gives
//! serializable behaviour, which is what tests and dry runs need.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{Store, StoreError, StoreTx, SELLING_PRICE_KEY};
use crate::models::operator::operator_role;
use crate::models::{
    ActivityEntry, DispatchCandidate, Escalation, Operator, Shift, ShiftStatus, ShiftType, Trade,
    TradeStatus,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    operators: Vec<Operator>,
    trades: Vec<Trade>,
    escalations: Vec<Escalation>,
    shifts: Vec<Shift>,
    config: HashMap<String, String>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    /// Pending one-shot failures keyed by operation name.
    failures: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `op` call (e.g. `"update_shift"`) inside any transaction fail.
    pub async fn fail_next(&self, op: &'static str) {
        *self.failures.lock().await.entry(op).or_insert(0) += 1;
    }

    pub async fn set_selling_price(&self, price: Decimal) {
        self.state
            .lock()
            .await
            .config
            .insert(SELLING_PRICE_KEY.into(), price.to_string());
    }

    /// Seed a payer account.
    pub async fn add_operator(&self, username: &str, created_at: DateTime<Utc>) -> Operator {
        let operator = Operator {
            id: Uuid::new_v4(),
            username: username.into(),
            role: operator_role::PAYER.into(),
            is_active: true,
            clocked_in: false,
            created_at,
        };
        self.state.lock().await.operators.push(operator.clone());
        operator
    }

    /// Seed a row as-is, bypassing ingestion.
    pub async fn put_trade(&self, trade: Trade) {
        self.state.lock().await.trades.push(trade);
    }

    pub async fn put_shift(&self, shift: Shift) {
        self.state.lock().await.shifts.push(shift);
    }

    pub async fn trades(&self) -> Vec<Trade> {
        self.state.lock().await.trades.clone()
    }

    pub async fn escalations(&self) -> Vec<Escalation> {
        self.state.lock().await.escalations.clone()
    }

    pub async fn shifts(&self) -> Vec<Shift> {
        self.state.lock().await.shifts.clone()
    }

    pub async fn operator(&self, id: Uuid) -> Option<Operator> {
        self.state
            .lock()
            .await
            .operators
            .iter()
            .find(|o| o.id == id)
            .cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx {
            guard,
            working,
            failures: Arc::clone(&self.failures),
        }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    failures: Arc<Mutex<HashMap<&'static str, usize>>>,
}

impl MemoryTx {
    async fn check(&self, op: &'static str) -> Result<(), StoreError> {
        let mut failures = self.failures.lock().await;
        match failures.get_mut(op) {
            Some(n) if *n > 0 => {
                *n -= 1;
                Err(StoreError::Unavailable(format!("injected failure in {op}")))
            }
            _ => Ok(()),
        }
    }

    fn trade_mut(&mut self, id: Uuid) -> Result<&mut Trade, StoreError> {
        self.working
            .trades
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::NotFound(format!("trade {id}")))
    }
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn selling_price(&mut self) -> Result<Option<Decimal>, StoreError> {
        self.check("selling_price").await?;
        Ok(self
            .working
            .config
            .get(SELLING_PRICE_KEY)
            .and_then(|v| v.parse().ok()))
    }

    async fn find_trade(&mut self, id: Uuid) -> Result<Option<Trade>, StoreError> {
        self.check("find_trade").await?;
        Ok(self.working.trades.iter().find(|t| t.id == id).cloned())
    }

    async fn find_trade_by_hash(&mut self, trade_hash: &str) -> Result<Option<Trade>, StoreError> {
        self.check("find_trade_by_hash").await?;
        Ok(self
            .working
            .trades
            .iter()
            .find(|t| t.trade_hash == trade_hash)
            .cloned())
    }

    async fn insert_trade(&mut self, trade: &Trade) -> Result<(), StoreError> {
        self.check("insert_trade").await?;
        if self.working.trades.iter().any(|t| t.trade_hash == trade.trade_hash) {
            return Err(StoreError::Conflict(format!(
                "trade hash {} already exists",
                trade.trade_hash
            )));
        }
        self.working.trades.push(trade.clone());
        Ok(())
    }

    async fn update_trade(&mut self, trade: &Trade) -> Result<(), StoreError> {
        self.check("update_trade").await?;
        let assigned_elsewhere = trade.status == TradeStatus::Assigned
            && self.working.trades.iter().any(|t| {
                t.id != trade.id
                    && t.status == TradeStatus::Assigned
                    && t.assigned_payer_id == trade.assigned_payer_id
            });
        if assigned_elsewhere {
            return Err(StoreError::Conflict("operator already holds an assigned trade".into()));
        }
        let row = self.trade_mut(trade.id)?;
        *row = trade.clone();
        Ok(())
    }

    async fn list_trades(
        &mut self,
        status: Option<TradeStatus>,
        limit: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        self.check("list_trades").await?;
        let mut trades: Vec<Trade> = self
            .working
            .trades
            .iter()
            .filter(|t| status.map_or(true, |s| t.status == s))
            .cloned()
            .collect();
        trades.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        trades.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(trades)
    }

    async fn pending_trades(&mut self) -> Result<Vec<Trade>, StoreError> {
        self.check("pending_trades").await?;
        let mut trades: Vec<Trade> = self
            .working
            .trades
            .iter()
            .filter(|t| t.status == TradeStatus::Pending)
            .cloned()
            .collect();
        trades.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(trades)
    }

    async fn has_assigned_trade(&mut self, operator_id: Uuid) -> Result<bool, StoreError> {
        self.check("has_assigned_trade").await?;
        Ok(self
            .working
            .trades
            .iter()
            .any(|t| t.status == TradeStatus::Assigned && t.assigned_payer_id == Some(operator_id)))
    }

    async fn assign_trade(
        &mut self,
        trade_id: Uuid,
        operator_id: Uuid,
        assigned_at: DateTime<Utc>,
        entry: &ActivityEntry,
    ) -> Result<(), StoreError> {
        self.check("assign_trade").await?;
        let busy = self
            .working
            .trades
            .iter()
            .any(|t| t.status == TradeStatus::Assigned && t.assigned_payer_id == Some(operator_id));
        if busy {
            return Err(StoreError::Conflict(format!(
                "operator {operator_id} already holds an assigned trade"
            )));
        }

        let trade = self.trade_mut(trade_id)?;
        if trade.status != TradeStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "trade {} is {}, not PENDING",
                trade.trade_hash, trade.status
            )));
        }
        trade.status = TradeStatus::Assigned;
        trade.assigned_payer_id = Some(operator_id);
        trade.assigned_at = Some(assigned_at);
        trade.updated_at = assigned_at;
        trade.activity_log.push(entry.clone());
        Ok(())
    }

    async fn find_escalation_for_trade(
        &mut self,
        trade_id: Uuid,
    ) -> Result<Option<Escalation>, StoreError> {
        self.check("find_escalation_for_trade").await?;
        Ok(self
            .working
            .escalations
            .iter()
            .find(|e| e.trade_id == trade_id)
            .cloned())
    }

    async fn insert_escalation(&mut self, escalation: &Escalation) -> Result<(), StoreError> {
        self.check("insert_escalation").await?;
        if self.working.escalations.iter().any(|e| e.trade_id == escalation.trade_id) {
            return Err(StoreError::Conflict(format!(
                "escalation already exists for trade {}",
                escalation.trade_hash
            )));
        }
        self.working.escalations.push(escalation.clone());
        Ok(())
    }

    async fn find_operator(&mut self, id: Uuid) -> Result<Option<Operator>, StoreError> {
        self.check("find_operator").await?;
        Ok(self.working.operators.iter().find(|o| o.id == id).cloned())
    }

    async fn set_operator_clocked_in(
        &mut self,
        operator_id: Uuid,
        clocked_in: bool,
    ) -> Result<(), StoreError> {
        self.check("set_operator_clocked_in").await?;
        let operator = self
            .working
            .operators
            .iter_mut()
            .find(|o| o.id == operator_id)
            .ok_or_else(|| StoreError::NotFound(format!("operator {operator_id}")))?;
        operator.clocked_in = clocked_in;
        Ok(())
    }

    async fn dispatch_candidates(&mut self) -> Result<Vec<DispatchCandidate>, StoreError> {
        self.check("dispatch_candidates").await?;
        let state = &self.working;
        let mut candidates: Vec<DispatchCandidate> = state
            .operators
            .iter()
            .filter(|o| o.is_active && o.is_payer())
            .filter(|o| {
                state
                    .shifts
                    .iter()
                    .any(|s| s.operator_id == o.id && s.status == ShiftStatus::Active)
            })
            .map(|o| DispatchCandidate {
                operator_id: o.id,
                username: o.username.clone(),
                created_at: o.created_at,
                last_assigned_at: state
                    .trades
                    .iter()
                    .filter(|t| t.assigned_payer_id == Some(o.id))
                    .filter_map(|t| t.assigned_at)
                    .max(),
            })
            .collect();
        candidates.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.operator_id.cmp(&b.operator_id))
        });
        Ok(candidates)
    }

    async fn find_shift(&mut self, id: Uuid) -> Result<Option<Shift>, StoreError> {
        self.check("find_shift").await?;
        Ok(self.working.shifts.iter().find(|s| s.id == id).cloned())
    }

    async fn find_operator_shift(
        &mut self,
        operator_id: Uuid,
        shift_type: Option<ShiftType>,
        statuses: &[ShiftStatus],
    ) -> Result<Option<Shift>, StoreError> {
        self.check("find_operator_shift").await?;
        Ok(self
            .working
            .shifts
            .iter()
            .filter(|s| s.operator_id == operator_id)
            .filter(|s| shift_type.map_or(true, |t| s.shift_type == t))
            .filter(|s| statuses.contains(&s.status))
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn open_shifts(&mut self) -> Result<Vec<Shift>, StoreError> {
        self.check("open_shifts").await?;
        Ok(self
            .working
            .shifts
            .iter()
            .filter(|s| s.status.is_open())
            .cloned()
            .collect())
    }

    async fn insert_shift(&mut self, shift: &Shift) -> Result<(), StoreError> {
        self.check("insert_shift").await?;
        self.working.shifts.push(shift.clone());
        Ok(())
    }

    async fn update_shift(&mut self, shift: &Shift) -> Result<(), StoreError> {
        self.check("update_shift").await?;
        let row = self
            .working
            .shifts
            .iter_mut()
            .find(|s| s.id == shift.id)
            .ok_or_else(|| StoreError::NotFound(format!("shift {}", shift.id)))?;
        *row = shift.clone();
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.check("commit").await?;
        let MemoryTx {
            mut guard, working, ..
        } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
