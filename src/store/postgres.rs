//! PostgreSQL implementation of the store contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{Store, StoreError, StoreTx, SELLING_PRICE_KEY};
use crate::models::operator::operator_role;
use crate::models::{
    ActivityEntry, DispatchCandidate, Escalation, Operator, Platform, Shift, ShiftBreak,
    ShiftEndType, ShiftStatus, ShiftType, Trade, TradeStatus,
};

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>, StoreError> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

/// Map unique-index violations to `Conflict`, everything else to `Database`.
fn classify(e: sqlx::Error, what: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Conflict(format!("{what}: {}", db.message()));
        }
    }
    StoreError::Database(e)
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(Debug, FromRow)]
struct TradeRow {
    id: Uuid,
    trade_hash: String,
    platform: String,
    account_id: Uuid,
    status: String,
    trade_status: Option<String>,
    amount: Option<Decimal>,
    fiat_currency: Option<String>,
    crypto_currency: Option<String>,
    crypto_amount_requested: Option<Decimal>,
    crypto_amount_total: Option<Decimal>,
    fee_amount: Option<Decimal>,
    fee_percentage: Option<Decimal>,
    btc_rate: Decimal,
    dollar_rate: Decimal,
    btc_amount: Option<Decimal>,
    payment_method: Option<String>,
    counterparty: Option<String>,
    assigned_payer_id: Option<Uuid>,
    assigned_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    flagged: bool,
    activity_log: Json<Vec<ActivityEntry>>,
    platform_metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TradeRow> for Trade {
    type Error = StoreError;

    fn try_from(row: TradeRow) -> Result<Self, Self::Error> {
        let platform = Platform::parse(&row.platform)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown platform {}", row.platform)))?;
        let status = TradeStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown trade status {}", row.status)))?;

        Ok(Trade {
            id: row.id,
            trade_hash: row.trade_hash,
            platform,
            account_id: row.account_id,
            status,
            trade_status: row.trade_status,
            amount: row.amount,
            fiat_currency: row.fiat_currency,
            crypto_currency: row.crypto_currency,
            crypto_amount_requested: row.crypto_amount_requested,
            crypto_amount_total: row.crypto_amount_total,
            fee_amount: row.fee_amount,
            fee_percentage: row.fee_percentage,
            btc_rate: row.btc_rate,
            dollar_rate: row.dollar_rate,
            btc_amount: row.btc_amount,
            payment_method: row.payment_method,
            counterparty: row.counterparty,
            assigned_payer_id: row.assigned_payer_id,
            assigned_at: row.assigned_at,
            completed_at: row.completed_at,
            flagged: row.flagged,
            activity_log: row.activity_log.0,
            platform_metadata: row.platform_metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct ShiftRow {
    id: Uuid,
    operator_id: Uuid,
    shift_type: String,
    status: String,
    is_clocked_in: bool,
    clock_in_time: Option<DateTime<Utc>>,
    clock_out_time: Option<DateTime<Utc>>,
    breaks: Json<Vec<ShiftBreak>>,
    total_work_duration: i64,
    overtime_minutes: i64,
    is_late_clock_in: bool,
    late_minutes: i64,
    shift_end_type: Option<String>,
    admin_id: Option<Uuid>,
    admin_notes: Option<String>,
    approved_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ShiftRow> for Shift {
    type Error = StoreError;

    fn try_from(row: ShiftRow) -> Result<Self, Self::Error> {
        let shift_type = ShiftType::parse(&row.shift_type)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown shift type {}", row.shift_type)))?;
        let status = ShiftStatus::parse(&row.status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown shift status {}", row.status)))?;
        let shift_end_type = match row.shift_end_type.as_deref() {
            Some(s) => Some(
                ShiftEndType::parse(s)
                    .ok_or_else(|| StoreError::Corrupt(format!("unknown shift end type {s}")))?,
            ),
            None => None,
        };

        Ok(Shift {
            id: row.id,
            operator_id: row.operator_id,
            shift_type,
            status,
            is_clocked_in: row.is_clocked_in,
            clock_in_time: row.clock_in_time,
            clock_out_time: row.clock_out_time,
            breaks: row.breaks.0,
            total_work_duration: row.total_work_duration,
            overtime_minutes: row.overtime_minutes,
            is_late_clock_in: row.is_late_clock_in,
            late_minutes: row.late_minutes,
            shift_end_type,
            admin_id: row.admin_id,
            admin_notes: row.admin_notes,
            approved_at: row.approved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct EscalationRow {
    id: Uuid,
    trade_id: Uuid,
    trade_hash: String,
    platform: String,
    amount: Option<Decimal>,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<EscalationRow> for Escalation {
    type Error = StoreError;

    fn try_from(row: EscalationRow) -> Result<Self, Self::Error> {
        let platform = Platform::parse(&row.platform)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown platform {}", row.platform)))?;
        Ok(Escalation {
            id: row.id,
            trade_id: row.trade_id,
            trade_hash: row.trade_hash,
            platform,
            amount: row.amount,
            reason: row.reason,
            status: row.status,
            created_at: row.created_at,
        })
    }
}

fn trades_from_rows(rows: Vec<TradeRow>) -> Result<Vec<Trade>, StoreError> {
    rows.into_iter().map(Trade::try_from).collect()
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

#[async_trait]
impl StoreTx for PgTx {
    async fn selling_price(&mut self) -> Result<Option<Decimal>, StoreError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM runtime_config WHERE key = $1")
                .bind(SELLING_PRICE_KEY)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(value.and_then(|v| v.trim().parse().ok()))
    }

    async fn find_trade(&mut self, id: Uuid) -> Result<Option<Trade>, StoreError> {
        let row = sqlx::query_as::<_, TradeRow>("SELECT * FROM trades WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Trade::try_from).transpose()
    }

    async fn find_trade_by_hash(&mut self, trade_hash: &str) -> Result<Option<Trade>, StoreError> {
        let row = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE trade_hash = $1 FOR UPDATE",
        )
        .bind(trade_hash)
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Trade::try_from).transpose()
    }

    async fn insert_trade(&mut self, t: &Trade) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO trades (
                id, trade_hash, platform, account_id, status, trade_status, amount,
                fiat_currency, crypto_currency, crypto_amount_requested, crypto_amount_total,
                fee_amount, fee_percentage, btc_rate, dollar_rate, btc_amount,
                payment_method, counterparty, assigned_payer_id, assigned_at, completed_at,
                flagged, activity_log, platform_metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20, $21, $22, $23, $24, $25, $26)
            "#,
        )
        .bind(t.id)
        .bind(&t.trade_hash)
        .bind(t.platform.as_str())
        .bind(t.account_id)
        .bind(t.status.as_str())
        .bind(&t.trade_status)
        .bind(t.amount)
        .bind(&t.fiat_currency)
        .bind(&t.crypto_currency)
        .bind(t.crypto_amount_requested)
        .bind(t.crypto_amount_total)
        .bind(t.fee_amount)
        .bind(t.fee_percentage)
        .bind(t.btc_rate)
        .bind(t.dollar_rate)
        .bind(t.btc_amount)
        .bind(&t.payment_method)
        .bind(&t.counterparty)
        .bind(t.assigned_payer_id)
        .bind(t.assigned_at)
        .bind(t.completed_at)
        .bind(t.flagged)
        .bind(Json(&t.activity_log))
        .bind(&t.platform_metadata)
        .bind(t.created_at)
        .bind(t.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "insert trade"))?;

        Ok(())
    }

    async fn update_trade(&mut self, t: &Trade) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = $2, trade_status = $3, amount = $4, fiat_currency = $5,
                crypto_currency = $6, crypto_amount_requested = $7, crypto_amount_total = $8,
                fee_amount = $9, fee_percentage = $10, btc_rate = $11, dollar_rate = $12,
                btc_amount = $13, payment_method = $14, counterparty = $15,
                assigned_payer_id = $16, assigned_at = $17, completed_at = $18,
                flagged = $19, activity_log = $20, platform_metadata = $21, updated_at = $22
            WHERE id = $1
            "#,
        )
        .bind(t.id)
        .bind(t.status.as_str())
        .bind(&t.trade_status)
        .bind(t.amount)
        .bind(&t.fiat_currency)
        .bind(&t.crypto_currency)
        .bind(t.crypto_amount_requested)
        .bind(t.crypto_amount_total)
        .bind(t.fee_amount)
        .bind(t.fee_percentage)
        .bind(t.btc_rate)
        .bind(t.dollar_rate)
        .bind(t.btc_amount)
        .bind(&t.payment_method)
        .bind(&t.counterparty)
        .bind(t.assigned_payer_id)
        .bind(t.assigned_at)
        .bind(t.completed_at)
        .bind(t.flagged)
        .bind(Json(&t.activity_log))
        .bind(&t.platform_metadata)
        .bind(t.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "update trade"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("trade {}", t.id)));
        }
        Ok(())
    }

    async fn list_trades(
        &mut self,
        status: Option<TradeStatus>,
        limit: i64,
    ) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query_as::<_, TradeRow>(
            r#"
            SELECT * FROM trades
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(status.map(|s| s.as_str()))
        .bind(limit)
        .fetch_all(&mut *self.tx)
        .await?;

        trades_from_rows(rows)
    }

    async fn pending_trades(&mut self) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query_as::<_, TradeRow>(
            "SELECT * FROM trades WHERE status = 'PENDING' ORDER BY created_at ASC, id ASC",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        trades_from_rows(rows)
    }

    async fn has_assigned_trade(&mut self, operator_id: Uuid) -> Result<bool, StoreError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM trades WHERE assigned_payer_id = $1 AND status = 'ASSIGNED')",
        )
        .bind(operator_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(exists)
    }

    async fn assign_trade(
        &mut self,
        trade_id: Uuid,
        operator_id: Uuid,
        assigned_at: DateTime<Utc>,
        entry: &ActivityEntry,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE trades
            SET status = 'ASSIGNED',
                assigned_payer_id = $2,
                assigned_at = $3,
                updated_at = $3,
                activity_log = activity_log || jsonb_build_array($4::jsonb)
            WHERE id = $1 AND status = 'PENDING'
            "#,
        )
        .bind(trade_id)
        .bind(operator_id)
        .bind(assigned_at)
        .bind(Json(entry))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "assign trade"))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!("trade {trade_id} is no longer PENDING")));
        }
        Ok(())
    }

    async fn find_escalation_for_trade(
        &mut self,
        trade_id: Uuid,
    ) -> Result<Option<Escalation>, StoreError> {
        let row = sqlx::query_as::<_, EscalationRow>("SELECT * FROM escalations WHERE trade_id = $1")
            .bind(trade_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Escalation::try_from).transpose()
    }

    async fn insert_escalation(&mut self, e: &Escalation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO escalations (id, trade_id, trade_hash, platform, amount, reason, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(e.id)
        .bind(e.trade_id)
        .bind(&e.trade_hash)
        .bind(e.platform.as_str())
        .bind(e.amount)
        .bind(&e.reason)
        .bind(&e.status)
        .bind(e.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|err| classify(err, "insert escalation"))?;

        Ok(())
    }

    async fn find_operator(&mut self, id: Uuid) -> Result<Option<Operator>, StoreError> {
        let operator = sqlx::query_as::<_, Operator>(
            "SELECT id, username, role, is_active, clocked_in, created_at FROM operators WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(operator)
    }

    async fn set_operator_clocked_in(
        &mut self,
        operator_id: Uuid,
        clocked_in: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE operators SET clocked_in = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(operator_id)
        .bind(clocked_in)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("operator {operator_id}")));
        }
        Ok(())
    }

    async fn dispatch_candidates(&mut self) -> Result<Vec<DispatchCandidate>, StoreError> {
        let candidates = sqlx::query_as::<_, DispatchCandidate>(
            r#"
            SELECT o.id AS operator_id,
                   o.username,
                   o.created_at,
                   (SELECT MAX(t.assigned_at) FROM trades t WHERE t.assigned_payer_id = o.id)
                       AS last_assigned_at
            FROM operators o
            WHERE o.is_active
              AND o.role = $1
              AND EXISTS (
                  SELECT 1 FROM shifts s WHERE s.operator_id = o.id AND s.status = 'ACTIVE'
              )
            ORDER BY o.created_at ASC, o.id ASC
            "#,
        )
        .bind(operator_role::PAYER)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(candidates)
    }

    async fn find_shift(&mut self, id: Uuid) -> Result<Option<Shift>, StoreError> {
        let row = sqlx::query_as::<_, ShiftRow>("SELECT * FROM shifts WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;

        row.map(Shift::try_from).transpose()
    }

    async fn find_operator_shift(
        &mut self,
        operator_id: Uuid,
        shift_type: Option<ShiftType>,
        statuses: &[ShiftStatus],
    ) -> Result<Option<Shift>, StoreError> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let row = sqlx::query_as::<_, ShiftRow>(
            r#"
            SELECT * FROM shifts
            WHERE operator_id = $1
              AND status = ANY($2)
              AND ($3::text IS NULL OR shift_type = $3)
            ORDER BY created_at DESC
            LIMIT 1
            FOR UPDATE
            "#,
        )
        .bind(operator_id)
        .bind(&statuses)
        .bind(shift_type.map(|t| t.as_str()))
        .fetch_optional(&mut *self.tx)
        .await?;

        row.map(Shift::try_from).transpose()
    }

    async fn open_shifts(&mut self) -> Result<Vec<Shift>, StoreError> {
        let rows = sqlx::query_as::<_, ShiftRow>(
            "SELECT * FROM shifts WHERE status IN ('ACTIVE', 'ON_BREAK') ORDER BY created_at ASC",
        )
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter().map(Shift::try_from).collect()
    }

    async fn insert_shift(&mut self, s: &Shift) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO shifts (
                id, operator_id, shift_type, status, is_clocked_in, clock_in_time, clock_out_time,
                breaks, total_work_duration, overtime_minutes, is_late_clock_in, late_minutes,
                shift_end_type, admin_id, admin_notes, approved_at, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(s.id)
        .bind(s.operator_id)
        .bind(s.shift_type.as_str())
        .bind(s.status.as_str())
        .bind(s.is_clocked_in)
        .bind(s.clock_in_time)
        .bind(s.clock_out_time)
        .bind(Json(&s.breaks))
        .bind(s.total_work_duration)
        .bind(s.overtime_minutes)
        .bind(s.is_late_clock_in)
        .bind(s.late_minutes)
        .bind(s.shift_end_type.map(|e| e.as_str()))
        .bind(s.admin_id)
        .bind(&s.admin_notes)
        .bind(s.approved_at)
        .bind(s.created_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| classify(e, "insert shift"))?;

        Ok(())
    }

    async fn update_shift(&mut self, s: &Shift) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE shifts
            SET status = $2, is_clocked_in = $3, clock_in_time = $4, clock_out_time = $5,
                breaks = $6, total_work_duration = $7, overtime_minutes = $8,
                is_late_clock_in = $9, late_minutes = $10, shift_end_type = $11,
                admin_id = $12, admin_notes = $13, approved_at = $14, updated_at = $15
            WHERE id = $1
            "#,
        )
        .bind(s.id)
        .bind(s.status.as_str())
        .bind(s.is_clocked_in)
        .bind(s.clock_in_time)
        .bind(s.clock_out_time)
        .bind(Json(&s.breaks))
        .bind(s.total_work_duration)
        .bind(s.overtime_minutes)
        .bind(s.is_late_clock_in)
        .bind(s.late_minutes)
        .bind(s.shift_end_type.map(|e| e.as_str()))
        .bind(s.admin_id)
        .bind(&s.admin_notes)
        .bind(s.approved_at)
        .bind(s.updated_at)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("shift {}", s.id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await?;
        Ok(())
    }
}
