use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::json;
use uuid::Uuid;

use super::schedule::ShiftSchedule;
use super::ShiftError;
use crate::models::activity::{actions, SYSTEM_ACTOR};
use crate::models::{Shift, ShiftBreak, ShiftEndType, ShiftStatus};
use crate::services::events::EngineEvent;
use crate::services::Sinks;
use crate::store::{execute, Store, StoreTx, UnitOfWork};

const OPEN: &[ShiftStatus] = &[ShiftStatus::Active, ShiftStatus::OnBreak];

async fn require_active_operator(tx: &mut dyn StoreTx, operator_id: Uuid) -> Result<(), ShiftError> {
    let operator = tx
        .find_operator(operator_id)
        .await?
        .ok_or(ShiftError::OperatorNotFound(operator_id))?;
    if !operator.is_active {
        return Err(ShiftError::OperatorInactive(operator_id));
    }
    Ok(())
}

async fn announce(sinks: &Sinks, shift: &Shift, action: &str, performed_by: &str) {
    sinks
        .activity
        .append_activity(
            shift.id,
            action,
            performed_by,
            json!({
                "operator_id": shift.operator_id,
                "shift_type": shift.shift_type.as_str(),
                "status": shift.status.as_str(),
            }),
        )
        .await;
    sinks.events.publish(EngineEvent::ShiftChanged(shift.clone()));
}

/// Stamp clock-out and fold the session into the shift's work totals.
fn close_session(shift: &mut Shift, now: DateTime<Utc>) {
    if shift.is_clocked_in {
        shift.total_work_duration += shift.minutes_worked_since_clock_in(now);
    }
    shift.close_open_break(now);
    shift.overtime_minutes =
        ShiftSchedule::overtime_minutes(shift.shift_type, shift.total_work_duration);
    shift.clock_out_time = Some(now);
    shift.is_clocked_in = false;
    shift.updated_at = now;
}

// ---------------------------------------------------------------------------
// Clock-in
// ---------------------------------------------------------------------------

struct ClockIn {
    operator_id: Uuid,
    schedule: ShiftSchedule,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for ClockIn {
    type Output = Shift;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("clock in {}", self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Shift, ShiftError> {
        require_active_operator(tx, self.operator_id).await?;

        // A shift still open in the current window is resumed; otherwise a
        // clock-in just before a boundary starts the upcoming window early.
        let current = self.schedule.shift_type_at(self.now);
        let open = tx.find_operator_shift(self.operator_id, None, OPEN).await?;
        let shift_type = match &open {
            Some(s) if s.shift_type == current => current,
            _ => self.schedule.clock_in_shift_type(self.now),
        };

        if let Some(other) = open {
            if other.shift_type != shift_type || other.status != ShiftStatus::Active {
                return Err(ShiftError::OnOtherShift {
                    operator_id: self.operator_id,
                    shift_type: other.shift_type,
                    status: other.status,
                });
            }
        }

        let existing = tx
            .find_operator_shift(self.operator_id, Some(shift_type), &[ShiftStatus::Active])
            .await?;

        let (mut shift, is_new) = match existing {
            Some(s) if s.is_clocked_in => return Err(ShiftError::AlreadyClockedIn(self.operator_id)),
            Some(s) => (s, false),
            None => (Shift::new(self.operator_id, shift_type, self.now), true),
        };

        // Lateness is decided by the first clock-in of a shift only.
        if shift.clock_in_time.is_none() {
            let late = self.schedule.late_minutes(shift_type, self.now);
            shift.is_late_clock_in = late > 0;
            shift.late_minutes = late;
        }
        shift.is_clocked_in = true;
        shift.clock_in_time = Some(self.now);
        shift.updated_at = self.now;

        if is_new {
            tx.insert_shift(&shift).await?;
        } else {
            tx.update_shift(&shift).await?;
        }
        tx.set_operator_clocked_in(self.operator_id, true).await?;

        Ok(shift)
    }
}

pub async fn clock_in(
    store: &dyn Store,
    sinks: &Sinks,
    schedule: &ShiftSchedule,
    operator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    let shift = execute(
        store,
        &ClockIn {
            operator_id,
            schedule: *schedule,
            now,
        },
    )
    .await?;

    tracing::info!(
        operator_id = %operator_id,
        shift_type = %shift.shift_type,
        late_minutes = shift.late_minutes,
        "Clocked in"
    );
    announce(sinks, &shift, actions::CLOCK_IN, &operator_id.to_string()).await;
    Ok(shift)
}

// ---------------------------------------------------------------------------
// Clock-out
// ---------------------------------------------------------------------------

struct ClockOut {
    operator_id: Uuid,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for ClockOut {
    type Output = Shift;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("clock out {}", self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Shift, ShiftError> {
        let mut shift = tx
            .find_operator_shift(self.operator_id, None, &[ShiftStatus::Active])
            .await?
            .ok_or(ShiftError::NoActiveShift(self.operator_id))?;

        close_session(&mut shift, self.now);
        shift.status = ShiftStatus::Ended;
        shift.shift_end_type = Some(ShiftEndType::Normal);

        tx.update_shift(&shift).await?;
        tx.set_operator_clocked_in(self.operator_id, false).await?;

        Ok(shift)
    }
}

/// Fallback after a failed clock-out: close whatever is open as FORCE_CLOSED
/// and clear the operator's clocked-in flag.
struct ForceCloseOnError {
    operator_id: Uuid,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for ForceCloseOnError {
    type Output = Option<Shift>;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("force close after failed clock out {}", self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Option<Shift>, ShiftError> {
        let shift = match tx.find_operator_shift(self.operator_id, None, OPEN).await? {
            Some(mut shift) => {
                close_session(&mut shift, self.now);
                shift.status = ShiftStatus::ForceClosed;
                shift.shift_end_type = Some(ShiftEndType::ForceClosedOnError);
                tx.update_shift(&shift).await?;
                Some(shift)
            }
            None => None,
        };
        tx.set_operator_clocked_in(self.operator_id, false).await?;
        Ok(shift)
    }
}

struct ClearClockedIn {
    operator_id: Uuid,
}

#[async_trait]
impl UnitOfWork for ClearClockedIn {
    type Output = ();
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("clear clocked-in flag {}", self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<(), ShiftError> {
        tx.set_operator_clocked_in(self.operator_id, false).await?;
        Ok(())
    }
}

/// End the operator's ACTIVE shift.
///
/// A persistence failure never leaves the operator clocked in: the shift is
/// closed as FORCE_CLOSED instead and returned with that status.
pub async fn clock_out(
    store: &dyn Store,
    sinks: &Sinks,
    operator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    let err = match execute(store, &ClockOut { operator_id, now }).await {
        Ok(shift) => {
            tracing::info!(
                operator_id = %operator_id,
                worked = shift.total_work_duration,
                overtime = shift.overtime_minutes,
                "Clocked out"
            );
            announce(sinks, &shift, actions::CLOCK_OUT, &operator_id.to_string()).await;
            return Ok(shift);
        }
        Err(e @ ShiftError::Store(_)) => e,
        Err(e) => return Err(e),
    };

    tracing::error!(operator_id = %operator_id, error = %err, "Clock-out failed, force closing shift");
    counter!("shift_force_closed_total").increment(1);

    match execute(store, &ForceCloseOnError { operator_id, now }).await {
        Ok(Some(shift)) => {
            announce(sinks, &shift, actions::SHIFT_FORCE_CLOSED, SYSTEM_ACTOR).await;
            Ok(shift)
        }
        Ok(None) => Err(err),
        Err(fallback) => {
            tracing::error!(operator_id = %operator_id, error = %fallback, "Force close failed");
            if let Err(e) = execute(store, &ClearClockedIn { operator_id }).await {
                tracing::error!(operator_id = %operator_id, error = %e, "Could not clear clocked-in flag");
            }
            Err(err)
        }
    }
}

// ---------------------------------------------------------------------------
// Breaks
// ---------------------------------------------------------------------------

struct StartBreak {
    operator_id: Uuid,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for StartBreak {
    type Output = Shift;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("start break {}", self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Shift, ShiftError> {
        let mut shift = tx
            .find_operator_shift(self.operator_id, None, OPEN)
            .await?
            .ok_or(ShiftError::NoActiveShift(self.operator_id))?;

        if shift.status != ShiftStatus::Active {
            return Err(ShiftError::InvalidState {
                action: "start break",
                status: shift.status,
            });
        }

        shift.breaks.push(ShiftBreak::open(self.now));
        shift.status = ShiftStatus::OnBreak;
        shift.updated_at = self.now;
        tx.update_shift(&shift).await?;
        Ok(shift)
    }
}

pub async fn start_break(
    store: &dyn Store,
    sinks: &Sinks,
    operator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    let shift = execute(store, &StartBreak { operator_id, now }).await?;
    announce(sinks, &shift, actions::BREAK_STARTED, &operator_id.to_string()).await;
    Ok(shift)
}

struct EndBreak {
    operator_id: Uuid,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for EndBreak {
    type Output = Shift;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("end break {}", self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Shift, ShiftError> {
        let mut shift = tx
            .find_operator_shift(self.operator_id, None, OPEN)
            .await?
            .ok_or(ShiftError::NoActiveShift(self.operator_id))?;

        if shift.status != ShiftStatus::OnBreak {
            return Err(ShiftError::InvalidState {
                action: "end break",
                status: shift.status,
            });
        }
        if !shift.close_open_break(self.now) {
            return Err(ShiftError::NoOpenBreak(shift.id));
        }

        shift.status = ShiftStatus::Active;
        shift.updated_at = self.now;
        tx.update_shift(&shift).await?;
        Ok(shift)
    }
}

pub async fn end_break(
    store: &dyn Store,
    sinks: &Sinks,
    operator_id: Uuid,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    let shift = execute(store, &EndBreak { operator_id, now }).await?;
    announce(sinks, &shift, actions::BREAK_ENDED, &operator_id.to_string()).await;
    Ok(shift)
}

// ---------------------------------------------------------------------------
// Admin actions
// ---------------------------------------------------------------------------

struct ForceEnd<'a> {
    shift_id: Uuid,
    admin_id: Uuid,
    notes: Option<&'a str>,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for ForceEnd<'_> {
    type Output = Shift;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("force end shift {}", self.shift_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Shift, ShiftError> {
        let mut shift = tx
            .find_shift(self.shift_id)
            .await?
            .ok_or(ShiftError::ShiftNotFound(self.shift_id))?;

        let was_open = shift.status.is_open();
        if was_open {
            close_session(&mut shift, self.now);
        } else {
            shift.updated_at = self.now;
        }
        shift.status = ShiftStatus::ForceClosed;
        shift.shift_end_type = Some(ShiftEndType::AdminForceClosed);
        shift.admin_id = Some(self.admin_id);
        shift.admin_notes = self.notes.map(str::to_string);
        shift.approved_at = Some(self.now);

        tx.update_shift(&shift).await?;
        // A closed shift says nothing about the operator's current session.
        if was_open {
            tx.set_operator_clocked_in(shift.operator_id, false).await?;
        }
        Ok(shift)
    }
}

/// Close any shift as FORCE_CLOSED, whatever its state.
pub async fn force_end(
    store: &dyn Store,
    sinks: &Sinks,
    shift_id: Uuid,
    admin_id: Uuid,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    let shift = execute(
        store,
        &ForceEnd {
            shift_id,
            admin_id,
            notes,
            now,
        },
    )
    .await?;

    counter!("shift_force_closed_total").increment(1);
    tracing::warn!(shift_id = %shift_id, admin_id = %admin_id, "Shift force closed by admin");
    announce(sinks, &shift, actions::SHIFT_FORCE_CLOSED, &admin_id.to_string()).await;
    Ok(shift)
}

struct Review<'a> {
    shift_id: Uuid,
    admin_id: Uuid,
    approve: bool,
    notes: Option<&'a str>,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for Review<'_> {
    type Output = Shift;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("review shift {} (approve={})", self.shift_id, self.approve)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Shift, ShiftError> {
        let mut shift = tx
            .find_shift(self.shift_id)
            .await?
            .ok_or(ShiftError::ShiftNotFound(self.shift_id))?;

        if !shift.status.awaits_review() {
            return Err(ShiftError::InvalidState {
                action: if self.approve { "approve" } else { "reject" },
                status: shift.status,
            });
        }

        shift.status = if self.approve {
            ShiftStatus::Approved
        } else {
            ShiftStatus::Rejected
        };
        shift.admin_id = Some(self.admin_id);
        if let Some(notes) = self.notes {
            shift.admin_notes = Some(notes.to_string());
        }
        shift.approved_at = Some(self.now);
        shift.updated_at = self.now;

        tx.update_shift(&shift).await?;
        Ok(shift)
    }
}

async fn review(
    store: &dyn Store,
    sinks: &Sinks,
    unit: Review<'_>,
) -> Result<Shift, ShiftError> {
    let admin_id = unit.admin_id;
    let shift = execute(store, &unit).await?;
    tracing::info!(shift_id = %shift.id, status = %shift.status, "Shift reviewed");
    announce(sinks, &shift, actions::SHIFT_REVIEWED, &admin_id.to_string()).await;
    Ok(shift)
}

/// PENDING_APPROVAL or FORCE_CLOSED → APPROVED.
pub async fn approve_shift(
    store: &dyn Store,
    sinks: &Sinks,
    shift_id: Uuid,
    admin_id: Uuid,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    review(
        store,
        sinks,
        Review {
            shift_id,
            admin_id,
            approve: true,
            notes,
            now,
        },
    )
    .await
}

/// PENDING_APPROVAL or FORCE_CLOSED → REJECTED.
pub async fn reject_shift(
    store: &dyn Store,
    sinks: &Sinks,
    shift_id: Uuid,
    admin_id: Uuid,
    notes: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Shift, ShiftError> {
    review(
        store,
        sinks,
        Review {
            shift_id,
            admin_id,
            approve: false,
            notes,
            now,
        },
    )
    .await
}
