use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use uuid::Uuid;

use super::schedule::ShiftSchedule;
use super::ShiftError;
use crate::models::activity::{actions, SYSTEM_ACTOR};
use crate::models::{Shift, ShiftEndType, ShiftStatus, ShiftType};
use crate::services::events::EngineEvent;
use crate::services::Sinks;
use crate::store::{execute, Store, StoreError, StoreTx, UnitOfWork};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RotationReport {
    pub examined: usize,
    pub rotated: usize,
    pub not_due: usize,
    pub opened: usize,
    pub failed: usize,
    pub upcoming: Option<ShiftType>,
}

/// Close one elapsed shift as PENDING_APPROVAL. `None` if it closed meanwhile.
struct RotateShift {
    shift_id: Uuid,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for RotateShift {
    type Output = Option<Shift>;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("rotate shift {}", self.shift_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Option<Shift>, ShiftError> {
        let Some(mut shift) = tx.find_shift(self.shift_id).await? else {
            return Err(ShiftError::ShiftNotFound(self.shift_id));
        };
        if !shift.status.is_open() {
            return Ok(None);
        }

        let now = self.now;
        shift.close_open_break(now);
        if shift.clock_in_time.is_some() {
            shift.total_work_duration += shift.minutes_worked_since_clock_in(now);
        }
        shift.overtime_minutes =
            ShiftSchedule::overtime_minutes(shift.shift_type, shift.total_work_duration);
        shift.clock_out_time = Some(now);
        shift.is_clocked_in = false;
        shift.status = ShiftStatus::PendingApproval;
        shift.shift_end_type = Some(ShiftEndType::PendingAdminApproval);
        shift.updated_at = now;

        tx.update_shift(&shift).await?;
        tx.set_operator_clocked_in(shift.operator_id, false).await?;
        Ok(Some(shift))
    }
}

/// Start the upcoming shift for an operator who was just rotated out.
struct OpenNextShift {
    operator_id: Uuid,
    shift_type: ShiftType,
    now: DateTime<Utc>,
}

#[async_trait]
impl UnitOfWork for OpenNextShift {
    type Output = Option<Shift>;
    type Error = ShiftError;

    fn describe(&self) -> String {
        format!("open {} shift for {}", self.shift_type, self.operator_id)
    }

    async fn run(&self, tx: &mut dyn StoreTx) -> Result<Option<Shift>, ShiftError> {
        let operator = tx
            .find_operator(self.operator_id)
            .await?
            .ok_or(ShiftError::OperatorNotFound(self.operator_id))?;
        if !operator.is_active {
            return Ok(None);
        }

        let open = [ShiftStatus::Active, ShiftStatus::OnBreak];
        if tx
            .find_operator_shift(self.operator_id, Some(self.shift_type), &open)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let mut shift = Shift::new(self.operator_id, self.shift_type, self.now);
        shift.is_clocked_in = true;
        shift.clock_in_time = Some(self.now);

        tx.insert_shift(&shift).await?;
        tx.set_operator_clocked_in(self.operator_id, true).await?;
        Ok(Some(shift))
    }
}

async fn open_shifts(store: &dyn Store) -> Result<Vec<Shift>, StoreError> {
    let mut tx = store.begin().await?;
    let shifts = tx.open_shifts().await?;
    tx.rollback().await?;
    Ok(shifts)
}

/// Rotate every open shift whose window has elapsed, then start the upcoming
/// window's shift for the operators that were rotated out.
///
/// Each operator is handled in its own transaction; failures are logged and
/// skipped. Fails only when the open shifts cannot be listed.
pub async fn run_shift_rotation(
    store: &dyn Store,
    sinks: &Sinks,
    schedule: &ShiftSchedule,
    now: DateTime<Utc>,
) -> Result<RotationReport, StoreError> {
    let shifts = open_shifts(store).await?;
    let upcoming = schedule.shift_type_at(now);

    let mut report = RotationReport {
        examined: shifts.len(),
        upcoming: Some(upcoming),
        ..Default::default()
    };
    let mut rotated_operators = BTreeSet::new();

    for shift in &shifts {
        let anchor = shift.clock_in_time.unwrap_or(shift.created_at);
        let ends_at = schedule.window_end_for(shift.shift_type, anchor);
        if ends_at > now {
            report.not_due += 1;
            continue;
        }

        match execute(store, &RotateShift { shift_id: shift.id, now }).await {
            Ok(Some(closed)) => {
                report.rotated += 1;
                counter!("shifts_rotated_total").increment(1);
                rotated_operators.insert(closed.operator_id);
                sinks
                    .activity
                    .append_activity(
                        closed.id,
                        actions::SHIFT_ROTATED,
                        SYSTEM_ACTOR,
                        json!({
                            "operator_id": closed.operator_id,
                            "worked": closed.total_work_duration,
                            "overtime": closed.overtime_minutes,
                        }),
                    )
                    .await;
                sinks.events.publish(EngineEvent::ShiftChanged(closed));
            }
            Ok(None) => {}
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    shift_id = %shift.id,
                    operator_id = %shift.operator_id,
                    error = %e,
                    "Shift rotation failed for operator"
                );
            }
        }
    }

    for operator_id in rotated_operators {
        let unit = OpenNextShift {
            operator_id,
            shift_type: upcoming,
            now,
        };
        match execute(store, &unit).await {
            Ok(Some(opened)) => {
                report.opened += 1;
                sinks
                    .activity
                    .append_activity(
                        opened.id,
                        actions::CLOCK_IN,
                        SYSTEM_ACTOR,
                        json!({ "operator_id": operator_id, "shift_type": upcoming.as_str() }),
                    )
                    .await;
                sinks.events.publish(EngineEvent::ShiftChanged(opened));
            }
            Ok(None) => {}
            Err(e) => {
                report.failed += 1;
                tracing::error!(
                    operator_id = %operator_id,
                    shift_type = %upcoming,
                    error = %e,
                    "Could not open next shift"
                );
            }
        }
    }

    tracing::info!(
        upcoming = %upcoming,
        examined = report.examined,
        rotated = report.rotated,
        opened = report.opened,
        failed = report.failed,
        "Shift rotation complete"
    );

    Ok(report)
}
