//! Operator shift lifecycle: clock-in/out, breaks, admin closure and the
//! scheduled rotation between the three daily windows.

pub mod machine;
pub mod rotation;
pub mod schedule;

pub use machine::{approve_shift, clock_in, clock_out, end_break, force_end, reject_shift, start_break};
pub use rotation::{run_shift_rotation, RotationReport};
pub use schedule::ShiftSchedule;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{ShiftStatus, ShiftType};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ShiftError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("operator {0} not found")]
    OperatorNotFound(Uuid),

    #[error("operator {0} is deactivated")]
    OperatorInactive(Uuid),

    #[error("shift {0} not found")]
    ShiftNotFound(Uuid),

    #[error("operator {0} has no active shift")]
    NoActiveShift(Uuid),

    #[error("operator {0} is already clocked in")]
    AlreadyClockedIn(Uuid),

    #[error("operator {operator_id} still holds a {shift_type} shift in state {status}")]
    OnOtherShift {
        operator_id: Uuid,
        shift_type: ShiftType,
        status: ShiftStatus,
    },

    #[error("cannot {action} a shift in state {status}")]
    InvalidState {
        action: &'static str,
        status: ShiftStatus,
    },

    #[error("shift {0} has no open break")]
    NoOpenBreak(Uuid),
}
