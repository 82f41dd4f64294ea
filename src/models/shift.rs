use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// ShiftType
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftType {
    Morning,
    Afternoon,
    Night,
}

impl ShiftType {
    pub const ALL: [ShiftType; 3] = [ShiftType::Morning, ShiftType::Afternoon, ShiftType::Night];

    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftType::Morning => "MORNING",
            ShiftType::Afternoon => "AFTERNOON",
            ShiftType::Night => "NIGHT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "MORNING" => Some(ShiftType::Morning),
            "AFTERNOON" => Some(ShiftType::Afternoon),
            "NIGHT" => Some(ShiftType::Night),
            _ => None,
        }
    }
}

impl fmt::Display for ShiftType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ShiftStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftStatus {
    Active,
    OnBreak,
    PendingApproval,
    Approved,
    Rejected,
    Ended,
    ForceClosed,
}

impl ShiftStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftStatus::Active => "ACTIVE",
            ShiftStatus::OnBreak => "ON_BREAK",
            ShiftStatus::PendingApproval => "PENDING_APPROVAL",
            ShiftStatus::Approved => "APPROVED",
            ShiftStatus::Rejected => "REJECTED",
            ShiftStatus::Ended => "ENDED",
            ShiftStatus::ForceClosed => "FORCE_CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "ACTIVE" => Some(ShiftStatus::Active),
            "ON_BREAK" => Some(ShiftStatus::OnBreak),
            "PENDING_APPROVAL" => Some(ShiftStatus::PendingApproval),
            "APPROVED" => Some(ShiftStatus::Approved),
            "REJECTED" => Some(ShiftStatus::Rejected),
            "ENDED" => Some(ShiftStatus::Ended),
            "FORCE_CLOSED" => Some(ShiftStatus::ForceClosed),
            _ => None,
        }
    }

    /// ACTIVE or ON_BREAK: the shift is still running.
    pub fn is_open(&self) -> bool {
        matches!(self, ShiftStatus::Active | ShiftStatus::OnBreak)
    }

    /// Closed but waiting for an admin decision.
    pub fn awaits_review(&self) -> bool {
        matches!(self, ShiftStatus::PendingApproval | ShiftStatus::ForceClosed)
    }
}

impl fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ShiftEndType: how a shift was closed
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShiftEndType {
    /// Operator clocked out.
    Normal,
    /// Closed by the scheduled rotation.
    PendingAdminApproval,
    /// Clock-out failed and the shift was closed defensively.
    ForceClosedOnError,
    /// Closed by an admin.
    AdminForceClosed,
}

impl ShiftEndType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShiftEndType::Normal => "NORMAL",
            ShiftEndType::PendingAdminApproval => "PENDING_ADMIN_APPROVAL",
            ShiftEndType::ForceClosedOnError => "FORCE_CLOSED_ON_ERROR",
            ShiftEndType::AdminForceClosed => "ADMIN_FORCE_CLOSED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "NORMAL" => Some(ShiftEndType::Normal),
            "PENDING_ADMIN_APPROVAL" => Some(ShiftEndType::PendingAdminApproval),
            "FORCE_CLOSED_ON_ERROR" => Some(ShiftEndType::ForceClosedOnError),
            "ADMIN_FORCE_CLOSED" => Some(ShiftEndType::AdminForceClosed),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Breaks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftBreak {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
}

impl ShiftBreak {
    pub fn open(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            duration_minutes: 0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn close(&mut self, now: DateTime<Utc>) {
        self.end_time = Some(now);
        self.duration_minutes = (now - self.start_time).num_minutes().max(0);
    }

    /// Minutes spent on this break, counting an open break up to `now`.
    pub fn minutes_until(&self, now: DateTime<Utc>) -> i64 {
        match self.end_time {
            Some(_) => self.duration_minutes,
            None => (now - self.start_time).num_minutes().max(0),
        }
    }
}

// ---------------------------------------------------------------------------
// Shift
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shift {
    pub id: Uuid,
    pub operator_id: Uuid,
    pub shift_type: ShiftType,
    pub status: ShiftStatus,
    pub is_clocked_in: bool,
    pub clock_in_time: Option<DateTime<Utc>>,
    pub clock_out_time: Option<DateTime<Utc>>,
    pub breaks: Vec<ShiftBreak>,
    /// Minutes worked, break time excluded.
    pub total_work_duration: i64,
    pub overtime_minutes: i64,
    pub is_late_clock_in: bool,
    pub late_minutes: i64,
    pub shift_end_type: Option<ShiftEndType>,
    pub admin_id: Option<Uuid>,
    pub admin_notes: Option<String>,
    pub approved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    pub fn new(operator_id: Uuid, shift_type: ShiftType, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            operator_id,
            shift_type,
            status: ShiftStatus::Active,
            is_clocked_in: false,
            clock_in_time: None,
            clock_out_time: None,
            breaks: Vec::new(),
            total_work_duration: 0,
            overtime_minutes: 0,
            is_late_clock_in: false,
            late_minutes: 0,
            shift_end_type: None,
            admin_id: None,
            admin_notes: None,
            approved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn open_break_mut(&mut self) -> Option<&mut ShiftBreak> {
        self.breaks.last_mut().filter(|b| b.is_open())
    }

    pub fn has_open_break(&self) -> bool {
        self.breaks.last().is_some_and(ShiftBreak::is_open)
    }

    /// Close a dangling break, if any. Returns true when one was closed.
    pub fn close_open_break(&mut self, now: DateTime<Utc>) -> bool {
        match self.open_break_mut() {
            Some(b) => {
                b.close(now);
                true
            }
            None => false,
        }
    }

    /// Break minutes for breaks started at or after `since`.
    pub fn break_minutes_since(&self, since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
        self.breaks
            .iter()
            .filter(|b| b.start_time >= since)
            .map(|b| b.minutes_until(now))
            .sum()
    }

    /// Minutes worked since the latest clock-in, break time excluded, floored at zero.
    pub fn minutes_worked_since_clock_in(&self, now: DateTime<Utc>) -> i64 {
        let Some(clock_in) = self.clock_in_time else {
            return 0;
        };
        let elapsed = (now - clock_in).num_minutes();
        (elapsed - self.break_minutes_since(clock_in, now)).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_worked_minutes_excludes_breaks() {
        let start = Utc::now();
        let mut shift = Shift::new(Uuid::new_v4(), ShiftType::Morning, start);
        shift.clock_in_time = Some(start);

        shift.breaks.push(ShiftBreak::open(start + Duration::minutes(60)));
        shift.close_open_break(start + Duration::minutes(90));

        let now = start + Duration::minutes(240);
        assert_eq!(shift.break_minutes_since(start, now), 30);
        assert_eq!(shift.minutes_worked_since_clock_in(now), 210);
    }

    #[test]
    fn test_open_break_counts_until_now() {
        let start = Utc::now();
        let mut shift = Shift::new(Uuid::new_v4(), ShiftType::Night, start);
        shift.clock_in_time = Some(start);
        shift.breaks.push(ShiftBreak::open(start + Duration::minutes(10)));

        assert!(shift.has_open_break());
        let now = start + Duration::minutes(25);
        assert_eq!(shift.minutes_worked_since_clock_in(now), 10);
    }

    #[test]
    fn test_worked_minutes_floor_at_zero() {
        let start = Utc::now();
        let mut shift = Shift::new(Uuid::new_v4(), ShiftType::Afternoon, start);
        shift.clock_in_time = Some(start);
        assert_eq!(shift.minutes_worked_since_clock_in(start - Duration::minutes(5)), 0);
    }

    #[test]
    fn test_status_helpers() {
        assert!(ShiftStatus::OnBreak.is_open());
        assert!(!ShiftStatus::PendingApproval.is_open());
        assert!(ShiftStatus::ForceClosed.awaits_review());
        assert_eq!(ShiftStatus::parse("on_break"), Some(ShiftStatus::OnBreak));
    }
}
