use chrono::{
    DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Offset, Timelike, Utc,
};

use crate::models::ShiftType;

/// A clock-in this close to the next window's start opens that window early.
pub const EARLY_CLOCK_IN_MINUTES: i64 = 30;

/// Fixed shift windows in local wall-clock time:
/// MORNING 08:00-15:00, AFTERNOON 15:00-21:00, NIGHT 21:00-08:00.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSchedule {
    offset: FixedOffset,
}

impl Default for ShiftSchedule {
    fn default() -> Self {
        Self::utc()
    }
}

impl ShiftSchedule {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn utc() -> Self {
        Self { offset: Utc.fix() }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn start_hour(shift_type: ShiftType) -> u32 {
        match shift_type {
            ShiftType::Morning => 8,
            ShiftType::Afternoon => 15,
            ShiftType::Night => 21,
        }
    }

    /// Standard length of a shift, which is also its window length.
    pub fn standard_minutes(shift_type: ShiftType) -> i64 {
        match shift_type {
            ShiftType::Morning => 420,
            ShiftType::Afternoon => 360,
            ShiftType::Night => 660,
        }
    }

    fn local(&self, at: DateTime<Utc>) -> NaiveDateTime {
        at.with_timezone(&self.offset).naive_local()
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        (local - Duration::seconds(i64::from(self.offset.local_minus_utc()))).and_utc()
    }

    fn at_hour(date: NaiveDate, hour: u32) -> NaiveDateTime {
        date.and_time(NaiveTime::MIN) + Duration::hours(i64::from(hour))
    }

    /// Shift type whose window contains `at`.
    pub fn shift_type_at(&self, at: DateTime<Utc>) -> ShiftType {
        match self.local(at).hour() {
            8..=14 => ShiftType::Morning,
            15..=20 => ShiftType::Afternoon,
            _ => ShiftType::Night,
        }
    }

    /// Shift type a fresh clock-in at `at` belongs to. Within
    /// [`EARLY_CLOCK_IN_MINUTES`] of a boundary this is the upcoming window,
    /// so 07:55 opens MORNING rather than the tail of NIGHT.
    pub fn clock_in_shift_type(&self, at: DateTime<Utc>) -> ShiftType {
        let next = self.next_boundary(at);
        if next - at <= Duration::minutes(EARLY_CLOCK_IN_MINUTES) {
            self.shift_type_at(next)
        } else {
            self.shift_type_at(at)
        }
    }

    /// Scheduled start of the `shift_type` window that `at` belongs to.
    ///
    /// MORNING and AFTERNOON anchor to the local date of `at`. NIGHT spans
    /// midnight: before 08:00 it anchors to the previous evening.
    pub fn window_start_for(&self, shift_type: ShiftType, at: DateTime<Utc>) -> DateTime<Utc> {
        let local = self.local(at);
        let mut date = local.date();
        if shift_type == ShiftType::Night && local.hour() < Self::start_hour(ShiftType::Morning) {
            date = date.pred_opt().unwrap_or(date);
        }
        self.to_utc(Self::at_hour(date, Self::start_hour(shift_type)))
    }

    pub fn window_end_for(&self, shift_type: ShiftType, at: DateTime<Utc>) -> DateTime<Utc> {
        self.window_start_for(shift_type, at) + Duration::minutes(Self::standard_minutes(shift_type))
    }

    /// Minutes past the scheduled start, zero when on time or early.
    pub fn late_minutes(&self, shift_type: ShiftType, clock_in: DateTime<Utc>) -> i64 {
        (clock_in - self.window_start_for(shift_type, clock_in))
            .num_minutes()
            .max(0)
    }

    pub fn overtime_minutes(shift_type: ShiftType, worked_minutes: i64) -> i64 {
        (worked_minutes - Self::standard_minutes(shift_type)).max(0)
    }

    /// Next local 08:00, 15:00 or 21:00 strictly after `after`.
    pub fn next_boundary(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = self.local(after).date();
        let tomorrow = today.succ_opt().unwrap_or(today);

        ShiftType::ALL
            .iter()
            .map(|t| Self::at_hour(today, Self::start_hour(*t)))
            .chain(std::iter::once(Self::at_hour(
                tomorrow,
                Self::start_hour(ShiftType::Morning),
            )))
            .map(|local| self.to_utc(local))
            .filter(|b| *b > after)
            .min()
            .unwrap_or(after + Duration::hours(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_shift_type_windows() {
        let s = ShiftSchedule::utc();
        assert_eq!(s.shift_type_at(utc("2024-06-03T08:00:00Z")), ShiftType::Morning);
        assert_eq!(s.shift_type_at(utc("2024-06-03T14:59:59Z")), ShiftType::Morning);
        assert_eq!(s.shift_type_at(utc("2024-06-03T15:00:00Z")), ShiftType::Afternoon);
        assert_eq!(s.shift_type_at(utc("2024-06-03T20:59:00Z")), ShiftType::Afternoon);
        assert_eq!(s.shift_type_at(utc("2024-06-03T21:00:00Z")), ShiftType::Night);
        assert_eq!(s.shift_type_at(utc("2024-06-03T07:59:00Z")), ShiftType::Night);
    }

    #[test]
    fn test_offset_shifts_windows() {
        // 07:30 UTC is 08:30 at UTC+1.
        let s = ShiftSchedule::new(FixedOffset::east_opt(3600).unwrap());
        let at = utc("2024-06-03T07:30:00Z");
        assert_eq!(s.shift_type_at(at), ShiftType::Morning);
        assert_eq!(s.late_minutes(ShiftType::Morning, at), 30);
    }

    #[test]
    fn test_lateness() {
        let s = ShiftSchedule::utc();
        assert_eq!(s.late_minutes(ShiftType::Morning, utc("2024-06-03T08:15:00Z")), 15);
        assert_eq!(s.late_minutes(ShiftType::Morning, utc("2024-06-03T07:55:00Z")), 0);
        assert_eq!(s.late_minutes(ShiftType::Afternoon, utc("2024-06-03T15:00:30Z")), 0);
    }

    #[test]
    fn test_night_window_spans_midnight() {
        let s = ShiftSchedule::utc();
        let after_midnight = utc("2024-06-04T02:00:00Z");
        assert_eq!(
            s.window_start_for(ShiftType::Night, after_midnight),
            utc("2024-06-03T21:00:00Z")
        );
        assert_eq!(
            s.window_end_for(ShiftType::Night, after_midnight),
            utc("2024-06-04T08:00:00Z")
        );
        assert_eq!(s.late_minutes(ShiftType::Night, after_midnight), 300);

        let evening = utc("2024-06-03T21:10:00Z");
        assert_eq!(s.window_end_for(ShiftType::Night, evening), utc("2024-06-04T08:00:00Z"));
    }

    #[test]
    fn test_early_clock_in_opens_upcoming_window() {
        let s = ShiftSchedule::utc();
        assert_eq!(s.clock_in_shift_type(utc("2024-06-03T07:55:00Z")), ShiftType::Morning);
        assert_eq!(s.clock_in_shift_type(utc("2024-06-03T07:29:00Z")), ShiftType::Night);
        assert_eq!(s.clock_in_shift_type(utc("2024-06-03T14:40:00Z")), ShiftType::Afternoon);
        assert_eq!(s.clock_in_shift_type(utc("2024-06-03T20:30:00Z")), ShiftType::Night);
        assert_eq!(s.clock_in_shift_type(utc("2024-06-03T10:00:00Z")), ShiftType::Morning);
        assert_eq!(s.late_minutes(ShiftType::Night, utc("2024-06-03T20:50:00Z")), 0);
    }

    #[test]
    fn test_overtime() {
        assert_eq!(ShiftSchedule::overtime_minutes(ShiftType::Morning, 500), 80);
        assert_eq!(ShiftSchedule::overtime_minutes(ShiftType::Afternoon, 300), 0);
        assert_eq!(ShiftSchedule::overtime_minutes(ShiftType::Night, 700), 40);
    }

    #[test]
    fn test_next_boundary() {
        let s = ShiftSchedule::utc();
        assert_eq!(s.next_boundary(utc("2024-06-03T09:00:00Z")), utc("2024-06-03T15:00:00Z"));
        assert_eq!(s.next_boundary(utc("2024-06-03T15:00:00Z")), utc("2024-06-03T21:00:00Z"));
        assert_eq!(s.next_boundary(utc("2024-06-03T22:00:00Z")), utc("2024-06-04T08:00:00Z"));
        assert_eq!(s.next_boundary(utc("2024-06-03T03:00:00Z")), utc("2024-06-03T08:00:00Z"));
    }
}
