//! Day status classification.
//! Rules apply in order: absent, in progress, late, half day, present.

use chrono::NaiveDate;

use crate::config::ShiftPolicy;
use crate::types::{AttendanceRecord, AttendanceStatus, DayStatus};

pub fn determine_status(record: &AttendanceRecord, shift: &ShiftPolicy) -> DayStatus {
    let check_in = match record.check_in_time {
        Some(time) => time,
        // Remote-assigned off days carry no check-in and keep their category.
        None if record.status.is_excused() => return record.status,
        None => return DayStatus::Absent,
    };

    if !record.finalized && record.check_out_time.is_none() {
        return DayStatus::InProgress;
    }

    if shift.is_late(record.date, check_in) {
        DayStatus::Late
    } else if record.total_hours < shift.half_day_hours {
        DayStatus::HalfDay
    } else {
        DayStatus::Present
    }
}

/// Builds the day record mirroring `status`, classified under `shift`.
pub fn record_for_day(
    actor_id: &str,
    date: NaiveDate,
    status: &AttendanceStatus,
    finalized: bool,
    shift: &ShiftPolicy,
) -> AttendanceRecord {
    let mut record = AttendanceRecord::placeholder(actor_id, date);
    record.absorb_status(status);
    record.finalized = finalized;
    record.status = determine_status(&record, shift);
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDateTime, NaiveTime};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn at(h: u32, m: u32) -> NaiveDateTime {
        day().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
    }

    fn finished(check_in: NaiveDateTime, hours: Decimal) -> AttendanceRecord {
        let mut record = AttendanceRecord::placeholder("emp-1", day());
        record.check_in_time = Some(check_in);
        record.check_out_time = Some(at(18, 0));
        record.total_hours = hours;
        record.finalized = true;
        record
    }

    #[test]
    fn test_no_check_in_is_absent() {
        let record = AttendanceRecord::placeholder("emp-1", day());
        assert_eq!(
            determine_status(&record, &ShiftPolicy::default()),
            DayStatus::Absent
        );
    }

    #[test]
    fn test_weekly_off_without_check_in_is_kept() {
        let mut record = AttendanceRecord::placeholder("emp-1", day());
        record.status = DayStatus::WeeklyOff;
        assert_eq!(
            determine_status(&record, &ShiftPolicy::default()),
            DayStatus::WeeklyOff
        );
    }

    #[test]
    fn test_on_time_full_day_is_present() {
        let record = finished(at(8, 45), dec!(8));
        assert_eq!(
            determine_status(&record, &ShiftPolicy::default()),
            DayStatus::Present
        );
    }

    #[test]
    fn test_check_in_within_grace_is_not_late() {
        let record = finished(at(9, 15), dec!(8));
        assert_eq!(
            determine_status(&record, &ShiftPolicy::default()),
            DayStatus::Present
        );
    }

    #[test]
    fn test_check_in_after_grace_is_late() {
        let record = finished(at(9, 16), dec!(8));
        assert_eq!(
            determine_status(&record, &ShiftPolicy::default()),
            DayStatus::Late
        );
    }

    #[test]
    fn test_short_day_is_half_day() {
        let record = finished(at(9, 0), dec!(3.99));
        assert_eq!(
            determine_status(&record, &ShiftPolicy::default()),
            DayStatus::HalfDay
        );
    }

    #[test]
    fn test_threshold_comes_from_policy() {
        let shift = ShiftPolicy {
            shift_start: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            grace_minutes: 0,
            half_day_hours: dec!(5),
        };
        assert_eq!(
            determine_status(&finished(at(9, 59), dec!(4.5)), &shift),
            DayStatus::HalfDay
        );
        assert_eq!(
            determine_status(&finished(at(10, 1), dec!(8)), &shift),
            DayStatus::Late
        );
    }

    #[test]
    fn test_night_shift_punctual_check_in_is_not_late() {
        let shift = ShiftPolicy {
            shift_start: NaiveTime::from_hms_opt(23, 50, 0).unwrap(),
            grace_minutes: 15,
            half_day_hours: dec!(4),
        };
        let mut record = finished(at(23, 52), dec!(8));
        record.check_out_time = Some(at(23, 52) + chrono::Duration::hours(8));
        assert_eq!(determine_status(&record, &shift), DayStatus::Present);

        let mut record = finished(at(23, 59), dec!(8));
        record.check_in_time = Some(at(23, 59) + chrono::Duration::minutes(30));
        assert_eq!(determine_status(&record, &shift), DayStatus::Late);
    }

    #[test]
    fn test_open_session_is_in_progress() {
        let status = AttendanceStatus {
            is_checked_in: true,
            check_in_time: Some(at(9, 0)),
            last_check_in_date: Some(day()),
            ..AttendanceStatus::default()
        };
        let record = record_for_day("emp-1", day(), &status, false, &ShiftPolicy::default());
        assert_eq!(record.status, DayStatus::InProgress);

        let finalized = record_for_day("emp-1", day(), &status, true, &ShiftPolicy::default());
        assert_eq!(finalized.status, DayStatus::HalfDay);
    }
}
