//! Core types shared by the session machine, aggregation and sync layers.
//!
//! Statuses are closed enums; every classification or rendering site matches
//! them exhaustively so a new variant fails to compile until handled.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::session::SessionPhase;

// ═══════════════════════════════════════════════════════════════════════════════
// Session Status
// ═══════════════════════════════════════════════════════════════════════════════

/// Live attendance state for one actor.
///
/// Invariants: `is_on_break ⇒ is_checked_in`, and a set `check_out_time`
/// implies `is_checked_in == false`. Only the session transitions mutate it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct AttendanceStatus {
    pub is_checked_in: bool,
    pub is_on_break: bool,
    #[serde(default)]
    pub check_in_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub check_out_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub break_start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub break_end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub total_hours: Decimal,
    #[serde(default)]
    pub break_time: Decimal,
    #[serde(default)]
    pub last_check_in_date: Option<NaiveDate>,
}

impl AttendanceStatus {
    pub fn phase(&self) -> SessionPhase {
        if self.is_on_break {
            SessionPhase::OnBreak
        } else if self.is_checked_in {
            SessionPhase::CheckedIn
        } else if self.check_out_time.is_some() {
            SessionPhase::CheckedOut
        } else {
            SessionPhase::NotCheckedIn
        }
    }

    /// Returns true when both structural invariants hold.
    pub fn is_consistent(&self) -> bool {
        let break_ok = !self.is_on_break || self.is_checked_in;
        let checkout_ok = self.check_out_time.is_none() || !self.is_checked_in;
        let totals_ok = self.total_hours >= Decimal::ZERO && self.break_time >= Decimal::ZERO;
        break_ok && checkout_ok && totals_ok
    }

    /// Elapsed span from check-in to check-out, before breaks are deducted.
    pub fn gross_hours(&self) -> Decimal {
        match (self.check_in_time, self.check_out_time) {
            (Some(start), Some(end)) => crate::time_math::elapsed_hours_between(start, end),
            _ => Decimal::ZERO,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Day Records
// ═══════════════════════════════════════════════════════════════════════════════

/// Classification of a single attendance day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayStatus {
    Present,
    Absent,
    Late,
    HalfDay,
    WeeklyOff,
    Leave,
    InProgress,
}

/// Visual tone for a status badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeTone {
    Positive,
    Warning,
    Negative,
    Neutral,
    Active,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub label: &'static str,
    pub tone: BadgeTone,
}

impl DayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DayStatus::Present => "present",
            DayStatus::Absent => "absent",
            DayStatus::Late => "late",
            DayStatus::HalfDay => "half_day",
            DayStatus::WeeklyOff => "weekly_off",
            DayStatus::Leave => "leave",
            DayStatus::InProgress => "in_progress",
        }
    }

    pub fn badge(&self) -> Badge {
        let (label, tone) = match self {
            DayStatus::Present => ("Present", BadgeTone::Positive),
            DayStatus::Absent => ("Absent", BadgeTone::Negative),
            DayStatus::Late => ("Late", BadgeTone::Warning),
            DayStatus::HalfDay => ("Half Day", BadgeTone::Warning),
            DayStatus::WeeklyOff => ("Weekly Off", BadgeTone::Neutral),
            DayStatus::Leave => ("On Leave", BadgeTone::Neutral),
            DayStatus::InProgress => ("In Progress", BadgeTone::Active),
        };
        Badge { label, tone }
    }

    /// Days on which the actor was not expected to work.
    pub fn is_excused(&self) -> bool {
        matches!(self, DayStatus::WeeklyOff | DayStatus::Leave)
    }
}

impl fmt::Display for DayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One actor's attendance for one calendar day.
///
/// Starts as an `Absent` placeholder, follows the live session during the day
/// and becomes immutable once `finalized` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub actor_id: String,
    pub date: NaiveDate,
    pub status: DayStatus,
    #[serde(default)]
    pub check_in_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub check_out_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub break_start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub break_end_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub total_hours: Decimal,
    #[serde(default)]
    pub break_time: Decimal,
    #[serde(default)]
    pub finalized: bool,
}

impl AttendanceRecord {
    pub fn placeholder(actor_id: &str, date: NaiveDate) -> Self {
        AttendanceRecord {
            actor_id: actor_id.to_string(),
            date,
            status: DayStatus::Absent,
            check_in_time: None,
            check_out_time: None,
            break_start_time: None,
            break_end_time: None,
            total_hours: Decimal::ZERO,
            break_time: Decimal::ZERO,
            finalized: false,
        }
    }

    /// An open day nobody has checked in on yet. Carries no attendance
    /// information until it is finalized.
    pub fn is_placeholder(&self) -> bool {
        !self.finalized && self.check_in_time.is_none() && self.status == DayStatus::Absent
    }

    /// Copies the session fields of `status` onto this record.
    pub fn absorb_status(&mut self, status: &AttendanceStatus) {
        self.check_in_time = status.check_in_time;
        self.check_out_time = status.check_out_time;
        self.break_start_time = status.break_start_time;
        self.break_end_time = status.break_end_time;
        self.total_hours = status.total_hours;
        self.break_time = status.break_time;
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Date Ranges & Summaries
// ═══════════════════════════════════════════════════════════════════════════════

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, swapping the bounds when given out of order.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if end < start {
            DateRange {
                start: end,
                end: start,
            }
        } else {
            DateRange { start, end }
        }
    }

    /// Monday-to-Sunday week containing `date`.
    pub fn week_of(date: NaiveDate) -> Self {
        let offset = date.weekday().num_days_from_monday() as i64;
        let start = date - Duration::days(offset);
        DateRange {
            start,
            end: start + Duration::days(6),
        }
    }

    /// The whole calendar month, or `None` for an invalid year/month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(DateRange {
            start,
            end: next - Duration::days(1),
        })
    }

    pub fn len_days(&self) -> u32 {
        ((self.end - self.start).num_days() + 1) as u32
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.len_days() as i64).map(move |offset| start + Duration::days(offset))
    }

    /// Splits the range at week boundaries (weeks start on Monday).
    pub fn weeks(&self) -> Vec<DateRange> {
        let mut chunks = Vec::new();
        let mut cursor = self.start;
        while cursor <= self.end {
            let week = DateRange::week_of(cursor);
            let end = week.end.min(self.end);
            chunks.push(DateRange { start: cursor, end });
            cursor = end + Duration::days(1);
        }
        chunks
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Present,
    Absent,
    Mixed,
}

/// Which aggregation tier produced a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummarySource {
    /// Taken verbatim from the remote summary endpoint.
    Remote,
    /// Folded from day records, with gaps back-filled as absent.
    Folded,
    /// No records could be retrieved; counts are all zero.
    Empty,
}

/// Per-actor attendance counts over a date range.
///
/// Named for its usual week-long range; monthly summaries reuse the shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklySummary {
    pub actor_id: String,
    pub range: DateRange,
    pub days_present: u32,
    pub days_absent: u32,
    pub days_half_day: u32,
    pub days_late: u32,
    pub days_leave: u32,
    pub days_weekly_off: u32,
    pub total_hours: Decimal,
    pub total_break_time: Decimal,
    pub overall_status: OverallStatus,
    pub source: SummarySource,
}

impl WeeklySummary {
    pub fn recorded_days(&self) -> u32 {
        self.days_present
            + self.days_absent
            + self.days_half_day
            + self.days_late
            + self.days_leave
            + self.days_weekly_off
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Leave Approvals
// ═══════════════════════════════════════════════════════════════════════════════

/// Leave request lifecycle: `pending → {approved, rejected}`, `pending → cancelled`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl LeaveStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }

    pub fn can_transition_to(&self, next: LeaveStatus) -> bool {
        matches!(
            (self, next),
            (
                LeaveStatus::Pending,
                LeaveStatus::Approved | LeaveStatus::Rejected | LeaveStatus::Cancelled
            )
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
            LeaveStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reviewer's decision on a leave request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Approve,
    Reject,
}

impl ActionKind {
    /// Leave status this decision drives the request to.
    pub fn target_status(&self) -> LeaveStatus {
        match self {
            ActionKind::Approve => LeaveStatus::Approved,
            ActionKind::Reject => LeaveStatus::Rejected,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Approve => f.write_str("approve"),
            ActionKind::Reject => f.write_str("reject"),
        }
    }
}

/// Who performed an action; sent along with leave decisions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorMeta {
    pub actor_id: String,
    pub actor_name: String,
}

impl ActorMeta {
    pub fn new(actor_id: impl Into<String>, actor_name: impl Into<String>) -> Self {
        ActorMeta {
            actor_id: actor_id.into(),
            actor_name: actor_name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PendingState {
    #[default]
    Pending,
    /// Retry bound exhausted or permanently refused; waits for the user.
    NeedsAttention,
}

/// An approve/reject decision that could not reach the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAction {
    pub id: String,
    pub kind: ActionKind,
    pub target_id: String,
    pub actor_id: String,
    pub actor_name: String,
    pub enqueued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default)]
    pub next_attempt_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub state: PendingState,
}

impl PendingAction {
    pub fn new(kind: ActionKind, target_id: &str, actor: &ActorMeta, now: DateTime<Utc>) -> Self {
        PendingAction {
            id: ulid::Ulid::new().to_string(),
            kind,
            target_id: target_id.to_string(),
            actor_id: actor.actor_id.clone(),
            actor_name: actor.actor_name.clone(),
            enqueued_at: now,
            attempts: 0,
            last_error: None,
            next_attempt_at: None,
            state: PendingState::Pending,
        }
    }

    pub fn actor_meta(&self) -> ActorMeta {
        ActorMeta::new(self.actor_id.clone(), self.actor_name.clone())
    }

    pub fn needs_attention(&self) -> bool {
        self.state == PendingState::NeedsAttention
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(d: NaiveDate, h: u32, min: u32) -> NaiveDateTime {
        d.and_time(NaiveTime::from_hms_opt(h, min, 0).unwrap())
    }

    #[test]
    fn test_default_status_is_not_checked_in() {
        let status = AttendanceStatus::default();
        assert_eq!(status.phase(), SessionPhase::NotCheckedIn);
        assert!(status.is_consistent());
    }

    #[test]
    fn test_break_without_check_in_is_inconsistent() {
        let status = AttendanceStatus {
            is_on_break: true,
            ..AttendanceStatus::default()
        };
        assert!(!status.is_consistent());
    }

    #[test]
    fn test_gross_hours_ignores_breaks() {
        let day = date(2026, 3, 2);
        let status = AttendanceStatus {
            check_in_time: Some(at(day, 9, 0)),
            check_out_time: Some(at(day, 17, 30)),
            total_hours: dec!(8.00),
            break_time: dec!(0.50),
            ..AttendanceStatus::default()
        };
        assert_eq!(status.gross_hours(), dec!(8.50));
    }

    #[test]
    fn test_week_of_starts_on_monday() {
        // 2026-03-05 is a Thursday
        let week = DateRange::week_of(date(2026, 3, 5));
        assert_eq!(week.start, date(2026, 3, 2));
        assert_eq!(week.end, date(2026, 3, 8));
        assert_eq!(week.len_days(), 7);
    }

    #[test]
    fn test_range_swaps_reversed_bounds() {
        let range = DateRange::new(date(2026, 3, 8), date(2026, 3, 2));
        assert_eq!(range.start, date(2026, 3, 2));
        assert_eq!(range.days().count(), 7);
    }

    #[test]
    fn test_month_handles_december_and_leap_years() {
        let december = DateRange::month(2026, 12).unwrap();
        assert_eq!(december.end, date(2026, 12, 31));
        let february = DateRange::month(2028, 2).unwrap();
        assert_eq!(february.len_days(), 29);
        assert!(DateRange::month(2026, 13).is_none());
    }

    #[test]
    fn test_weeks_split_month_on_mondays() {
        let march = DateRange::month(2026, 3).unwrap();
        let weeks = march.weeks();
        // March 2026 starts on a Sunday
        assert_eq!(weeks[0], DateRange::new(date(2026, 3, 1), date(2026, 3, 1)));
        assert_eq!(weeks[1].start, date(2026, 3, 2));
        let total: u32 = weeks.iter().map(|w| w.len_days()).sum();
        assert_eq!(total, 31);
    }

    #[test]
    fn test_leave_status_transitions() {
        assert!(LeaveStatus::Pending.can_transition_to(LeaveStatus::Approved));
        assert!(LeaveStatus::Pending.can_transition_to(LeaveStatus::Cancelled));
        assert!(!LeaveStatus::Approved.can_transition_to(LeaveStatus::Rejected));
        assert!(!LeaveStatus::Pending.can_transition_to(LeaveStatus::Pending));
        assert!(LeaveStatus::Cancelled.is_terminal());
    }

    #[test]
    fn test_badges_cover_every_status() {
        assert_eq!(DayStatus::HalfDay.badge().label, "Half Day");
        assert_eq!(DayStatus::Absent.badge().tone, BadgeTone::Negative);
        assert_eq!(DayStatus::InProgress.badge().tone, BadgeTone::Active);
    }

    #[test]
    fn test_pending_action_ids_are_unique() {
        let actor = ActorMeta::new("mgr-1", "Dana");
        let now = Utc::now();
        let a = PendingAction::new(ActionKind::Approve, "leave-1", &actor, now);
        let b = PendingAction::new(ActionKind::Approve, "leave-1", &actor, now);
        assert_ne!(a.id, b.id);
        assert_eq!(a.kind.target_status(), LeaveStatus::Approved);
    }
}
