//! Weekly and monthly attendance summaries.
//!
//! Summaries come from the first tier that yields data:
//!
//! 1. The remote summary endpoint, when it returns a well-formed summary for
//!    the actor and range.
//! 2. Day records: remote history (batch, then one call per day) merged over
//!    local records, folded into counts. Remote wins per day. Gaps are
//!    back-filled as absent once at least one day is known.
//! 3. An all-zero summary when no record could be retrieved.
//!
//! Offline callers pass no gateway and start at tier 2 with local records only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::gateway::RemoteGateway;
use crate::types::{AttendanceRecord, DateRange, DayStatus, OverallStatus, SummarySource, WeeklySummary};

const PRESENT_RATIO: Decimal = dec!(0.8);
const ABSENT_RATIO: Decimal = dec!(0.8);
const HALF_DAY_WEIGHT: Decimal = dec!(0.5);

#[derive(Debug, Clone, Default)]
pub struct AggregationEngine {
    roster: Vec<String>,
}

impl AggregationEngine {
    /// An empty roster accepts every actor.
    pub fn new(roster: Vec<String>) -> Self {
        AggregationEngine { roster }
    }

    pub fn knows_actor(&self, actor_id: &str) -> bool {
        self.roster.is_empty() || self.roster.iter().any(|id| id == actor_id)
    }

    pub async fn weekly_summary(
        &self,
        gateway: Option<&dyn RemoteGateway>,
        actor_id: &str,
        range: DateRange,
        local: &[AttendanceRecord],
    ) -> Result<WeeklySummary> {
        if !self.knows_actor(actor_id) {
            return Err(CoreError::UnknownActor(actor_id.to_string()));
        }
        Ok(summarize(gateway, actor_id, range, local).await)
    }

    /// Summarizes a calendar month by running each week through the tiers
    /// and merging the pieces.
    pub async fn monthly_summary(
        &self,
        gateway: Option<&dyn RemoteGateway>,
        actor_id: &str,
        year: i32,
        month: u32,
        local: &[AttendanceRecord],
    ) -> Result<WeeklySummary> {
        if !self.knows_actor(actor_id) {
            return Err(CoreError::UnknownActor(actor_id.to_string()));
        }
        let range = DateRange::month(year, month).ok_or(CoreError::InvalidMonth { year, month })?;

        let mut weeks = Vec::new();
        for week in range.weeks() {
            weeks.push(summarize(gateway, actor_id, week, local).await);
        }
        Ok(merge_summaries(actor_id, range, &weeks))
    }
}

async fn summarize(
    gateway: Option<&dyn RemoteGateway>,
    actor_id: &str,
    range: DateRange,
    local: &[AttendanceRecord],
) -> WeeklySummary {
    if let Some(gateway) = gateway {
        if let Some(summary) = remote_summary(gateway, actor_id, range).await {
            return summary;
        }
    }

    // Open local placeholders say nothing yet; the service's records are taken as sent.
    let mut merged: BTreeMap<NaiveDate, AttendanceRecord> = local
        .iter()
        .filter(|r| r.actor_id == actor_id && range.contains(r.date) && !r.is_placeholder())
        .map(|r| (r.date, r.clone()))
        .collect();

    if let Some(gateway) = gateway {
        for record in remote_records(gateway, actor_id, range).await {
            merged.insert(record.date, record);
        }
    }

    if merged.is_empty() {
        debug!(actor_id, range = %range, "No attendance records available; empty summary");
        return empty_summary(actor_id, range);
    }

    let records: Vec<AttendanceRecord> = merged.into_values().collect();
    fold_records(actor_id, range, &records)
}

async fn remote_summary(
    gateway: &dyn RemoteGateway,
    actor_id: &str,
    range: DateRange,
) -> Option<WeeklySummary> {
    let summaries = match gateway.get_weekly_summary(range).await {
        Ok(summaries) => summaries,
        Err(err) => {
            debug!(actor_id, range = %range, error = %err, "Remote summary unavailable");
            return None;
        }
    };

    let candidate = summaries
        .into_iter()
        .find(|s| s.actor_id == actor_id && s.range == range)?;

    if !is_well_formed(&candidate) {
        warn!(actor_id, range = %range, "Ignoring malformed remote summary");
        return None;
    }

    Some(WeeklySummary {
        source: SummarySource::Remote,
        ..candidate
    })
}

fn is_well_formed(summary: &WeeklySummary) -> bool {
    summary.recorded_days() <= summary.range.len_days()
        && summary.total_hours >= Decimal::ZERO
        && summary.total_break_time >= Decimal::ZERO
}

async fn remote_records(
    gateway: &dyn RemoteGateway,
    actor_id: &str,
    range: DateRange,
) -> Vec<AttendanceRecord> {
    let keep = |r: &AttendanceRecord| r.actor_id == actor_id && range.contains(r.date);

    match gateway.get_history(actor_id, range).await {
        Ok(records) => return records.into_iter().filter(keep).collect(),
        Err(err) => {
            debug!(actor_id, range = %range, error = %err, "History unavailable; fetching per day");
        }
    }

    let mut records = Vec::new();
    for date in range.days() {
        match gateway.get_day(actor_id, date).await {
            Ok(Some(record)) if keep(&record) => records.push(record),
            Ok(_) => {}
            Err(err) if err.is_transient() => {
                debug!(actor_id, date = %date, error = %err, "Service unreachable; stopping per-day fetch");
                break;
            }
            Err(err) => {
                warn!(actor_id, date = %date, error = %err, "Skipping unreadable remote day");
            }
        }
    }
    records
}

/// Folds day records into counts, back-filling unrecorded days as absent.
///
/// Hours and breaks only accumulate for days that were not absent.
pub fn fold_records(actor_id: &str, range: DateRange, records: &[AttendanceRecord]) -> WeeklySummary {
    let mut summary = empty_summary(actor_id, range);
    summary.source = SummarySource::Folded;

    for record in records {
        match record.status {
            DayStatus::Present | DayStatus::InProgress => summary.days_present += 1,
            DayStatus::Absent => summary.days_absent += 1,
            DayStatus::Late => summary.days_late += 1,
            DayStatus::HalfDay => summary.days_half_day += 1,
            DayStatus::WeeklyOff => summary.days_weekly_off += 1,
            DayStatus::Leave => summary.days_leave += 1,
        }
        if record.status != DayStatus::Absent {
            summary.total_hours += record.total_hours;
            summary.total_break_time += record.break_time;
        }
    }

    let total_days = range.len_days();
    let recorded = summary.recorded_days();
    if recorded > 0 && recorded < total_days {
        summary.days_absent += total_days - recorded;
    }

    summary.overall_status = overall_status(&summary);
    summary
}

/// All-zero summary. Reports `Mixed` rather than claiming absence.
pub fn empty_summary(actor_id: &str, range: DateRange) -> WeeklySummary {
    WeeklySummary {
        actor_id: actor_id.to_string(),
        range,
        days_present: 0,
        days_absent: 0,
        days_half_day: 0,
        days_late: 0,
        days_leave: 0,
        days_weekly_off: 0,
        total_hours: Decimal::ZERO,
        total_break_time: Decimal::ZERO,
        overall_status: OverallStatus::Mixed,
        source: SummarySource::Empty,
    }
}

/// Grades a summary against the working days of its range.
///
/// Weekly-off and leave days are excluded from the denominator.
pub fn overall_status(summary: &WeeklySummary) -> OverallStatus {
    let excused = summary.days_weekly_off + summary.days_leave;
    let working_days = summary.range.len_days().saturating_sub(excused);
    if working_days == 0 {
        return OverallStatus::Mixed;
    }

    let working = Decimal::from(working_days);
    let attended = Decimal::from(summary.days_present + summary.days_late)
        + HALF_DAY_WEIGHT * Decimal::from(summary.days_half_day);

    if attended / working >= PRESENT_RATIO {
        OverallStatus::Present
    } else if Decimal::from(summary.days_absent) / working >= ABSENT_RATIO {
        OverallStatus::Absent
    } else {
        OverallStatus::Mixed
    }
}

fn merge_summaries(actor_id: &str, range: DateRange, weeks: &[WeeklySummary]) -> WeeklySummary {
    let mut merged = empty_summary(actor_id, range);
    for week in weeks {
        merged.days_present += week.days_present;
        merged.days_absent += week.days_absent;
        merged.days_half_day += week.days_half_day;
        merged.days_late += week.days_late;
        merged.days_leave += week.days_leave;
        merged.days_weekly_off += week.days_weekly_off;
        merged.total_hours += week.total_hours;
        merged.total_break_time += week.total_break_time;
    }

    merged.source = if weeks.iter().all(|w| w.source == SummarySource::Empty) {
        SummarySource::Empty
    } else if weeks.iter().all(|w| w.source == SummarySource::Remote) {
        SummarySource::Remote
    } else {
        SummarySource::Folded
    };

    // Weeks without any record came back all-zero; fill them like any gap.
    let total_days = range.len_days();
    let recorded = merged.recorded_days();
    if recorded > 0 && recorded < total_days {
        merged.days_absent += total_days - recorded;
    }

    merged.overall_status = overall_status(&merged);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_utils::ScriptedGateway;
    use crate::gateway::GatewayError;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    // Monday 2026-03-02 through Sunday 2026-03-08
    fn week() -> DateRange {
        DateRange::week_of(date(2))
    }

    fn record(d: u32, status: DayStatus, hours: Decimal) -> AttendanceRecord {
        let mut record = AttendanceRecord::placeholder("emp-1", date(d));
        record.status = status;
        record.total_hours = hours;
        record.finalized = true;
        record
    }

    fn full_week() -> Vec<AttendanceRecord> {
        let mut records: Vec<_> = (2..=6).map(|d| record(d, DayStatus::Present, dec!(8))).collect();
        records.push(record(7, DayStatus::WeeklyOff, Decimal::ZERO));
        records.push(record(8, DayStatus::WeeklyOff, Decimal::ZERO));
        records
    }

    fn engine() -> AggregationEngine {
        AggregationEngine::new(vec![])
    }

    #[test]
    fn test_five_present_two_weekly_off_is_present() {
        let summary = fold_records("emp-1", week(), &full_week());
        assert_eq!(summary.days_present, 5);
        assert_eq!(summary.days_weekly_off, 2);
        assert_eq!(summary.days_absent, 0);
        assert_eq!(summary.total_hours, dec!(40));
        assert_eq!(summary.overall_status, OverallStatus::Present);
        assert_eq!(summary.source, SummarySource::Folded);
    }

    #[test]
    fn test_missing_days_back_fill_as_absent() {
        let records = vec![
            record(2, DayStatus::Present, dec!(8)),
            record(3, DayStatus::Present, dec!(8)),
        ];
        let summary = fold_records("emp-1", week(), &records);
        assert_eq!(summary.days_present, 2);
        assert_eq!(summary.days_absent, 5);
        assert_eq!(summary.recorded_days(), 7);
        assert_eq!(summary.overall_status, OverallStatus::Mixed);
    }

    #[test]
    fn test_hours_only_count_for_non_absent_days() {
        let records = vec![
            record(2, DayStatus::Present, dec!(8)),
            // Stray hours on an absent day are ignored
            record(3, DayStatus::Absent, dec!(2)),
            record(4, DayStatus::HalfDay, dec!(3.5)),
        ];
        let summary = fold_records("emp-1", week(), &records);
        assert_eq!(summary.total_hours, dec!(11.5));
    }

    #[test]
    fn test_mostly_absent_week_is_absent() {
        let records: Vec<_> = (2..=8).map(|d| record(d, DayStatus::Absent, Decimal::ZERO)).collect();
        let summary = fold_records("emp-1", week(), &records);
        assert_eq!(summary.overall_status, OverallStatus::Absent);
    }

    #[test]
    fn test_late_days_count_as_attendance() {
        let mut records = full_week();
        records[0].status = DayStatus::Late;
        records[1].status = DayStatus::Late;
        let summary = fold_records("emp-1", week(), &records);
        assert_eq!(summary.days_late, 2);
        assert_eq!(summary.days_present, 3);
        assert_eq!(summary.overall_status, OverallStatus::Present);
    }

    #[test]
    fn test_all_excused_week_is_mixed() {
        let records: Vec<_> = (2..=8).map(|d| record(d, DayStatus::Leave, Decimal::ZERO)).collect();
        let summary = fold_records("emp-1", week(), &records);
        assert_eq!(summary.days_leave, 7);
        assert_eq!(summary.overall_status, OverallStatus::Mixed);
    }

    #[tokio::test]
    async fn test_zero_records_yields_all_zero_summary() {
        let summary = engine()
            .weekly_summary(None, "emp-1", week(), &[])
            .await
            .unwrap();
        assert_eq!(summary.recorded_days(), 0);
        assert_eq!(summary.days_absent, 0);
        assert_eq!(summary.total_hours, Decimal::ZERO);
        assert_eq!(summary.overall_status, OverallStatus::Mixed);
        assert_eq!(summary.source, SummarySource::Empty);
    }

    #[tokio::test]
    async fn test_open_placeholder_is_not_a_recorded_day() {
        let today = AttendanceRecord::placeholder("emp-1", date(4));
        let summary = engine()
            .weekly_summary(None, "emp-1", week(), &[today.clone()])
            .await
            .unwrap();
        assert_eq!(summary.source, SummarySource::Empty);
        assert_eq!(summary.days_absent, 0);

        // Once the day is closed it counts
        let mut closed = today;
        closed.finalized = true;
        let summary = engine()
            .weekly_summary(None, "emp-1", week(), &[closed])
            .await
            .unwrap();
        assert_eq!(summary.days_absent, 7);
        assert_eq!(summary.overall_status, OverallStatus::Absent);
    }

    #[tokio::test]
    async fn test_unknown_actor_is_rejected() {
        let engine = AggregationEngine::new(vec!["emp-1".into()]);
        let err = engine
            .weekly_summary(None, "emp-9", week(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::UnknownActor(id) if id == "emp-9"));
    }

    #[tokio::test]
    async fn test_remote_summary_wins() {
        let gateway = ScriptedGateway::new(true);
        let mut remote = fold_records("emp-1", week(), &full_week());
        remote.total_hours = dec!(39.5);
        gateway.set_summaries(Ok(vec![remote]));

        let summary = engine()
            .weekly_summary(Some(&gateway), "emp-1", week(), &[])
            .await
            .unwrap();
        assert_eq!(summary.source, SummarySource::Remote);
        assert_eq!(summary.total_hours, dec!(39.5));
        assert!(!gateway.calls().iter().any(|c| c.starts_with("get_history")));
    }

    #[tokio::test]
    async fn test_malformed_remote_summary_falls_through() {
        let gateway = ScriptedGateway::new(true);
        let mut remote = fold_records("emp-1", week(), &full_week());
        remote.days_absent = 9;
        gateway.set_summaries(Ok(vec![remote]));
        gateway.set_history(Ok(full_week()));

        let summary = engine()
            .weekly_summary(Some(&gateway), "emp-1", week(), &[])
            .await
            .unwrap();
        assert_eq!(summary.source, SummarySource::Folded);
        assert_eq!(summary.days_absent, 0);
    }

    #[tokio::test]
    async fn test_history_failure_falls_back_to_per_day() {
        let gateway = ScriptedGateway::new(true);
        gateway.set_summaries(Err(GatewayError::Rejected {
            status: Some(404),
            reason: "no summary".into(),
        }));
        gateway.set_history(Err(GatewayError::Malformed("truncated".into())));
        gateway.add_day(record(2, DayStatus::Present, dec!(8)));

        let summary = engine()
            .weekly_summary(Some(&gateway), "emp-1", week(), &[])
            .await
            .unwrap();

        let day_calls = gateway
            .calls()
            .iter()
            .filter(|c| c.starts_with("get_day"))
            .count();
        assert_eq!(day_calls, 7);
        assert_eq!(summary.days_present, 1);
        assert_eq!(summary.days_absent, 6);
    }

    #[tokio::test]
    async fn test_remote_day_overrides_local_record() {
        let gateway = ScriptedGateway::new(true);
        gateway.set_history(Ok(vec![record(2, DayStatus::Late, dec!(7))]));
        let local = vec![
            record(2, DayStatus::Present, dec!(8)),
            record(3, DayStatus::Present, dec!(8)),
        ];

        let summary = engine()
            .weekly_summary(Some(&gateway), "emp-1", week(), &local)
            .await
            .unwrap();
        assert_eq!(summary.days_late, 1);
        assert_eq!(summary.days_present, 1);
        assert_eq!(summary.total_hours, dec!(15));
    }

    #[tokio::test]
    async fn test_offline_gateway_uses_local_records() {
        let gateway = ScriptedGateway::new(false);
        let summary = engine()
            .weekly_summary(Some(&gateway), "emp-1", week(), &full_week())
            .await
            .unwrap();
        assert_eq!(summary.source, SummarySource::Folded);
        assert_eq!(summary.days_present, 5);
        // One unreachable day call ends the per-day fallback
        let day_calls = gateway
            .calls()
            .iter()
            .filter(|c| c.starts_with("get_day"))
            .count();
        assert_eq!(day_calls, 1);
    }

    #[tokio::test]
    async fn test_monthly_summary_merges_weeks() {
        // March 2026: 22 weekdays, 9 weekend days
        let local: Vec<_> = DateRange::month(2026, 3)
            .unwrap()
            .days()
            .map(|d| {
                let mut r = AttendanceRecord::placeholder("emp-1", d);
                r.finalized = true;
                if chrono::Datelike::weekday(&d).number_from_monday() >= 6 {
                    r.status = DayStatus::WeeklyOff;
                } else {
                    r.status = DayStatus::Present;
                    r.total_hours = dec!(8);
                }
                r
            })
            .collect();

        let summary = engine()
            .monthly_summary(None, "emp-1", 2026, 3, &local)
            .await
            .unwrap();
        assert_eq!(summary.range.len_days(), 31);
        assert_eq!(summary.days_present, 22);
        assert_eq!(summary.days_weekly_off, 9);
        assert_eq!(summary.days_absent, 0);
        assert_eq!(summary.total_hours, dec!(176));
        assert_eq!(summary.overall_status, OverallStatus::Present);
    }

    #[tokio::test]
    async fn test_monthly_summary_rejects_invalid_month() {
        let err = engine()
            .monthly_summary(None, "emp-1", 2026, 13, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidMonth { month: 13, .. }));
    }
}
