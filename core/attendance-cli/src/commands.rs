//! Subcommand handlers. Each prints a short human-readable report to stdout.

use attendance_core::{
    ActionKind, ApprovalOutcome, AttendanceEngine, AttendanceStatus, CoreError, DateRange,
    DrainOutcome, DrainReport, DrainStop, PendingAction, SessionAction, SessionOutcome,
    WeeklySummary,
};
use chrono::{Local, NaiveDate};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid month '{0}' (expected YYYY-MM)")]
    InvalidMonth(String),

    #[error("Could not start HTTP client: {0}")]
    Gateway(#[from] attendance_core::GatewayError),
}

pub type Result<T> = std::result::Result<T, CliError>;

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

pub async fn status(engine: &AttendanceEngine, actor_id: &str) -> Result<()> {
    let status = engine.get_current_status(actor_id).await?;
    println!("{}", format_status(actor_id, &status));
    Ok(())
}

pub async fn session(
    engine: &AttendanceEngine,
    actor_id: &str,
    action: SessionAction,
) -> Result<()> {
    let outcome = engine.perform_session_action(actor_id, action).await?;
    println!("{}", format_status(actor_id, outcome.status()));
    if let SessionOutcome::Optimistic { reason, .. } = &outcome {
        println!("(saved locally; not confirmed by the service: {})", reason);
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Approvals
// ─────────────────────────────────────────────────────────────────────────────

pub async fn decide(engine: &AttendanceEngine, leave_id: &str, kind: ActionKind) -> Result<()> {
    match engine.queue_or_send_approval(leave_id, kind).await? {
        ApprovalOutcome::Sent { leave_id, status } => {
            println!("{}: {}", leave_id, status);
        }
        ApprovalOutcome::Queued(action) => {
            println!(
                "{}: queued ({}, will be sent when the service is reachable)",
                leave_id, action.id
            );
        }
    }
    Ok(())
}

pub async fn queue(engine: &AttendanceEngine) -> Result<()> {
    let actions = engine.pending_actions().await;
    if actions.is_empty() {
        println!("No pending decisions.");
        return Ok(());
    }
    for action in &actions {
        println!("{}", format_action(action));
    }
    Ok(())
}

pub async fn sync(engine: &AttendanceEngine) -> Result<()> {
    let outcome = engine.sync_now().await?;
    println!("{}", format_drain(&outcome));
    Ok(())
}

pub async fn retry(engine: &AttendanceEngine, id: &str) -> Result<()> {
    let action = engine.retry_action(id).await?;
    println!("{}", format_action(&action));
    let outcome = engine.sync_now().await?;
    println!("{}", format_drain(&outcome));
    Ok(())
}

pub async fn dismiss(engine: &AttendanceEngine, id: &str) -> Result<()> {
    let action = engine.dismiss_action(id).await?;
    println!("Dismissed {} {} for {}", action.kind, action.id, action.target_id);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Summaries
// ─────────────────────────────────────────────────────────────────────────────

pub async fn summary(
    engine: &AttendanceEngine,
    actor_id: &str,
    week_of: Option<NaiveDate>,
    month: Option<&str>,
) -> Result<()> {
    let summary = match month {
        Some(raw) => {
            let (year, month) =
                parse_month(raw).ok_or_else(|| CliError::InvalidMonth(raw.to_string()))?;
            engine.get_monthly_summary(actor_id, year, month).await?
        }
        None => {
            let date = week_of.unwrap_or_else(|| Local::now().date_naive());
            engine
                .get_weekly_summary(actor_id, DateRange::week_of(date))
                .await?
        }
    };
    println!("{}", format_summary(&summary));
    Ok(())
}

/// Parses `YYYY-MM`.
fn parse_month(raw: &str) -> Option<(i32, u32)> {
    let (year, month) = raw.trim().split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    DateRange::month(year, month).map(|_| (year, month))
}

// ─────────────────────────────────────────────────────────────────────────────
// Formatting
// ─────────────────────────────────────────────────────────────────────────────

fn format_status(actor_id: &str, status: &AttendanceStatus) -> String {
    let mut line = format!("{}: {}", actor_id, status.phase());
    if let Some(check_in) = status.check_in_time {
        line.push_str(&format!(", in at {}", check_in.format("%Y-%m-%d %H:%M")));
    }
    if let Some(check_out) = status.check_out_time {
        line.push_str(&format!(", out at {}", check_out.format("%Y-%m-%d %H:%M")));
    }
    line.push_str(&format!(
        " ({}h worked, {}h break)",
        status.total_hours, status.break_time
    ));
    line
}

fn format_action(action: &PendingAction) -> String {
    let mut line = format!(
        "{} {} {} by {} [{}]",
        action.id,
        action.kind,
        action.target_id,
        action.actor_name,
        if action.needs_attention() {
            "needs attention"
        } else {
            "pending"
        }
    );
    if action.attempts > 0 {
        line.push_str(&format!(", {} attempt(s)", action.attempts));
    }
    if let Some(error) = &action.last_error {
        line.push_str(&format!(", last error: {}", error));
    }
    line
}

fn format_drain(outcome: &DrainOutcome) -> String {
    match outcome {
        DrainOutcome::Offline => "Offline; nothing sent.".to_string(),
        DrainOutcome::AlreadyRunning => "A sync is already in progress.".to_string(),
        DrainOutcome::Completed(report) => format_report(report),
    }
}

fn format_report(report: &DrainReport) -> String {
    let mut line = format!(
        "Sent {}, already applied {}, needs attention {}, remaining {}",
        report.sent.len(),
        report.already_applied.len(),
        report.parked.len(),
        report.remaining
    );
    match &report.stopped {
        Some(DrainStop::Unreachable) => line.push_str(" (service unreachable)"),
        Some(DrainStop::Refused) => line.push_str(" (refused; will retry)"),
        Some(DrainStop::BackingOff(at)) => {
            line.push_str(&format!(" (next retry after {})", at.format("%H:%M:%S UTC")))
        }
        None => {}
    }
    line
}

fn format_summary(summary: &WeeklySummary) -> String {
    format!(
        "{} {}: present {}, late {}, half day {}, absent {}, leave {}, off {}; {}h worked, {}h break; overall {:?} ({:?})",
        summary.actor_id,
        summary.range,
        summary.days_present,
        summary.days_late,
        summary.days_half_day,
        summary.days_absent,
        summary.days_leave,
        summary.days_weekly_off,
        summary.total_hours,
        summary.total_break_time,
        summary.overall_status,
        summary.source,
    )
}
