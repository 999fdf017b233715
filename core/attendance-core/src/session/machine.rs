//! Per-actor session state machine.
//!
//! One instance per actor, owned by the engine. All four transitions are
//! synchronous and only touch the in-memory [`AttendanceStatus`].

use chrono::NaiveDateTime;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::SessionPolicy;
use crate::time_math::{break_hours_between, elapsed_hours_between};
use crate::types::AttendanceStatus;

use super::transition::{next_phase, InvalidTransition, SessionAction, SessionPhase};

/// Outcome of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub action: SessionAction,
    pub from: SessionPhase,
    pub to: SessionPhase,
    /// Previous day's status when this check-in started a new calendar day.
    pub rolled_over: Option<AttendanceStatus>,
}

#[derive(Debug, Clone)]
pub struct SessionStateMachine {
    actor_id: String,
    status: AttendanceStatus,
    policy: SessionPolicy,
}

impl SessionStateMachine {
    pub fn new(actor_id: &str, policy: SessionPolicy) -> Self {
        Self::with_status(actor_id, AttendanceStatus::default(), policy)
    }

    pub fn with_status(actor_id: &str, status: AttendanceStatus, policy: SessionPolicy) -> Self {
        SessionStateMachine {
            actor_id: actor_id.to_string(),
            status,
            policy,
        }
    }

    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }

    pub fn status(&self) -> &AttendanceStatus {
        &self.status
    }

    pub fn phase(&self) -> SessionPhase {
        self.status.phase()
    }

    /// Replaces local state with the remote service's authoritative copy.
    pub fn replace_status(&mut self, status: AttendanceStatus) {
        self.status = status;
    }

    pub fn apply(
        &mut self,
        action: SessionAction,
        now: NaiveDateTime,
    ) -> Result<Transition, InvalidTransition> {
        let transition = match action {
            SessionAction::CheckIn => self.check_in(now),
            SessionAction::BreakIn => self.break_in(now),
            SessionAction::BreakOut => self.break_out(now),
            SessionAction::CheckOut => self.check_out(now),
        }?;

        debug!(
            actor_id = %self.actor_id,
            action = action.as_str(),
            from = ?transition.from,
            to = ?transition.to,
            "Session transition applied"
        );
        Ok(transition)
    }

    /// Starts a session. Allowed once per calendar day; a check-in on a later
    /// day supersedes whatever the previous day left behind.
    pub fn check_in(&mut self, now: NaiveDateTime) -> Result<Transition, InvalidTransition> {
        let today = now.date();
        let from = self.phase();
        // Statuses adopted from the service may omit the check-in date.
        let new_day = self
            .status
            .last_check_in_date
            .or_else(|| self.status.check_in_time.map(|t| t.date()))
            .map(|last| last < today)
            .unwrap_or(false);
        let effective = if new_day {
            SessionPhase::NotCheckedIn
        } else {
            from
        };

        let to = next_phase(effective, SessionAction::CheckIn, &self.policy).map_err(|_| {
            InvalidTransition {
                from,
                action: SessionAction::CheckIn,
            }
        })?;

        let previous = std::mem::replace(
            &mut self.status,
            AttendanceStatus {
                is_checked_in: true,
                check_in_time: Some(now),
                last_check_in_date: Some(today),
                ..AttendanceStatus::default()
            },
        );

        Ok(Transition {
            action: SessionAction::CheckIn,
            from,
            to,
            rolled_over: new_day.then_some(previous),
        })
    }

    pub fn break_in(&mut self, now: NaiveDateTime) -> Result<Transition, InvalidTransition> {
        let from = self.phase();
        let to = next_phase(from, SessionAction::BreakIn, &self.policy)?;

        self.status.is_on_break = true;
        self.status.break_start_time = Some(now);
        self.status.break_end_time = None;

        Ok(Transition {
            action: SessionAction::BreakIn,
            from,
            to,
            rolled_over: None,
        })
    }

    pub fn break_out(&mut self, now: NaiveDateTime) -> Result<Transition, InvalidTransition> {
        let from = self.phase();
        let to = next_phase(from, SessionAction::BreakOut, &self.policy)?;

        self.close_break(now);

        Ok(Transition {
            action: SessionAction::BreakOut,
            from,
            to,
            rolled_over: None,
        })
    }

    /// Ends the session. An open break is closed at `now` and counted.
    ///
    /// `total_hours` is the check-in to check-out span minus accumulated breaks.
    pub fn check_out(&mut self, now: NaiveDateTime) -> Result<Transition, InvalidTransition> {
        let from = self.phase();
        let to = next_phase(from, SessionAction::CheckOut, &self.policy)?;

        if self.status.is_on_break {
            self.close_break(now);
        }

        let gross = self
            .status
            .check_in_time
            .map(|start| elapsed_hours_between(start, now))
            .unwrap_or(Decimal::ZERO);

        self.status.is_checked_in = false;
        self.status.check_out_time = Some(now);
        self.status.total_hours = (gross - self.status.break_time).max(Decimal::ZERO);

        Ok(Transition {
            action: SessionAction::CheckOut,
            from,
            to,
            rolled_over: None,
        })
    }

    fn close_break(&mut self, now: NaiveDateTime) {
        let spent = self
            .status
            .break_start_time
            .map(|start| break_hours_between(start, now))
            .unwrap_or(Decimal::ZERO);
        self.status.break_time += spent;
        self.status.is_on_break = false;
        self.status.break_end_time = Some(now);
    }
}
