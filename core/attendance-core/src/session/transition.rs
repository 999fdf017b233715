//! Guard table for session transitions.
//! Anything not listed is an invalid transition; callers never retry those.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::SessionPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    NotCheckedIn,
    CheckedIn,
    OnBreak,
    CheckedOut,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::NotCheckedIn => "not checked in",
            SessionPhase::CheckedIn => "checked in",
            SessionPhase::OnBreak => "on break",
            SessionPhase::CheckedOut => "checked out",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionAction {
    CheckIn,
    BreakIn,
    BreakOut,
    CheckOut,
}

impl SessionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionAction::CheckIn => "check_in",
            SessionAction::BreakIn => "break_in",
            SessionAction::BreakOut => "break_out",
            SessionAction::CheckOut => "check_out",
        }
    }
}

impl fmt::Display for SessionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionAction::CheckIn => "check in",
            SessionAction::BreakIn => "start a break",
            SessionAction::BreakOut => "end a break",
            SessionAction::CheckOut => "check out",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Invalid transition: cannot {action} while {from}")]
pub struct InvalidTransition {
    pub from: SessionPhase,
    pub action: SessionAction,
}

/// Returns the phase reached by applying `action` in `current`.
///
/// Day rollover is not handled here: the machine resets a stale session to
/// `NotCheckedIn` before asking for a check-in.
pub fn next_phase(
    current: SessionPhase,
    action: SessionAction,
    policy: &SessionPolicy,
) -> Result<SessionPhase, InvalidTransition> {
    let next = match (current, action) {
        (SessionPhase::NotCheckedIn, SessionAction::CheckIn) => Some(SessionPhase::CheckedIn),
        (SessionPhase::CheckedIn, SessionAction::BreakIn) => Some(SessionPhase::OnBreak),
        (SessionPhase::OnBreak, SessionAction::BreakOut) => Some(SessionPhase::CheckedIn),
        (SessionPhase::CheckedIn, SessionAction::CheckOut) => Some(SessionPhase::CheckedOut),
        (SessionPhase::OnBreak, SessionAction::CheckOut)
            if policy.close_open_break_on_checkout =>
        {
            Some(SessionPhase::CheckedOut)
        }
        _ => None,
    };

    next.ok_or(InvalidTransition {
        from: current,
        action,
    })
}
