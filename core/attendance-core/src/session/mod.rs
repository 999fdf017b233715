//! Attendance Session State
//!
//! Tracks one actor's check-in / break / check-out lifecycle for a calendar day.
//!
//! ```text
//! NotCheckedIn ──check_in──▶ CheckedIn ──break_in──▶ OnBreak
//!                               ▲  │                   │
//!                               │  └───break_out◀──────┘
//!                               │
//!                            check_out (break auto-closed) ──▶ CheckedOut
//! ```
//!
//! # Module Structure
//!
//! - [`transition`]: Pure guard table mapping (phase, action) to the next phase
//! - [`machine`]: Owns an [`AttendanceStatus`](crate::types::AttendanceStatus) and applies transitions
//! - [`classify`]: Derives a [`DayStatus`](crate::types::DayStatus) for a day record
//!
//! Transitions are local and synchronous. Remote confirmation happens in
//! [`crate::engine`], which keeps the local result when the remote call fails.

mod classify;
mod machine;
mod transition;

pub use classify::{determine_status, record_for_day};
pub use machine::{SessionStateMachine, Transition};
pub use transition::{next_phase, InvalidTransition, SessionAction, SessionPhase};
