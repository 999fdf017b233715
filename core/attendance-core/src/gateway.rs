//! Remote attendance service boundary.
//!
//! The engine, aggregation tiers and queue drainer only see this trait. The
//! HTTP implementation lives in the CLI crate; tests script responses through
//! [`test_utils::ScriptedGateway`].

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::types::{
    ActorMeta, AttendanceRecord, AttendanceStatus, DateRange, LeaveStatus, WeeklySummary,
};

/// Failure reported by a remote call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The service could not be reached (no network, timeout, 5xx).
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// The service answered and refused the request.
    #[error("rejected ({status:?}): {reason}")]
    Rejected { status: Option<u16>, reason: String },

    /// The leave request is no longer in a state that accepts the decision.
    #[error("conflict: leave request is {current}")]
    Conflict { current: LeaveStatus },

    /// The service answered with something we could not interpret.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl GatewayError {
    /// Errors worth retrying without user involvement.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Unavailable(_))
    }
}

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

#[async_trait]
pub trait RemoteGateway: Send + Sync {
    async fn get_status(&self, actor_id: &str) -> GatewayResult<AttendanceStatus>;

    /// Session calls return the service's authoritative status when it sends one.
    async fn check_in(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>>;

    async fn break_in(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>>;

    async fn break_out(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>>;

    async fn check_out(&self, actor_id: &str) -> GatewayResult<Option<AttendanceStatus>>;

    async fn get_history(
        &self,
        actor_id: &str,
        range: DateRange,
    ) -> GatewayResult<Vec<AttendanceRecord>>;

    async fn get_day(
        &self,
        actor_id: &str,
        date: NaiveDate,
    ) -> GatewayResult<Option<AttendanceRecord>>;

    async fn get_weekly_summary(&self, range: DateRange) -> GatewayResult<Vec<WeeklySummary>>;

    /// Drives a leave request to `status`; returns the status the service stored.
    async fn set_leave_status(
        &self,
        leave_id: &str,
        status: LeaveStatus,
        actor: &ActorMeta,
    ) -> GatewayResult<LeaveStatus>;
}
