//! Error types for attendance-core operations.
//! Transient remote failures never reach the UI as errors; see `engine` for
//! how they are folded into optimistic or queued outcomes.

use chrono::NaiveDate;

use crate::gateway::GatewayError;
use crate::local_store::LocalStoreError;
use crate::session::InvalidTransition;

/// All errors that can occur in attendance-core operations.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // ─────────────────────────────────────────────────────────────────────
    // Local precondition errors (never retried)
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),

    #[error("Attendance record for {actor_id} on {date} is finalized")]
    RecordFinalized { actor_id: String, date: NaiveDate },

    #[error("Unknown actor: {0}")]
    UnknownActor(String),

    #[error("Pending action not found: {0}")]
    ActionNotFound(String),

    #[error("Invalid month: {year}-{month:02}")]
    InvalidMonth { year: i32, month: u32 },

    // ─────────────────────────────────────────────────────────────────────
    // Remote service errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Remote service unavailable: {0}")]
    NetworkUnavailable(String),

    #[error("Remote service rejected the request: {reason}")]
    RemoteRejected { reason: String },

    #[error("Malformed response from remote service: {details}")]
    MalformedResponse { details: String },

    // ─────────────────────────────────────────────────────────────────────
    // Persistence errors
    // ─────────────────────────────────────────────────────────────────────
    #[error(transparent)]
    Storage(#[from] LocalStoreError),

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<GatewayError> for CoreError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unavailable(message) => CoreError::NetworkUnavailable(message),
            GatewayError::Malformed(details) => CoreError::MalformedResponse { details },
            GatewayError::Rejected { reason, .. } => CoreError::RemoteRejected { reason },
            GatewayError::Conflict { current } => CoreError::RemoteRejected {
                reason: format!("leave request is already {}", current),
            },
        }
    }
}

/// Convenience type alias for Results using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<CoreError> for String {
    fn from(err: CoreError) -> String {
        err.to_string()
    }
}
