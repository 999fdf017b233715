//! # attendance-core
//!
//! Client-side attendance and approval reconciliation: per-actor session
//! state machines, weekly/monthly summaries over incomplete day records, and
//! a durable queue that replays leave decisions once the remote service is
//! reachable again.
//!
//! ## Design Principles
//!
//! - **Local first**: every user action mutates local state synchronously;
//!   the remote call follows and never blocks the transition.
//! - **Graceful degradation**: missing or corrupt persisted files load as
//!   empty, and summaries fall back tier by tier instead of failing.
//! - **Single owner**: [`AttendanceEngine`] owns all mutable state; there is
//!   no global state.
//! - **Ordered replay**: queued decisions are delivered strictly in the order
//!   they were made.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use attendance_core::{ActorMeta, AttendanceEngine, SessionAction, StorageConfig};
//!
//! let engine = AttendanceEngine::open(&StorageConfig::default(), actor, gateway)?;
//! engine.resume().await?;
//! let outcome = engine.perform_session_action("emp-1", SessionAction::CheckIn).await?;
//! ```

pub mod aggregation;
pub mod clock;
pub mod config;
pub mod connectivity;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod local_store;
pub mod queue;
pub mod records;
pub mod session;
pub mod storage;
pub mod sync;
pub mod time_math;
pub mod types;

pub use aggregation::AggregationEngine;
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{CoreConfig, SessionPolicy, ShiftPolicy, SyncPolicy};
pub use connectivity::{Connectivity, ConnectivityMonitor};
pub use engine::{ApprovalOutcome, AttendanceEngine, SessionOutcome};
pub use error::{CoreError, Result};
pub use gateway::{GatewayError, GatewayResult, RemoteGateway};
pub use local_store::{FileStore, LocalStore, LocalStoreError, MemoryStore};
pub use queue::{EnqueueOutcome, PendingActionQueue};
pub use records::RecordStore;
pub use session::{
    determine_status, InvalidTransition, SessionAction, SessionPhase, SessionStateMachine,
};
pub use storage::StorageConfig;
pub use sync::{DrainOutcome, DrainReport, DrainStop, QueueDrainer};
pub use types::*;
