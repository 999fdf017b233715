//! AttendanceEngine - the entry point for attendance clients.
//!
//! The engine owns every per-actor session machine, the local record history
//! and the pending-action queue. UI calls land here; each one mutates local
//! state first and only then talks to the remote service, so a slow or absent
//! network never blocks a transition.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use attendance_core::{AttendanceEngine, ActionKind, SessionAction, StorageConfig};
//!
//! let engine = AttendanceEngine::open(&StorageConfig::default(), actor, gateway)?;
//! engine.resume().await?;
//! engine.perform_session_action("emp-1", SessionAction::CheckIn).await?;
//! engine.queue_or_send_approval("leave-42", ActionKind::Approve).await?;
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::aggregation::AggregationEngine;
use crate::clock::{Clock, SystemClock};
use crate::config::CoreConfig;
use crate::connectivity::{Connectivity, ConnectivityMonitor};
use crate::error::{CoreError, Result};
use crate::gateway::{GatewayError, RemoteGateway};
use crate::local_store::{load_document, save_document, FileStore, LocalStore};
use crate::queue::PendingActionQueue;
use crate::records::RecordStore;
use crate::session::{SessionAction, SessionStateMachine, Transition};
use crate::storage::{StorageConfig, STATUS_KEY};
use crate::sync::{DrainOutcome, QueueDrainer};
use crate::types::{
    ActionKind, ActorMeta, AttendanceRecord, AttendanceStatus, DateRange, LeaveStatus,
    PendingAction, WeeklySummary,
};

/// Result of a session action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The service accepted the action; carries the status now in effect.
    Confirmed(AttendanceStatus),
    /// The service was not reached or refused; local state stands.
    Optimistic {
        status: AttendanceStatus,
        reason: String,
    },
}

impl SessionOutcome {
    pub fn status(&self) -> &AttendanceStatus {
        match self {
            SessionOutcome::Confirmed(status) => status,
            SessionOutcome::Optimistic { status, .. } => status,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        matches!(self, SessionOutcome::Confirmed(_))
    }
}

/// Result of an approve/reject decision. Queuing is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    Sent { leave_id: String, status: LeaveStatus },
    Queued(PendingAction),
}

pub struct AttendanceEngine {
    actor: ActorMeta,
    config: CoreConfig,
    store: Arc<dyn LocalStore>,
    gateway: Arc<dyn RemoteGateway>,
    clock: Arc<dyn Clock>,
    sessions: Mutex<HashMap<String, SessionStateMachine>>,
    records: Mutex<RecordStore>,
    queue: Arc<Mutex<PendingActionQueue>>,
    aggregation: AggregationEngine,
    monitor: ConnectivityMonitor,
}

impl AttendanceEngine {
    /// Opens an engine over the on-disk layout described by `storage`.
    pub fn open(
        storage: &StorageConfig,
        actor: ActorMeta,
        gateway: Arc<dyn RemoteGateway>,
    ) -> Result<Self> {
        storage.ensure_dirs().map_err(|source| {
            CoreError::Storage(crate::local_store::LocalStoreError::Io {
                context: format!("create {}", storage.root().display()),
                source,
            })
        })?;
        let config = CoreConfig::load(&storage.config_file());
        let store: Arc<dyn LocalStore> = Arc::new(FileStore::new(&storage.data_dir()));
        Ok(Self::new(actor, config, store, gateway))
    }

    pub fn new(
        actor: ActorMeta,
        config: CoreConfig,
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
    ) -> Self {
        Self::with_clock(actor, config, store, gateway, Arc::new(SystemClock))
    }

    /// Restores persisted statuses, records and queue from `store`.
    pub fn with_clock(
        actor: ActorMeta,
        config: CoreConfig,
        store: Arc<dyn LocalStore>,
        gateway: Arc<dyn RemoteGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let statuses: BTreeMap<String, AttendanceStatus> = load_document(store.as_ref(), STATUS_KEY);
        let sessions: HashMap<String, SessionStateMachine> = statuses
            .into_iter()
            .map(|(id, status)| {
                let machine = SessionStateMachine::with_status(&id, status, config.session.clone());
                (id, machine)
            })
            .collect();

        let records = RecordStore::load(store.as_ref());
        let queue = Arc::new(Mutex::new(PendingActionQueue::load(
            store.clone(),
            config.sync.clone(),
        )));
        let drainer = Arc::new(QueueDrainer::new(
            queue.clone(),
            gateway.clone(),
            clock.clone(),
        ));

        AttendanceEngine {
            aggregation: AggregationEngine::new(config.roster.clone()),
            monitor: ConnectivityMonitor::new(drainer, Connectivity::Online),
            sessions: Mutex::new(sessions),
            records: Mutex::new(records),
            actor,
            config,
            store,
            gateway,
            clock,
            queue,
        }
    }

    pub fn actor(&self) -> &ActorMeta {
        &self.actor
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Drains anything left in the queue by a previous run.
    pub async fn resume(&self) -> Result<Option<DrainOutcome>> {
        let queued = self.queue.lock().await.len();
        if queued == 0 {
            return Ok(None);
        }
        info!(queued, "Resuming with pending actions");
        self.monitor.drain_if_online().await.map(Some)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────

    /// Current status for `actor_id`. Prefers the service's copy when it can
    /// be reached; falls back to the last known local status.
    pub async fn get_current_status(&self, actor_id: &str) -> Result<AttendanceStatus> {
        let today = self.clock.now_local().date();
        {
            let mut records = self.records.lock().await;
            if records.get(actor_id, today).is_none() {
                records.open_day(actor_id, today);
                records.save(self.store.as_ref())?;
            }
        }

        if self.monitor.is_online() {
            match self.gateway.get_status(actor_id).await {
                Ok(remote) if remote.is_consistent() => {
                    self.adopt_remote_status(actor_id, &remote).await?;
                    return Ok(remote);
                }
                Ok(_) => warn!(actor_id, "Remote status is inconsistent; keeping local status"),
                Err(err) => self.note_remote_failure(actor_id, "get_status", &err),
            }
        }

        Ok(self.local_status(actor_id).await)
    }

    /// Applies `action` locally, then reports it to the service.
    ///
    /// Invalid transitions fail before any network call. Remote failures
    /// leave the optimistic local state in place and are never queued.
    pub async fn perform_session_action(
        &self,
        actor_id: &str,
        action: SessionAction,
    ) -> Result<SessionOutcome> {
        let now = self.clock.now_local();
        let (transition, status) = {
            let mut sessions = self.sessions.lock().await;
            let machine = sessions
                .entry(actor_id.to_string())
                .or_insert_with(|| SessionStateMachine::new(actor_id, self.config.session.clone()));
            let transition = machine.apply(action, now)?;
            (transition, machine.status().clone())
        };
        self.persist_statuses().await?;
        self.record_transition(actor_id, &transition, &status, now.date())
            .await?;

        if !self.monitor.is_online() {
            return Ok(SessionOutcome::Optimistic {
                status,
                reason: "offline".to_string(),
            });
        }

        let result = match action {
            SessionAction::CheckIn => self.gateway.check_in(actor_id).await,
            SessionAction::BreakIn => self.gateway.break_in(actor_id).await,
            SessionAction::BreakOut => self.gateway.break_out(actor_id).await,
            SessionAction::CheckOut => self.gateway.check_out(actor_id).await,
        };

        match result {
            Ok(Some(remote)) if remote.is_consistent() => {
                self.adopt_remote_status(actor_id, &remote).await?;
                Ok(SessionOutcome::Confirmed(remote))
            }
            Ok(Some(_)) => {
                warn!(actor_id, action = action.as_str(), "Remote status is inconsistent; keeping local status");
                Ok(SessionOutcome::Confirmed(status))
            }
            Ok(None) => Ok(SessionOutcome::Confirmed(status)),
            Err(err) => {
                self.note_remote_failure(actor_id, action.as_str(), &err);
                Ok(SessionOutcome::Optimistic {
                    status,
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Local day records for `actor_id` within `range`.
    pub async fn history(&self, actor_id: &str, range: DateRange) -> Vec<AttendanceRecord> {
        self.records.lock().await.range(actor_id, &range)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Approvals
    // ─────────────────────────────────────────────────────────────────────

    /// Sends a leave decision, or queues it when it cannot be sent now.
    ///
    /// While anything is queued, new decisions join the queue so they are
    /// never delivered ahead of older ones.
    pub async fn queue_or_send_approval(
        &self,
        leave_id: &str,
        decision: ActionKind,
    ) -> Result<ApprovalOutcome> {
        let target = decision.target_status();
        let backlog = !self.queue.lock().await.is_empty();

        if !self.monitor.is_online() || backlog {
            let action = self.enqueue(leave_id, decision).await?;
            if !self.monitor.is_online() {
                return Ok(ApprovalOutcome::Queued(action));
            }

            self.monitor.drain_if_online().await?;
            if self.queue.lock().await.get(&action.id).is_none() {
                return Ok(ApprovalOutcome::Sent {
                    leave_id: leave_id.to_string(),
                    status: target,
                });
            }
            return Ok(ApprovalOutcome::Queued(action));
        }

        match self.gateway.set_leave_status(leave_id, target, &self.actor).await {
            Ok(status) => {
                info!(leave_id, status = %status, "Decision sent");
                Ok(ApprovalOutcome::Sent {
                    leave_id: leave_id.to_string(),
                    status,
                })
            }
            Err(GatewayError::Conflict { current }) if current == target => {
                debug!(leave_id, status = %current, "Decision already applied");
                Ok(ApprovalOutcome::Sent {
                    leave_id: leave_id.to_string(),
                    status: current,
                })
            }
            // A garbled reply may hide an applied decision; replay settles it.
            Err(err) if err.is_transient() || matches!(err, GatewayError::Malformed(_)) => {
                self.note_remote_failure(&self.actor.actor_id, "set_leave_status", &err);
                let action = self.enqueue(leave_id, decision).await?;
                Ok(ApprovalOutcome::Queued(action))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Leave status the queued decisions will produce, for optimistic display.
    pub async fn leave_status_hint(&self, leave_id: &str) -> Option<LeaveStatus> {
        self.queue.lock().await.optimistic_status(leave_id)
    }

    pub async fn pending_actions(&self) -> Vec<PendingAction> {
        self.queue.lock().await.pending()
    }

    pub async fn needs_attention(&self) -> Vec<PendingAction> {
        self.queue.lock().await.needs_attention()
    }

    pub async fn retry_action(&self, id: &str) -> Result<PendingAction> {
        self.queue.lock().await.retry(id)
    }

    pub async fn dismiss_action(&self, id: &str) -> Result<PendingAction> {
        self.queue.lock().await.dismiss(id)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Summaries
    // ─────────────────────────────────────────────────────────────────────

    pub async fn get_weekly_summary(&self, actor_id: &str, range: DateRange) -> Result<WeeklySummary> {
        let local = self.records.lock().await.range(actor_id, &range);
        self.aggregation
            .weekly_summary(self.reachable_gateway(), actor_id, range, &local)
            .await
    }

    pub async fn get_monthly_summary(
        &self,
        actor_id: &str,
        year: i32,
        month: u32,
    ) -> Result<WeeklySummary> {
        let local = match DateRange::month(year, month) {
            Some(range) => self.records.lock().await.range(actor_id, &range),
            None => Vec::new(),
        };
        self.aggregation
            .monthly_summary(self.reachable_gateway(), actor_id, year, month, &local)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Connectivity
    // ─────────────────────────────────────────────────────────────────────

    pub fn connectivity(&self) -> Connectivity {
        self.monitor.current()
    }

    pub fn subscribe_connectivity(&self) -> watch::Receiver<Connectivity> {
        self.monitor.subscribe()
    }

    /// Returns the drain outcome when this call brought the engine online.
    pub async fn set_online(&self) -> Result<Option<DrainOutcome>> {
        self.monitor.online().await
    }

    pub fn set_offline(&self) {
        self.monitor.offline();
    }

    /// Drains the queue now, unless offline.
    pub async fn sync_now(&self) -> Result<DrainOutcome> {
        self.monitor.drain_if_online().await
    }

    // ─────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────

    fn reachable_gateway(&self) -> Option<&dyn RemoteGateway> {
        self.monitor.is_online().then_some(self.gateway.as_ref())
    }

    async fn enqueue(&self, leave_id: &str, decision: ActionKind) -> Result<PendingAction> {
        let now = self.clock.now_utc();
        let outcome = self
            .queue
            .lock()
            .await
            .enqueue(decision, leave_id, &self.actor, now)?;
        Ok(outcome.action().clone())
    }

    async fn local_status(&self, actor_id: &str) -> AttendanceStatus {
        self.sessions
            .lock()
            .await
            .get(actor_id)
            .map(|machine| machine.status().clone())
            .unwrap_or_default()
    }

    async fn adopt_remote_status(&self, actor_id: &str, remote: &AttendanceStatus) -> Result<()> {
        {
            let mut sessions = self.sessions.lock().await;
            sessions
                .entry(actor_id.to_string())
                .or_insert_with(|| SessionStateMachine::new(actor_id, self.config.session.clone()))
                .replace_status(remote.clone());
        }
        self.persist_statuses().await?;

        if remote.check_in_time.is_some() {
            let today = self.clock.now_local().date();
            let mut records = self.records.lock().await;
            self.write_session_record(&mut records, actor_id, remote, today)?;
            records.save(self.store.as_ref())?;
        }
        Ok(())
    }

    /// Mirrors a transition into the record history: the day a check-in
    /// rolled over is finalized, then the session's own day is updated.
    async fn record_transition(
        &self,
        actor_id: &str,
        transition: &Transition,
        status: &AttendanceStatus,
        today: NaiveDate,
    ) -> Result<()> {
        let shift = &self.config.shift;
        let mut records = self.records.lock().await;

        if let Some(previous) = &transition.rolled_over {
            let started = previous
                .last_check_in_date
                .or_else(|| previous.check_in_time.map(|t| t.date()));
            if let Some(day) = started {
                skip_finalized(records.finalize_session(actor_id, day, previous, shift).map(|_| ()))?;
            }
        }

        self.write_session_record(&mut records, actor_id, status, today)?;
        records.save(self.store.as_ref())
    }

    fn write_session_record(
        &self,
        records: &mut RecordStore,
        actor_id: &str,
        status: &AttendanceStatus,
        today: NaiveDate,
    ) -> Result<()> {
        let shift = &self.config.shift;
        // Night shifts keep the day they started on.
        let day = status
            .last_check_in_date
            .or_else(|| status.check_in_time.map(|t| t.date()))
            .unwrap_or(today);
        records.finalize_before(actor_id, day, shift);

        let written = if status.check_out_time.is_some() {
            records.finalize_session(actor_id, day, status, shift)
        } else {
            records.track_session(actor_id, day, status, shift)
        };
        skip_finalized(written.map(|_| ()))
    }

    async fn persist_statuses(&self) -> Result<()> {
        let statuses: BTreeMap<String, AttendanceStatus> = self
            .sessions
            .lock()
            .await
            .iter()
            .map(|(id, machine)| (id.clone(), machine.status().clone()))
            .collect();
        save_document(self.store.as_ref(), STATUS_KEY, &statuses)
    }

    fn note_remote_failure(&self, actor_id: &str, operation: &str, err: &GatewayError) {
        if err.is_transient() {
            self.monitor.report_unreachable();
        }
        warn!(actor_id, operation, error = %err, "Remote call failed; keeping local state");
    }
}

/// A finalized record is history; later writes to it are dropped.
fn skip_finalized(result: Result<()>) -> Result<()> {
    match result {
        Err(CoreError::RecordFinalized { actor_id, date }) => {
            debug!(actor_id = %actor_id, date = %date, "Record already finalized; not updated");
            Ok(())
        }
        other => other,
    }
}
