//! Ordered replay of queued decisions.
//!
//! The drainer walks the queue head-first in an explicit loop. The queue lock
//! is released while a remote call is in flight, so new decisions can be
//! enqueued during a drain; they simply join the back of the line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::Result;
use crate::gateway::{GatewayError, RemoteGateway};
use crate::queue::{FailureDisposition, NextAction, PendingActionQueue};

/// Why a drain ended before the queue ran dry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainStop {
    /// The service could not be reached.
    Unreachable,
    /// The head action was refused and is backing off.
    Refused,
    /// The head action is still inside its backoff window.
    BackingOff(DateTime<Utc>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Ids accepted by the service.
    pub sent: Vec<String>,
    /// Ids the service had already applied.
    pub already_applied: Vec<String>,
    /// Ids moved to needs-attention during this drain.
    pub parked: Vec<String>,
    pub stopped: Option<DrainStop>,
    /// Actions still queued, parked ones included.
    pub remaining: usize,
}

impl DrainReport {
    pub fn unreachable(&self) -> bool {
        self.stopped == Some(DrainStop::Unreachable)
    }

    pub fn delivered(&self) -> usize {
        self.sent.len() + self.already_applied.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    Completed(DrainReport),
    /// Another drain was already in progress; the queue was not touched.
    AlreadyRunning,
    /// Connectivity is offline; no network call was made.
    Offline,
}

pub struct QueueDrainer {
    queue: Arc<Mutex<PendingActionQueue>>,
    gateway: Arc<dyn RemoteGateway>,
    clock: Arc<dyn Clock>,
    running: AtomicBool,
}

/// Clears the running flag however the drain exits.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl QueueDrainer {
    pub fn new(
        queue: Arc<Mutex<PendingActionQueue>>,
        gateway: Arc<dyn RemoteGateway>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        QueueDrainer {
            queue,
            gateway,
            clock,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn drain(&self) -> Result<DrainOutcome> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain already in progress");
            return Ok(DrainOutcome::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let mut report = DrainReport::default();
        loop {
            let now = self.clock.now_utc();
            let action = match self.queue.lock().await.next_ready(now) {
                NextAction::Ready(action) => action,
                NextAction::Waiting(at) => {
                    report.stopped = Some(DrainStop::BackingOff(at));
                    break;
                }
                NextAction::Empty => break,
            };

            let target = action.kind.target_status();
            let result = self
                .gateway
                .set_leave_status(&action.target_id, target, &action.actor_meta())
                .await;

            let mut queue = self.queue.lock().await;
            match result {
                Ok(stored) => {
                    queue.complete(&action.id)?;
                    debug!(id = %action.id, target_id = %action.target_id, status = %stored, "Decision delivered");
                    report.sent.push(action.id);
                }
                Err(GatewayError::Conflict { current }) if current == target => {
                    queue.complete(&action.id)?;
                    debug!(id = %action.id, target_id = %action.target_id, "Decision already applied");
                    report.already_applied.push(action.id);
                }
                Err(err @ GatewayError::Conflict { .. }) => {
                    queue.park(&action.id, &err.to_string())?;
                    report.parked.push(action.id);
                }
                Err(err @ GatewayError::Unavailable(_)) => {
                    queue.note_unreachable(&action.id, &err.to_string())?;
                    debug!(id = %action.id, error = %err, "Service unreachable; stopping drain");
                    report.stopped = Some(DrainStop::Unreachable);
                    break;
                }
                Err(err) => match queue.record_failure(&action.id, &err.to_string(), now)? {
                    FailureDisposition::Parked => report.parked.push(action.id),
                    FailureDisposition::Retrying(_) => {
                        report.stopped = Some(DrainStop::Refused);
                        break;
                    }
                },
            }
        }

        report.remaining = self.queue.lock().await.len();
        if report.delivered() > 0 || !report.parked.is_empty() {
            info!(
                sent = report.sent.len(),
                already_applied = report.already_applied.len(),
                parked = report.parked.len(),
                remaining = report.remaining,
                "Queue drained"
            );
        }
        if !report.parked.is_empty() {
            warn!(ids = ?report.parked, "Decisions need attention");
        }
        Ok(DrainOutcome::Completed(report))
    }
}
