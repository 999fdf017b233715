//! Durable FIFO of approve/reject decisions awaiting the remote service.
//!
//! Every mutation is persisted before it returns, so a crash right after
//! `enqueue` never loses the decision. Order is never changed: actions only
//! leave the queue from wherever they sit when they complete or are
//! dismissed.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::SyncPolicy;
use crate::error::{CoreError, Result};
use crate::local_store::{load_document, save_document, LocalStore};
use crate::storage::QUEUE_KEY;
use crate::types::{ActionKind, ActorMeta, LeaveStatus, PendingAction, PendingState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Queued(PendingAction),
    /// Repeat of the last pending decision on the same target; nothing added.
    Duplicate(PendingAction),
}

impl EnqueueOutcome {
    pub fn action(&self) -> &PendingAction {
        match self {
            EnqueueOutcome::Queued(action) | EnqueueOutcome::Duplicate(action) => action,
        }
    }
}

/// What the drainer should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    Ready(PendingAction),
    /// The head of the line is backing off until the given instant.
    Waiting(DateTime<Utc>),
    Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Will be retried after the given instant.
    Retrying(DateTime<Utc>),
    /// Retry bound reached; now needs the user.
    Parked,
}

pub struct PendingActionQueue {
    actions: VecDeque<PendingAction>,
    store: Arc<dyn LocalStore>,
    policy: SyncPolicy,
}

impl PendingActionQueue {
    pub fn load(store: Arc<dyn LocalStore>, policy: SyncPolicy) -> Self {
        let actions: VecDeque<PendingAction> = load_document(store.as_ref(), QUEUE_KEY);
        if !actions.is_empty() {
            info!(count = actions.len(), "Restored pending actions");
        }
        PendingActionQueue {
            actions,
            store,
            policy,
        }
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Snapshot of every queued action in replay order.
    pub fn pending(&self) -> Vec<PendingAction> {
        self.actions.iter().cloned().collect()
    }

    pub fn needs_attention(&self) -> Vec<PendingAction> {
        self.actions
            .iter()
            .filter(|a| a.needs_attention())
            .cloned()
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&PendingAction> {
        self.actions.iter().find(|a| a.id == id)
    }

    /// Leave status the queued decisions will produce for `target_id`.
    pub fn optimistic_status(&self, target_id: &str) -> Option<LeaveStatus> {
        self.actions
            .iter()
            .rev()
            .find(|a| a.target_id == target_id && a.state == PendingState::Pending)
            .map(|a| a.kind.target_status())
    }

    /// Appends a decision and persists the queue. Never touches the network.
    pub fn enqueue(
        &mut self,
        kind: ActionKind,
        target_id: &str,
        actor: &ActorMeta,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome> {
        let last_on_target = self.actions.iter().rev().find(|a| a.target_id == target_id);
        if let Some(last) = last_on_target {
            if last.kind == kind && last.state == PendingState::Pending && last.actor_id == actor.actor_id {
                debug!(target_id, kind = %kind, id = %last.id, "Coalesced duplicate decision");
                return Ok(EnqueueOutcome::Duplicate(last.clone()));
            }
        }

        let action = PendingAction::new(kind, target_id, actor, now);
        self.actions.push_back(action.clone());
        if let Err(err) = self.persist() {
            self.actions.pop_back();
            return Err(err);
        }

        info!(id = %action.id, target_id, kind = %kind, queued = self.actions.len(), "Queued decision");
        Ok(EnqueueOutcome::Queued(action))
    }

    /// Next action to replay.
    ///
    /// Parked actions are passed over, and so is anything queued behind a
    /// parked action on the same target.
    pub fn next_ready(&self, now: DateTime<Utc>) -> NextAction {
        let mut blocked: HashSet<&str> = HashSet::new();
        for action in &self.actions {
            if action.needs_attention() {
                blocked.insert(action.target_id.as_str());
                continue;
            }
            if blocked.contains(action.target_id.as_str()) {
                continue;
            }
            return match action.next_attempt_at {
                Some(at) if at > now => NextAction::Waiting(at),
                _ => NextAction::Ready(action.clone()),
            };
        }
        NextAction::Empty
    }

    /// Removes an action the remote service has accepted.
    pub fn complete(&mut self, id: &str) -> Result<PendingAction> {
        let index = self.index_of(id)?;
        let removed = self
            .actions
            .remove(index)
            .ok_or_else(|| CoreError::ActionNotFound(id.to_string()))?;
        self.persist()?;
        Ok(removed)
    }

    /// Counts a refused attempt and schedules the retry, parking the action
    /// once the retry bound is reached.
    pub fn record_failure(
        &mut self,
        id: &str,
        error: &str,
        now: DateTime<Utc>,
    ) -> Result<FailureDisposition> {
        let policy = self.policy.clone();
        let action = self.action_mut(id)?;
        action.attempts = action.attempts.saturating_add(1);
        action.last_error = Some(error.to_string());

        let disposition = if action.attempts >= policy.max_attempts {
            action.state = PendingState::NeedsAttention;
            action.next_attempt_at = None;
            warn!(id, attempts = action.attempts, error, "Decision needs attention");
            FailureDisposition::Parked
        } else {
            let at = now + policy.backoff_for(action.attempts);
            action.next_attempt_at = Some(at);
            debug!(id, attempts = action.attempts, retry_at = %at, "Decision refused; backing off");
            FailureDisposition::Retrying(at)
        };

        self.persist()?;
        Ok(disposition)
    }

    /// Notes a failed delivery that did not reach the service. Not counted
    /// against the retry bound.
    pub fn note_unreachable(&mut self, id: &str, error: &str) -> Result<()> {
        let action = self.action_mut(id)?;
        action.last_error = Some(error.to_string());
        self.persist()
    }

    /// Parks an action that can never succeed as queued.
    pub fn park(&mut self, id: &str, error: &str) -> Result<()> {
        let action = self.action_mut(id)?;
        action.state = PendingState::NeedsAttention;
        action.next_attempt_at = None;
        action.last_error = Some(error.to_string());
        warn!(id, error, "Decision needs attention");
        self.persist()
    }

    /// Re-arms an action for immediate replay with a fresh retry budget.
    pub fn retry(&mut self, id: &str) -> Result<PendingAction> {
        let action = self.action_mut(id)?;
        action.state = PendingState::Pending;
        action.attempts = 0;
        action.next_attempt_at = None;
        let action = action.clone();
        self.persist()?;
        info!(id, "Decision re-armed");
        Ok(action)
    }

    /// Drops an action without sending it.
    pub fn dismiss(&mut self, id: &str) -> Result<PendingAction> {
        let removed = self.complete(id)?;
        info!(id, target_id = %removed.target_id, "Decision dismissed");
        Ok(removed)
    }

    fn index_of(&self, id: &str) -> Result<usize> {
        self.actions
            .iter()
            .position(|a| a.id == id)
            .ok_or_else(|| CoreError::ActionNotFound(id.to_string()))
    }

    fn action_mut(&mut self, id: &str) -> Result<&mut PendingAction> {
        self.actions
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| CoreError::ActionNotFound(id.to_string()))
    }

    fn persist(&self) -> Result<()> {
        save_document(self.store.as_ref(), QUEUE_KEY, &self.actions)
    }
}
