//! Integration tests for offline approvals, restarts and on-disk state.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use attendance_core::{
    ActionKind, ActorMeta, ApprovalOutcome, AttendanceEngine, AttendanceRecord, AttendanceStatus,
    Connectivity, CoreConfig, DateRange, DayStatus, DrainOutcome, FileStore, FixedClock,
    GatewayError, GatewayResult, LeaveStatus, LocalStore, RemoteGateway, SessionAction,
    StorageConfig, SummarySource, SyncPolicy, WeeklySummary,
};
use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal_macros::dec;
use tempfile::TempDir;

/// Leave service that can be switched off, with attendance endpoints that
/// always report no data.
struct FakeService {
    online: AtomicBool,
    leaves: Mutex<HashMap<String, LeaveStatus>>,
    deliveries: Mutex<Vec<(String, LeaveStatus)>>,
}

impl FakeService {
    fn new(online: bool) -> Self {
        Self {
            online: AtomicBool::new(online),
            leaves: Mutex::new(HashMap::new()),
            deliveries: Mutex::new(vec![]),
        }
    }

    fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    fn reachable(&self) -> GatewayResult<()> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(GatewayError::Unavailable("no route to host".into()))
        }
    }

    fn deliveries(&self) -> Vec<(String, LeaveStatus)> {
        self.deliveries.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteGateway for FakeService {
    async fn get_status(&self, _actor_id: &str) -> GatewayResult<AttendanceStatus> {
        self.reachable()?;
        Err(GatewayError::Rejected {
            status: Some(404),
            reason: "no session".into(),
        })
    }

    async fn check_in(&self, _actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.reachable().map(|_| None)
    }

    async fn break_in(&self, _actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.reachable().map(|_| None)
    }

    async fn break_out(&self, _actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.reachable().map(|_| None)
    }

    async fn check_out(&self, _actor_id: &str) -> GatewayResult<Option<AttendanceStatus>> {
        self.reachable().map(|_| None)
    }

    async fn get_history(
        &self,
        _actor_id: &str,
        _range: DateRange,
    ) -> GatewayResult<Vec<AttendanceRecord>> {
        self.reachable().map(|_| vec![])
    }

    async fn get_day(
        &self,
        _actor_id: &str,
        _date: NaiveDate,
    ) -> GatewayResult<Option<AttendanceRecord>> {
        self.reachable().map(|_| None)
    }

    async fn get_weekly_summary(&self, _range: DateRange) -> GatewayResult<Vec<WeeklySummary>> {
        self.reachable().map(|_| vec![])
    }

    async fn set_leave_status(
        &self,
        leave_id: &str,
        status: LeaveStatus,
        _actor: &ActorMeta,
    ) -> GatewayResult<LeaveStatus> {
        self.reachable()?;
        let mut leaves = self.leaves.lock().unwrap();
        let current = leaves
            .get(leave_id)
            .copied()
            .unwrap_or(LeaveStatus::Pending);
        if !current.can_transition_to(status) {
            return Err(GatewayError::Conflict { current });
        }
        leaves.insert(leave_id.to_string(), status);
        self.deliveries
            .lock()
            .unwrap()
            .push((leave_id.to_string(), status));
        Ok(status)
    }
}

fn manager() -> ActorMeta {
    ActorMeta::new("mgr-1", "Dana")
}

fn open(temp: &TempDir, service: &Arc<FakeService>) -> AttendanceEngine {
    let storage = StorageConfig::with_root(temp.path().to_path_buf());
    AttendanceEngine::open(&storage, manager(), service.clone()).unwrap()
}

#[tokio::test]
async fn test_offline_decisions_replay_in_order_after_restart() {
    let temp = TempDir::new().unwrap();
    let service = Arc::new(FakeService::new(false));

    {
        let engine = open(&temp, &service);
        for (leave, kind) in [
            ("leave-a", ActionKind::Approve),
            ("leave-b", ActionKind::Reject),
            ("leave-c", ActionKind::Approve),
        ] {
            let outcome = engine.queue_or_send_approval(leave, kind).await.unwrap();
            assert!(matches!(outcome, ApprovalOutcome::Queued(_)));
        }
        assert_eq!(engine.connectivity(), Connectivity::Offline);
        assert_eq!(engine.pending_actions().await.len(), 3);
    }

    // The queue file is on disk under the storage root
    assert!(temp.path().join("data").join("pending-actions.json").exists());

    service.set_online(true);
    let engine = open(&temp, &service);
    let outcome = engine.resume().await.unwrap();
    assert!(matches!(outcome, Some(DrainOutcome::Completed(ref r)) if r.sent.len() == 3));

    assert_eq!(
        service.deliveries(),
        vec![
            ("leave-a".to_string(), LeaveStatus::Approved),
            ("leave-b".to_string(), LeaveStatus::Rejected),
            ("leave-c".to_string(), LeaveStatus::Approved),
        ]
    );
    assert!(engine.pending_actions().await.is_empty());
}

#[tokio::test]
async fn test_decision_applied_elsewhere_is_not_an_error() {
    let temp = TempDir::new().unwrap();
    let service = Arc::new(FakeService::new(true));
    let engine = open(&temp, &service);

    engine.set_offline();
    engine
        .queue_or_send_approval("leave-a", ActionKind::Approve)
        .await
        .unwrap();

    // Another reviewer approves the same request first
    service
        .leaves
        .lock()
        .unwrap()
        .insert("leave-a".into(), LeaveStatus::Approved);

    let outcome = engine.set_online().await.unwrap();
    match outcome {
        Some(DrainOutcome::Completed(report)) => {
            assert_eq!(report.already_applied.len(), 1);
            assert!(report.parked.is_empty());
        }
        other => panic!("expected a drain, got {:?}", other),
    }
    assert!(engine.needs_attention().await.is_empty());
}

#[tokio::test]
async fn test_parked_decision_survives_restart() {
    let temp = TempDir::new().unwrap();
    let service = Arc::new(FakeService::new(true));
    service
        .leaves
        .lock()
        .unwrap()
        .insert("leave-a".into(), LeaveStatus::Cancelled);

    {
        let engine = open(&temp, &service);
        engine.set_offline();
        engine
            .queue_or_send_approval("leave-a", ActionKind::Approve)
            .await
            .unwrap();
        engine.set_online().await.unwrap();
        assert_eq!(engine.needs_attention().await.len(), 1);
    }

    let engine = open(&temp, &service);
    let parked = engine.needs_attention().await;
    assert_eq!(parked.len(), 1);
    assert!(parked[0]
        .last_error
        .as_deref()
        .is_some_and(|e| e.contains("cancelled")));

    engine.dismiss_action(&parked[0].id).await.unwrap();
    assert!(engine.pending_actions().await.is_empty());
}

#[tokio::test]
async fn test_offline_week_is_summarized_from_disk() {
    let temp = TempDir::new().unwrap();
    let service = Arc::new(FakeService::new(false));
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 55, 0).unwrap(),
    ));
    let store: Arc<dyn LocalStore> = Arc::new(FileStore::new(&temp.path().join("data")));
    let config = CoreConfig {
        sync: SyncPolicy::default(),
        roster: vec!["emp-1".into()],
        ..CoreConfig::default()
    };

    {
        let engine = AttendanceEngine::with_clock(
            manager(),
            config.clone(),
            store.clone(),
            service.clone(),
            clock.clone(),
        );
        engine.set_offline();
        for day in 2..=6 {
            clock.set(Utc.with_ymd_and_hms(2026, 3, day, 8, 55, 0).unwrap());
            engine
                .perform_session_action("emp-1", SessionAction::CheckIn)
                .await
                .unwrap();
            clock.set(Utc.with_ymd_and_hms(2026, 3, day, 17, 25, 0).unwrap());
            engine
                .perform_session_action("emp-1", SessionAction::CheckOut)
                .await
                .unwrap();
        }
    }

    let engine = AttendanceEngine::with_clock(manager(), config, store, service, clock);
    engine.set_offline();
    let week = DateRange::week_of(NaiveDate::from_ymd_opt(2026, 3, 2).unwrap());
    let summary = engine.get_weekly_summary("emp-1", week).await.unwrap();

    assert_eq!(summary.source, SummarySource::Folded);
    assert_eq!(summary.days_present, 5);
    // Saturday and Sunday were never recorded
    assert_eq!(summary.days_absent, 2);
    assert_eq!(summary.total_hours, dec!(42.5));

    let history = engine.history("emp-1", week).await;
    assert!(history.iter().all(|r| r.finalized && r.status == DayStatus::Present));

    let unknown = engine.get_weekly_summary("emp-2", week).await;
    assert!(unknown.is_err());
}
