use dashmap::DashSet;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::api::QueueService;
use crate::core::notify::{Notification, Notifier};
use crate::error::QueueError;
use crate::models::{Patient, QueueEntry, QueueEntryId, QueueStatus, UserId, UserMap};
use crate::session::BearerToken;

/// Local view of the queue held by the staff dashboard.
///
/// `called_patients` is the subset of `queues` whose status is `called` or
/// `now_serving`. It never holds a terminal entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardState {
    queues: Vec<QueueEntry>,
    called_patients: Vec<QueueEntry>,
    user_map: UserMap,
}

impl DashboardState {
    pub fn new(queues: Vec<QueueEntry>, user_map: UserMap) -> Self {
        let called_patients = queues
            .iter()
            .filter(|entry| entry.queue_status.is_called())
            .cloned()
            .collect();
        Self {
            queues,
            called_patients,
            user_map,
        }
    }

    pub fn queues(&self) -> &[QueueEntry] {
        &self.queues
    }

    pub fn called_patients(&self) -> &[QueueEntry] {
        &self.called_patients
    }

    pub fn patient(&self, user_id: UserId) -> Option<&Patient> {
        self.user_map.get(&user_id)
    }

    pub fn status_of(&self, id: QueueEntryId) -> Option<QueueStatus> {
        self.queues
            .iter()
            .find(|entry| entry.queue_entry_id == id)
            .map(|entry| entry.queue_status)
    }

    /// Reconcile both lists after the service accepted `status` for `entry`.
    ///
    /// Merges by identifier: only matching entries change, order is kept.
    pub fn apply_status(&mut self, entry: &QueueEntry, status: QueueStatus) {
        let id = entry.queue_entry_id;
        for queued in self.queues.iter_mut().filter(|q| q.queue_entry_id == id) {
            queued.queue_status = status;
        }

        match status {
            QueueStatus::Called | QueueStatus::NowServing => {
                let mut found = false;
                for called in self
                    .called_patients
                    .iter_mut()
                    .filter(|c| c.queue_entry_id == id)
                {
                    called.queue_status = status;
                    found = true;
                }
                // The called panel only ever holds entries that are queued
                if !found {
                    if let Some(queued) = self.queues.iter().find(|q| q.queue_entry_id == id) {
                        self.called_patients.push(queued.clone());
                    }
                }
            }
            QueueStatus::Completed | QueueStatus::Cancelled => {
                self.called_patients.retain(|c| c.queue_entry_id != id);
            }
            QueueStatus::Waiting => {}
        }
    }
}

/// Staff dashboard: owns the local queue state and drives status changes
/// through a [`QueueService`].
pub struct Dashboard<S, N> {
    service: S,
    notifier: N,
    state: Mutex<DashboardState>,
    in_flight: DashSet<QueueEntryId>,
}

impl<S: QueueService, N: Notifier> Dashboard<S, N> {
    pub fn new(service: S, notifier: N) -> Self {
        Self::with_state(service, notifier, DashboardState::default())
    }

    pub fn with_state(service: S, notifier: N, state: DashboardState) -> Self {
        Self {
            service,
            notifier,
            state: Mutex::new(state),
            in_flight: DashSet::new(),
        }
    }

    /// Replace local state with data from the upstream source.
    pub async fn load(&self, queues: Vec<QueueEntry>, user_map: UserMap) {
        let state = DashboardState::new(queues, user_map);
        debug!(
            entries = state.queues.len(),
            called = state.called_patients.len(),
            "Dashboard state loaded"
        );
        *self.state.lock().await = state;
    }

    pub async fn snapshot(&self) -> DashboardState {
        self.state.lock().await.clone()
    }

    pub async fn queues(&self) -> Vec<QueueEntry> {
        self.state.lock().await.queues.clone()
    }

    pub async fn called_patients(&self) -> Vec<QueueEntry> {
        self.state.lock().await.called_patients.clone()
    }

    pub async fn patient(&self, user_id: UserId) -> Option<Patient> {
        self.state.lock().await.patient(user_id).cloned()
    }

    pub fn is_in_flight(&self, id: QueueEntryId) -> bool {
        self.in_flight.contains(&id)
    }

    /// Move `entry` to `new_status` on the queue service and reconcile local state.
    ///
    /// Exactly one notification is emitted before this returns, so callers may
    /// drop the error. On any failure local state is untouched.
    #[instrument(
        skip(self, credential, entry),
        fields(queue_entry_id = %entry.queue_entry_id, queue_status = %new_status)
    )]
    pub async fn update_status(
        &self,
        credential: Option<&BearerToken>,
        entry: &QueueEntry,
        new_status: QueueStatus,
    ) -> Result<QueueStatus, QueueError> {
        match self.try_update_status(credential, entry, new_status).await {
            Ok(()) => {
                info!("Patient status updated");
                self.notifier.notify(Notification::success(format!(
                    "Patient status updated to {}",
                    new_status.label()
                )));
                Ok(new_status)
            }
            Err(e) => {
                warn!(error = %e, "Patient status update rejected");
                self.notifier.notify(Notification::error(e.user_message()));
                Err(e)
            }
        }
    }

    async fn try_update_status(
        &self,
        credential: Option<&BearerToken>,
        entry: &QueueEntry,
        new_status: QueueStatus,
    ) -> Result<(), QueueError> {
        let token = credential.ok_or(QueueError::AuthRequired)?;
        let id = entry.queue_entry_id;
        let _guard = InFlightGuard::acquire(&self.in_flight, id)?;

        let current = self
            .state
            .lock()
            .await
            .status_of(id)
            .unwrap_or(entry.queue_status);
        if !current.can_transition_to(new_status) {
            return Err(QueueError::IllegalTransition {
                from: current,
                to: new_status,
            });
        }

        self.service.update_status(token, id, new_status).await?;

        self.state.lock().await.apply_status(entry, new_status);
        Ok(())
    }
}

/// Marks one entry as having an update outstanding until dropped.
struct InFlightGuard<'a> {
    set: &'a DashSet<QueueEntryId>,
    id: QueueEntryId,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(set: &'a DashSet<QueueEntryId>, id: QueueEntryId) -> Result<Self, QueueError> {
        if !set.insert(id) {
            return Err(QueueError::UpdateInFlight(id));
        }
        Ok(Self { set, id })
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use tokio::sync::mpsc::UnboundedReceiver;
    use tokio::sync::Notify;

    use super::*;
    use crate::api::MockQueueService;
    use crate::core::notify::{ChannelNotifier, Severity};
    use crate::error::{AUTH_REQUIRED_MESSAGE, UPDATE_FAILED_MESSAGE};
    use crate::models::user_map;

    fn entry(id: u64, status: QueueStatus) -> QueueEntry {
        QueueEntry {
            queue_entry_id: QueueEntryId(id),
            user_id: UserId(100 + id),
            queue_number: id as u32,
            queue_status: status,
            reason: format!("Visit {}", id),
        }
    }

    fn initial_state() -> DashboardState {
        let patients = (1..=4).map(|id| Patient {
            user_id: UserId(100 + id),
            name: format!("Patient {}", id),
            phone_number: format!("0912345678{}", id),
        });
        DashboardState::new(
            vec![
                entry(1, QueueStatus::Waiting),
                entry(2, QueueStatus::Called),
                entry(3, QueueStatus::NowServing),
                entry(4, QueueStatus::Completed),
            ],
            user_map(patients),
        )
    }

    fn token() -> BearerToken {
        BearerToken::new("staff-token").unwrap()
    }

    fn dashboard<S: QueueService>(
        service: S,
    ) -> (Dashboard<S, ChannelNotifier>, UnboundedReceiver<Notification>) {
        let (notifier, rx) = ChannelNotifier::new();
        (Dashboard::with_state(service, notifier, initial_state()), rx)
    }

    fn accepting_service(times: usize) -> MockQueueService {
        let mut service = MockQueueService::new();
        service
            .expect_update_status()
            .times(times)
            .returning(|_, _, _| Ok(()));
        service
    }

    fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
        let mut out = Vec::new();
        while let Ok(n) = rx.try_recv() {
            out.push(n);
        }
        out
    }

    #[test]
    fn new_state_derives_called_patients() {
        let state = initial_state();
        let called: Vec<_> = state
            .called_patients()
            .iter()
            .map(|e| e.queue_entry_id)
            .collect();
        assert_eq!(called, vec![QueueEntryId(2), QueueEntryId(3)]);
        assert_eq!(state.patient(UserId(101)).unwrap().name, "Patient 1");
    }

    #[tokio::test]
    async fn now_serving_updates_both_lists_in_place() {
        let mut service = MockQueueService::new();
        service
            .expect_update_status()
            .withf(|token, id, status| {
                token.as_str() == "staff-token"
                    && *id == QueueEntryId(2)
                    && *status == QueueStatus::NowServing
            })
            .times(1)
            .returning(|_, _, _| Ok(()));
        let (dashboard, mut rx) = dashboard(service);
        let before = dashboard.snapshot().await;

        let target = entry(2, QueueStatus::Called);
        let result = dashboard
            .update_status(Some(&token()), &target, QueueStatus::NowServing)
            .await;

        assert_eq!(result.unwrap(), QueueStatus::NowServing);
        let after = dashboard.snapshot().await;
        assert_eq!(after.queues().len(), before.queues().len());
        for (old, new) in before.queues().iter().zip(after.queues()) {
            assert_eq!(old.queue_entry_id, new.queue_entry_id);
            if old.queue_entry_id == QueueEntryId(2) {
                assert_eq!(new.queue_status, QueueStatus::NowServing);
            } else {
                assert_eq!(old, new);
            }
        }
        let called = after
            .called_patients()
            .iter()
            .find(|e| e.queue_entry_id == QueueEntryId(2))
            .unwrap();
        assert_eq!(called.queue_status, QueueStatus::NowServing);
        assert_eq!(
            drain(&mut rx),
            vec![Notification::success("Patient status updated to Now Serving")]
        );
    }

    #[tokio::test]
    async fn completed_leaves_called_panel_but_stays_queued() {
        let (dashboard, mut rx) = dashboard(accepting_service(1));

        dashboard
            .update_status(
                Some(&token()),
                &entry(2, QueueStatus::Called),
                QueueStatus::Completed,
            )
            .await
            .unwrap();

        let state = dashboard.snapshot().await;
        assert!(state
            .called_patients()
            .iter()
            .all(|e| e.queue_entry_id != QueueEntryId(2)));
        assert_eq!(state.status_of(QueueEntryId(2)), Some(QueueStatus::Completed));
        assert_eq!(drain(&mut rx)[0].severity, Severity::Success);
    }

    #[tokio::test]
    async fn calling_a_waiting_patient_adds_to_called_panel() {
        let (dashboard, _rx) = dashboard(accepting_service(1));

        dashboard
            .update_status(
                Some(&token()),
                &entry(1, QueueStatus::Waiting),
                QueueStatus::Called,
            )
            .await
            .unwrap();

        let called = dashboard.called_patients().await;
        assert_eq!(called.last().unwrap().queue_entry_id, QueueEntryId(1));
        assert_eq!(called.last().unwrap().queue_status, QueueStatus::Called);
    }

    #[tokio::test]
    async fn missing_credential_makes_no_call() {
        let mut service = MockQueueService::new();
        service.expect_update_status().never();
        let (dashboard, mut rx) = dashboard(service);
        let before = dashboard.snapshot().await;

        for status in QueueStatus::ALL {
            let result = dashboard
                .update_status(None, &entry(2, QueueStatus::Called), status)
                .await;
            assert!(matches!(result, Err(QueueError::AuthRequired)));
        }

        assert_eq!(dashboard.snapshot().await, before);
        let notifications = drain(&mut rx);
        assert_eq!(notifications.len(), QueueStatus::ALL.len());
        assert!(notifications
            .iter()
            .all(|n| *n == Notification::error(AUTH_REQUIRED_MESSAGE)));
    }

    #[tokio::test]
    async fn failed_request_leaves_state_untouched() {
        let mut service = MockQueueService::new();
        service.expect_update_status().times(1).returning(|_, _, _| {
            Err(QueueError::RequestFailed {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: "database exploded".to_string(),
            })
        });
        let (dashboard, mut rx) = dashboard(service);
        let before = dashboard.snapshot().await;

        let result = dashboard
            .update_status(
                Some(&token()),
                &entry(3, QueueStatus::NowServing),
                QueueStatus::Completed,
            )
            .await;

        assert!(matches!(result, Err(QueueError::RequestFailed { .. })));
        assert_eq!(dashboard.snapshot().await, before);
        assert!(!dashboard.is_in_flight(QueueEntryId(3)));
        assert_eq!(drain(&mut rx), vec![Notification::error(UPDATE_FAILED_MESSAGE)]);
    }

    #[tokio::test]
    async fn illegal_transition_is_rejected_locally() {
        let mut service = MockQueueService::new();
        service.expect_update_status().never();
        let (dashboard, mut rx) = dashboard(service);
        let before = dashboard.snapshot().await;

        // The caller's copy is stale; the dashboard knows entry 4 is completed
        let result = dashboard
            .update_status(
                Some(&token()),
                &entry(4, QueueStatus::Called),
                QueueStatus::NowServing,
            )
            .await;

        assert!(matches!(
            result,
            Err(QueueError::IllegalTransition {
                from: QueueStatus::Completed,
                to: QueueStatus::NowServing
            })
        ));
        assert_eq!(dashboard.snapshot().await, before);
        assert_eq!(drain(&mut rx)[0].severity, Severity::Error);
    }

    #[tokio::test]
    async fn repeated_now_serving_is_idempotent() {
        let (once, _) = dashboard(accepting_service(1));
        let (twice, _) = dashboard(accepting_service(2));
        let target = entry(2, QueueStatus::Called);

        once.update_status(Some(&token()), &target, QueueStatus::NowServing)
            .await
            .unwrap();
        for _ in 0..2 {
            twice
                .update_status(Some(&token()), &target, QueueStatus::NowServing)
                .await
                .unwrap();
        }

        assert_eq!(once.snapshot().await, twice.snapshot().await);
    }

    #[tokio::test]
    async fn unknown_entry_changes_nothing() {
        let (dashboard, _rx) = dashboard(accepting_service(2));
        let before = dashboard.snapshot().await;

        for status in [QueueStatus::Called, QueueStatus::Cancelled] {
            dashboard
                .update_status(Some(&token()), &entry(9, QueueStatus::Waiting), status)
                .await
                .unwrap();
        }

        assert_eq!(dashboard.snapshot().await, before);
    }

    #[tokio::test]
    async fn called_panel_only_holds_queued_entries() {
        let (dashboard, _rx) = dashboard(accepting_service(2));

        for (current, status) in [
            (QueueStatus::Waiting, QueueStatus::Called),
            (QueueStatus::Called, QueueStatus::NowServing),
        ] {
            dashboard
                .update_status(Some(&token()), &entry(9, current), status)
                .await
                .unwrap();
        }

        let state = dashboard.snapshot().await;
        assert!(state.called_patients().iter().all(|called| state
            .queues()
            .iter()
            .any(|queued| queued.queue_entry_id == called.queue_entry_id)));
        assert_eq!(state.status_of(QueueEntryId(9)), None);
    }

    #[tokio::test]
    async fn cancelling_a_called_patient_clears_the_panel() {
        let (dashboard, mut rx) = dashboard(accepting_service(1));

        dashboard
            .update_status(
                Some(&token()),
                &entry(2, QueueStatus::Called),
                QueueStatus::Cancelled,
            )
            .await
            .unwrap();

        let state = dashboard.snapshot().await;
        assert!(state
            .called_patients()
            .iter()
            .all(|e| e.queue_entry_id != QueueEntryId(2)));
        assert!(state
            .called_patients()
            .iter()
            .all(|e| !e.queue_status.is_terminal()));
        assert_eq!(state.status_of(QueueEntryId(2)), Some(QueueStatus::Cancelled));
        assert_eq!(
            drain(&mut rx),
            vec![Notification::success("Patient status updated to Cancelled")]
        );
    }

    #[tokio::test]
    async fn reasserting_waiting_touches_only_the_queue() {
        let (dashboard, _rx) = dashboard(accepting_service(1));
        let before = dashboard.snapshot().await;

        let result = dashboard
            .update_status(Some(&token()), &entry(1, QueueStatus::Waiting), QueueStatus::Waiting)
            .await;

        assert_eq!(result.unwrap(), QueueStatus::Waiting);
        let after = dashboard.snapshot().await;
        assert_eq!(after.called_patients(), before.called_patients());
        assert_eq!(after.status_of(QueueEntryId(1)), Some(QueueStatus::Waiting));
        assert_eq!(after, before);
    }

    struct GatedService {
        blocked: QueueEntryId,
        gate: Notify,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl QueueService for GatedService {
        async fn update_status(
            &self,
            _token: &BearerToken,
            id: QueueEntryId,
            _status: QueueStatus,
        ) -> Result<(), QueueError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if id == self.blocked {
                self.gate.notified().await;
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn concurrent_update_for_same_entry_is_rejected() {
        let service = GatedService {
            blocked: QueueEntryId(2),
            gate: Notify::new(),
            calls: AtomicUsize::new(0),
        };
        let (dashboard, _rx) = dashboard(service);
        let token = token();
        let blocked = entry(2, QueueStatus::Called);
        let other = entry(3, QueueStatus::NowServing);

        let first = dashboard.update_status(Some(&token), &blocked, QueueStatus::NowServing);
        let others = async {
            while !dashboard.is_in_flight(QueueEntryId(2)) {
                tokio::task::yield_now().await;
            }
            let duplicate = dashboard
                .update_status(Some(&token), &blocked, QueueStatus::Completed)
                .await;
            let unrelated = dashboard
                .update_status(Some(&token), &other, QueueStatus::Completed)
                .await;
            dashboard.service.gate.notify_one();
            (duplicate, unrelated)
        };

        let (first, (duplicate, unrelated)) = tokio::join!(first, others);

        assert_eq!(first.unwrap(), QueueStatus::NowServing);
        assert!(matches!(duplicate, Err(QueueError::UpdateInFlight(QueueEntryId(2)))));
        assert_eq!(unrelated.unwrap(), QueueStatus::Completed);
        assert_eq!(dashboard.service.calls.load(Ordering::SeqCst), 2);
        assert!(!dashboard.is_in_flight(QueueEntryId(2)));

        let state = dashboard.snapshot().await;
        assert_eq!(state.status_of(QueueEntryId(2)), Some(QueueStatus::NowServing));
        assert!(state.called_patients().iter().all(|e| !e.queue_status.is_terminal()));
    }
}
