//! OnboardingManager: coordinates onboarding state, the checklist engine,
//! the tutorial tracker, persistence, and backend sync.
//!
//! Local changes are two-phase: the tentative state is persisted and a
//! request ticket taken under the state lock, then the request runs without
//! the lock and its canonical response is reconciled against the ticket.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::OnboardingApi;
use crate::error::{Result, StoreError, SyncError};
use crate::store::ProgressStore;

use super::checklist::{Checklist, ChecklistItem, Credit};
use super::model::{ChecklistItemUpdate, OnboardingProgress, OnboardingProgressUpdate};
use super::notify::{RewardNotice, RewardNotifier, spawn_expiry_task};
use super::stage::{Stage, Transition, TransitionKind};
use super::state::OnboardingState;
use super::sync::{Field, Reconciled, SyncLedger, Ticket, Verdict, merge, merge_superseded};
use super::tutorial::TutorialTracker;

/// Handle to a queued background sync.
pub type SyncHandle = JoinHandle<Result<Reconciled>>;

/// Result of a local change, plus the backend sync it queued (if any).
///
/// Dropping `sync` detaches the request; it still completes and reconciles.
#[derive(Debug)]
pub struct Queued<T> {
    pub value: T,
    pub sync: Option<SyncHandle>,
}

impl<T> Queued<T> {
    fn local(value: T) -> Self {
        Self { value, sync: None }
    }
}

/// Summary of onboarding progress for display.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub stage: Stage,
    pub route: &'static str,
    pub tutorial_step: u32,
    pub tutorial_progress: f64,
    pub tutorial_complete: bool,
    pub items: Vec<ChecklistItem>,
    pub checklist_progress: f64,
    pub checklist_complete: bool,
    pub total_reward: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Whether a backend record has been seen at least once.
    pub synced: bool,
}

struct Tracked {
    state: OnboardingState,
    ledger: SyncLedger,
}

/// Bounds on how often expired reward notices are swept.
const MIN_SWEEP: Duration = Duration::from_millis(10);
const MAX_SWEEP: Duration = Duration::from_secs(1);

/// Explicit onboarding state container. Share it as `Arc<OnboardingManager>`.
pub struct OnboardingManager {
    api: Arc<dyn OnboardingApi>,
    store: Arc<dyn ProgressStore>,
    notifier: Arc<RewardNotifier>,
    /// Expires reward notices; aborted when the manager is dropped.
    sweeper: JoinHandle<()>,
    checklist: Checklist,
    tutorial: TutorialTracker,
    inner: RwLock<Tracked>,
}

impl OnboardingManager {
    /// Load the persisted snapshot (or the initial state) with the default
    /// checklist catalog and tutorial.
    pub async fn open(
        api: Arc<dyn OnboardingApi>,
        store: Arc<dyn ProgressStore>,
        notifier: Arc<RewardNotifier>,
    ) -> std::result::Result<Arc<Self>, StoreError> {
        Self::open_with(
            api,
            store,
            notifier,
            Checklist::default(),
            TutorialTracker::default(),
        )
        .await
    }

    pub async fn open_with(
        api: Arc<dyn OnboardingApi>,
        store: Arc<dyn ProgressStore>,
        notifier: Arc<RewardNotifier>,
        checklist: Checklist,
        tutorial: TutorialTracker,
    ) -> std::result::Result<Arc<Self>, StoreError> {
        let state = match store.load().await? {
            Some(state) => {
                debug!(stage = %state.current_stage, "Loaded persisted onboarding state");
                state
            }
            None => OnboardingState::initial(&checklist),
        };

        let every = (notifier.duration() / 4).clamp(MIN_SWEEP, MAX_SWEEP);
        let sweeper = spawn_expiry_task(Arc::clone(&notifier), every);

        Ok(Arc::new(Self {
            api,
            store,
            notifier,
            sweeper,
            checklist,
            tutorial,
            inner: RwLock::new(Tracked {
                state,
                ledger: SyncLedger::new(),
            }),
        }))
    }

    pub fn checklist(&self) -> &Checklist {
        &self.checklist
    }

    pub fn tutorial(&self) -> &TutorialTracker {
        &self.tutorial
    }

    pub fn notifier(&self) -> &Arc<RewardNotifier> {
        &self.notifier
    }

    /// Snapshot of the current state.
    pub async fn state(&self) -> OnboardingState {
        self.inner.read().await.state.clone()
    }

    pub async fn current_stage(&self) -> Stage {
        self.inner.read().await.state.current_stage
    }

    pub async fn status(&self) -> OnboardingStatus {
        let inner = self.inner.read().await;
        let state = &inner.state;
        OnboardingStatus {
            stage: state.current_stage,
            route: state.current_stage.route(),
            tutorial_step: self.tutorial.current_step(state),
            tutorial_progress: self.tutorial.progress(state),
            tutorial_complete: self.tutorial.is_tutorial_complete(state),
            items: self.checklist.items(state),
            checklist_progress: self.checklist.progress(state),
            checklist_complete: self.checklist.is_fully_complete(state),
            total_reward: self.checklist.total_reward(state),
            completed_at: state.progress.as_ref().and_then(|p| p.completed_at),
            synced: state.progress.is_some(),
        }
    }

    // ── Stage machine ───────────────────────────────────────────────

    /// Move to `target`. Any stage is accepted; the change is persisted at
    /// once and pushed to the backend in the background.
    pub async fn advance(self: &Arc<Self>, target: Stage) -> Result<Queued<Transition>> {
        let (transition, ticket) = {
            let mut inner = self.inner.write().await;
            let mut next = inner.state.clone();
            let transition = next.update_stage(target);
            log_transition(&transition);
            if transition.kind == TransitionKind::Unchanged {
                return Ok(Queued::local(transition));
            }
            let ticket = self.commit(&mut inner, next, vec![Field::Stage]).await?;
            (transition, ticket)
        };

        let sync = self.spawn_update(ticket, OnboardingProgressUpdate::stage(target));
        Ok(Queued {
            value: transition,
            sync: Some(sync),
        })
    }

    /// Navigate to a view path. Protected views resolve to `signup` for
    /// signed-out users.
    pub async fn navigate(
        self: &Arc<Self>,
        route: &str,
        authenticated: bool,
    ) -> Result<Queued<Transition>> {
        let target = Stage::from_route(route).gate(authenticated);
        self.advance(target).await
    }

    /// Mark onboarding finished: move to the dashboard and ask the backend
    /// to stamp `completed_at`.
    pub async fn finish_onboarding(&self) -> Result<Reconciled> {
        self.push_update(OnboardingProgressUpdate {
            stage: Some(Stage::Dashboard),
            completed: true,
            ..Default::default()
        })
        .await
    }

    // ── Checklist ───────────────────────────────────────────────────

    /// Complete a checklist item.
    ///
    /// The first completion credits the reward, shows a notice, and queues
    /// a backend sync. Repeat calls return `None` and do nothing.
    pub async fn complete_item(
        self: &Arc<Self>,
        key: &str,
    ) -> Result<Queued<Option<RewardNotice>>> {
        self.checklist.check_key(key)?;

        let (notice, ticket) = {
            let mut inner = self.inner.write().await;
            if inner.state.checklist.get(key).copied().unwrap_or(false) {
                debug!(item = key, "Checklist item already complete");
                return Ok(Queued::local(None));
            }
            self.apply_checklist_item(&mut inner, key, true).await?
        };

        let this = Arc::clone(self);
        let body = ChecklistItemUpdate {
            item_key: key.to_string(),
            completed: true,
        };
        let sync = tokio::spawn(async move { this.send_checklist(ticket, body).await });
        Ok(Queued {
            value: notice,
            sync: Some(sync),
        })
    }

    /// Set one checklist flag locally and push it to the backend, waiting
    /// for the response.
    ///
    /// On failure the optimistic value stays in place and the error is
    /// returned.
    pub async fn push_checklist_item(&self, key: &str, completed: bool) -> Result<Reconciled> {
        self.checklist.check_key(key)?;

        let ticket = {
            let mut inner = self.inner.write().await;
            let (_, ticket) = self.apply_checklist_item(&mut inner, key, completed).await?;
            ticket
        };
        let body = ChecklistItemUpdate {
            item_key: key.to_string(),
            completed,
        };
        self.send_checklist(ticket, body).await
    }

    async fn apply_checklist_item(
        &self,
        inner: &mut Tracked,
        key: &str,
        completed: bool,
    ) -> Result<(Option<RewardNotice>, Ticket)> {
        let mut next = inner.state.clone();
        let credit = next.update_checklist_item(key, completed, &self.checklist);
        let ticket = self
            .commit(inner, next, vec![Field::Checklist(key.to_string())])
            .await?;
        let notice = match credit {
            Some(credit) => Some(self.announce(&inner.state, &credit).await),
            None => None,
        };
        Ok((notice, ticket))
    }

    // ── Tutorial ────────────────────────────────────────────────────

    /// Complete a tutorial step with the input it requires.
    ///
    /// Returns `false` for a step that was already complete. When the
    /// current step moves, the new step is pushed in the background.
    pub async fn complete_step(self: &Arc<Self>, step: u32, input: &str) -> Result<Queued<bool>> {
        let (ticket, current) = {
            let mut inner = self.inner.write().await;
            let mut next = inner.state.clone();
            let before = next.tutorial_step;
            if !self.tutorial.complete_step(&mut next, step, input)? {
                debug!(step, "Tutorial step already complete");
                return Ok(Queued::local(false));
            }
            info!(step, "Tutorial step completed");

            let current = next.tutorial_step;
            if current == before {
                self.persist(&mut inner, next).await?;
                return Ok(Queued::local(true));
            }
            let ticket = self
                .commit(&mut inner, next, vec![Field::TutorialStep])
                .await?;
            (ticket, current)
        };

        let sync = self.spawn_update(ticket, OnboardingProgressUpdate::tutorial_step(current));
        Ok(Queued {
            value: true,
            sync: Some(sync),
        })
    }

    // ── Sync ────────────────────────────────────────────────────────

    /// Fetch the backend record and let it replace local state, except for
    /// fields edited locally since the request went out.
    pub async fn fetch_progress(&self) -> Result<Reconciled> {
        let ticket = self.inner.write().await.ledger.begin(Vec::new());
        let result = self.api.get_progress().await;
        self.settle(ticket, result).await
    }

    /// Apply a partial update optimistically, then push it and reconcile
    /// with the backend's answer.
    ///
    /// The backend replaces its checklist wholesale, so when the update
    /// touches the checklist the full merged local checklist is sent. An
    /// empty update sends nothing and fetches the record instead.
    pub async fn push_update(&self, update: OnboardingProgressUpdate) -> Result<Reconciled> {
        if update.is_empty() {
            debug!("Empty onboarding update, fetching instead");
            return self.fetch_progress().await;
        }

        if let Some(items) = &update.checklist {
            for key in items.keys() {
                self.checklist.check_key(key)?;
            }
        }

        let (ticket, body) = {
            let mut inner = self.inner.write().await;
            let mut next = inner.state.clone();
            let mut fields = Vec::new();
            let mut credits = Vec::new();

            if let Some(stage) = update.stage {
                log_transition(&next.update_stage(stage));
                fields.push(Field::Stage);
            }
            if let Some(step) = update.tutorial_step {
                next.update_tutorial_step(step);
                fields.push(Field::TutorialStep);
            }
            if let Some(items) = &update.checklist {
                for (key, completed) in items {
                    credits.extend(next.update_checklist_item(key, *completed, &self.checklist));
                    fields.push(Field::Checklist(key.clone()));
                }
            }

            let body = OnboardingProgressUpdate {
                checklist: update.checklist.as_ref().map(|_| next.checklist.clone()),
                ..update
            };
            let ticket = self.commit(&mut inner, next, fields).await?;
            for credit in &credits {
                self.announce(&inner.state, credit).await;
            }
            (ticket, body)
        };

        let result = self.api.update_progress(&body).await;
        self.settle(ticket, result).await
    }

    /// Wipe local progress back to the initial state. The backend record is
    /// left alone; in-flight responses are discarded when they land.
    pub async fn reset(&self) -> Result<()> {
        let mut inner = self.inner.write().await;
        self.store.clear().await?;
        inner.state.reset(&self.checklist);
        inner.ledger.reset();
        info!("Onboarding state reset");
        Ok(())
    }

    fn spawn_update(
        self: &Arc<Self>,
        ticket: Ticket,
        update: OnboardingProgressUpdate,
    ) -> SyncHandle {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let result = this.api.update_progress(&update).await;
            this.settle(ticket, result).await
        })
    }

    async fn send_checklist(
        &self,
        ticket: Ticket,
        body: ChecklistItemUpdate,
    ) -> Result<Reconciled> {
        let result = self.api.update_checklist_item(&body).await;
        self.settle(ticket, result).await
    }

    async fn settle(
        &self,
        ticket: Ticket,
        result: std::result::Result<OnboardingProgress, SyncError>,
    ) -> Result<Reconciled> {
        match result {
            Ok(canonical) => self.reconcile(ticket, canonical).await,
            Err(e) => {
                self.inner.write().await.ledger.finish(&ticket);
                warn!(token = ticket.token, error = %e, "Onboarding sync failed, keeping local state");
                Err(e.into())
            }
        }
    }

    async fn reconcile(&self, ticket: Ticket, canonical: OnboardingProgress) -> Result<Reconciled> {
        let mut inner = self.inner.write().await;

        let latest = inner.ledger.last_applied();
        let verdict = inner.ledger.assess(&ticket);
        let merged = match &verdict {
            Verdict::Discard => {
                inner.ledger.finish(&ticket);
                warn!(token = ticket.token, "Discarding onboarding response issued before reset");
                return Ok(Reconciled::Stale {
                    token: ticket.token,
                    latest,
                });
            }
            Verdict::Current { keep } => merge(&inner.state, canonical, keep),
            Verdict::Superseded { take } => merge_superseded(&inner.state, canonical, take),
        };

        let mut next = inner.state.clone();
        let credits = next.set_progress(merged, &self.checklist);
        if self.tutorial.restore_finished(&mut next) {
            debug!("Tutorial marked complete from backend record");
        }
        inner.ledger.finish(&ticket);

        self.store.save(&next).await?;
        inner.state = next;
        inner.ledger.mark_applied(ticket.token);

        let state = inner.state.clone();
        match verdict {
            Verdict::Superseded { take } => {
                info!(
                    token = ticket.token,
                    latest,
                    taken = take.len(),
                    credited = credits.len(),
                    "Merged overtaken onboarding response"
                );
                Ok(Reconciled::Superseded {
                    state,
                    token: ticket.token,
                    latest,
                })
            }
            _ => {
                info!(
                    token = ticket.token,
                    stage = %state.current_stage,
                    credited = credits.len(),
                    "Onboarding state reconciled"
                );
                Ok(Reconciled::Applied(state))
            }
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────

    /// Persist `next` and make it current.
    async fn persist(
        &self,
        inner: &mut Tracked,
        next: OnboardingState,
    ) -> std::result::Result<(), StoreError> {
        self.store.save(&next).await?;
        inner.state = next;
        Ok(())
    }

    /// Persist `next`, stamp the written fields, and take a request ticket.
    async fn commit(
        &self,
        inner: &mut Tracked,
        next: OnboardingState,
        fields: Vec<Field>,
    ) -> std::result::Result<Ticket, StoreError> {
        self.persist(inner, next).await?;
        for field in &fields {
            inner.ledger.record_write(field.clone());
        }
        Ok(inner.ledger.begin(fields))
    }

    async fn announce(&self, state: &OnboardingState, credit: &Credit) -> RewardNotice {
        let total = self.checklist.total_reward(state);
        self.notifier.push(credit, total).await
    }
}

impl Drop for OnboardingManager {
    fn drop(&mut self) {
        self.sweeper.abort();
    }
}

fn log_transition(transition: &Transition) {
    let Transition { from, to, kind } = *transition;
    match kind {
        TransitionKind::Forward => info!(%from, %to, "Stage advanced"),
        TransitionKind::Unchanged => debug!(stage = %to, "Stage unchanged"),
        TransitionKind::Skip | TransitionKind::Backward => {
            warn!(%from, %to, ?kind, "Non-sequential stage transition")
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::{Mutex, Notify};

    use super::*;
    use crate::error::Error;
    use crate::onboarding::notify::{DEFAULT_NOTICE_DURATION, NoticeEvent};
    use crate::store::MemoryStore;

    /// In-memory backend with the same update rules as the real one.
    struct StubApi {
        record: Mutex<OnboardingProgress>,
        fail: AtomicBool,
        unauthorized: AtomicBool,
        calls: AtomicUsize,
        patches: AtomicUsize,
        /// Checklist requests for these keys wait before the backend
        /// processes them. The key `PROGRESS_GATE` holds PATCH requests.
        gates: Mutex<HashMap<String, Arc<Notify>>>,
        /// Signalled when a gated request reaches the backend.
        arrived: Notify,
    }

    const PROGRESS_GATE: &str = "progress";

    impl StubApi {
        fn new() -> Arc<Self> {
            let now = Utc::now();
            Arc::new(Self {
                record: Mutex::new(OnboardingProgress {
                    user_id: 1,
                    stage: Stage::Landing,
                    tutorial_step: None,
                    checklist: Default::default(),
                    completed_at: None,
                    created_at: now,
                    updated_at: now,
                }),
                fail: AtomicBool::new(false),
                unauthorized: AtomicBool::new(false),
                calls: AtomicUsize::new(0),
                patches: AtomicUsize::new(0),
                gates: Mutex::new(HashMap::new()),
                arrived: Notify::new(),
            })
        }

        async fn gate(&self, key: &str) -> Arc<Notify> {
            let notify = Arc::new(Notify::new());
            self.gates
                .lock()
                .await
                .insert(key.to_string(), Arc::clone(&notify));
            notify
        }

        async fn hold(&self, key: &str) {
            let gate = self.gates.lock().await.get(key).cloned();
            if let Some(gate) = gate {
                self.arrived.notify_one();
                gate.notified().await;
            }
        }

        fn check(&self) -> std::result::Result<(), SyncError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.unauthorized.load(Ordering::SeqCst) {
                return Err(SyncError::Unauthorized);
            }
            if self.fail.load(Ordering::SeqCst) {
                return Err(SyncError::Network {
                    reason: "connection refused".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OnboardingApi for StubApi {
        async fn get_progress(&self) -> std::result::Result<OnboardingProgress, SyncError> {
            self.check()?;
            Ok(self.record.lock().await.clone())
        }

        async fn update_progress(
            &self,
            update: &OnboardingProgressUpdate,
        ) -> std::result::Result<OnboardingProgress, SyncError> {
            self.hold(PROGRESS_GATE).await;
            self.check()?;
            self.patches.fetch_add(1, Ordering::SeqCst);
            let mut record = self.record.lock().await;
            if let Some(stage) = update.stage {
                record.stage = stage;
            }
            if let Some(step) = update.tutorial_step {
                record.tutorial_step = Some(step);
            }
            if let Some(checklist) = &update.checklist {
                record.checklist = checklist.clone();
            }
            if update.completed {
                record.completed_at = Some(Utc::now());
            }
            Ok(record.clone())
        }

        async fn update_checklist_item(
            &self,
            item: &ChecklistItemUpdate,
        ) -> std::result::Result<OnboardingProgress, SyncError> {
            self.hold(&item.item_key).await;
            self.check()?;
            let mut record = self.record.lock().await;
            record.checklist.insert(item.item_key.clone(), item.completed);
            Ok(record.clone())
        }
    }

    async fn setup() -> (Arc<OnboardingManager>, Arc<StubApi>, Arc<MemoryStore>) {
        let api = StubApi::new();
        let store = Arc::new(MemoryStore::new());
        let manager = OnboardingManager::open(
            api.clone(),
            store.clone(),
            RewardNotifier::new(DEFAULT_NOTICE_DURATION),
        )
        .await
        .unwrap();
        (manager, api, store)
    }

    async fn settle(handle: Option<SyncHandle>) -> Reconciled {
        handle.expect("sync queued").await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn fresh_manager_starts_at_landing() {
        let (manager, _, _) = setup().await;
        let status = manager.status().await;
        assert_eq!(status.stage, Stage::Landing);
        assert_eq!(status.route, "/");
        assert_eq!(status.total_reward, 0);
        assert_eq!(status.checklist_progress, 0.0);
        assert!(!status.synced);
    }

    #[tokio::test]
    async fn complete_item_credits_once_and_syncs() {
        let (manager, api, _) = setup().await;

        let first = manager.complete_item("create_project").await.unwrap();
        let notice = first.value.clone().unwrap();
        assert_eq!(notice.reward, 2);
        assert_eq!(notice.total_reward, 2);
        assert!(settle(first.sync).await.is_applied());

        let second = manager.complete_item("create_project").await.unwrap();
        assert!(second.value.is_none());
        assert!(second.sync.is_none());

        let status = manager.status().await;
        assert_eq!(status.total_reward, 2);
        assert_eq!(manager.notifier().active().await.len(), 1);
        assert_eq!(api.record.lock().await.checklist.get("create_project"), Some(&true));
    }

    #[tokio::test]
    async fn two_items_give_forty_percent() {
        let (manager, _, _) = setup().await;
        let a = manager.complete_item("create_project").await.unwrap();
        settle(a.sync).await;
        let b = manager.complete_item("upload_image").await.unwrap();
        settle(b.sync).await;

        let status = manager.status().await;
        assert_eq!(status.checklist_progress, 40.0);
        assert_eq!(status.total_reward, 4);
        assert_eq!(manager.notifier().active().await.len(), 2);
    }

    #[tokio::test]
    async fn unknown_item_is_rejected() {
        let (manager, api, store) = setup().await;
        let before = manager.state().await;

        let err = manager.complete_item("nonexistent_key").await.unwrap_err();
        assert!(matches!(err, Error::Checklist(_)));
        assert_eq!(manager.state().await, before);
        assert_eq!(store.save_count().await, 0);
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn network_failure_keeps_optimistic_value() {
        let (manager, api, store) = setup().await;
        api.fail.store(true, Ordering::SeqCst);

        let err = manager
            .push_checklist_item("generate_caption", true)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Sync(SyncError::Network { .. })));

        let state = manager.state().await;
        assert_eq!(state.checklist.get("generate_caption"), Some(&true));
        let persisted = store.load().await.unwrap().unwrap();
        assert_eq!(persisted.checklist.get("generate_caption"), Some(&true));
    }

    #[tokio::test]
    async fn unauthorized_is_surfaced() {
        let (manager, api, _) = setup().await;
        api.unauthorized.store(true, Ordering::SeqCst);
        let err = manager.fetch_progress().await.unwrap_err();
        assert!(matches!(err, Error::Sync(SyncError::Unauthorized)));
    }

    #[tokio::test]
    async fn fetch_twice_is_idempotent() {
        let (manager, api, _) = setup().await;
        {
            let mut record = api.record.lock().await;
            record.stage = Stage::Tutorial;
            record.tutorial_step = Some(2);
            record.checklist.insert("upload_image".into(), true);
        }

        manager.fetch_progress().await.unwrap();
        let first = manager.state().await;
        manager.fetch_progress().await.unwrap();
        let second = manager.state().await;

        assert_eq!(first, second);
        assert_eq!(first.current_stage, Stage::Tutorial);
        assert_eq!(first.tutorial_step, 2);
        // Reconciled completions are credited, silently.
        assert_eq!(manager.checklist().total_reward(&first), 2);
        assert!(manager.notifier().is_empty().await);
    }

    #[tokio::test]
    async fn backend_wins_on_push_response() {
        let (manager, api, _) = setup().await;
        // Another device already finished the tutorial.
        api.record.lock().await.tutorial_step = Some(3);

        let result = manager
            .push_update(OnboardingProgressUpdate::stage(Stage::Signup))
            .await
            .unwrap();
        let Reconciled::Applied(state) = result else {
            panic!("expected applied");
        };
        assert_eq!(state.current_stage, Stage::Signup);
        assert_eq!(state.tutorial_step, 3);
    }

    #[tokio::test]
    async fn skip_to_tutorial_is_accepted() {
        let (manager, api, _) = setup().await;
        let queued = manager.advance(Stage::Tutorial).await.unwrap();
        assert_eq!(queued.value.kind, TransitionKind::Skip);
        assert_eq!(manager.current_stage().await, Stage::Tutorial);

        settle(queued.sync).await;
        assert_eq!(api.record.lock().await.stage, Stage::Tutorial);
        assert_eq!(manager.current_stage().await, Stage::Tutorial);
    }

    #[tokio::test]
    async fn advance_to_same_stage_is_local_only() {
        let (manager, api, _) = setup().await;
        let queued = manager.advance(Stage::Landing).await.unwrap();
        assert_eq!(queued.value.kind, TransitionKind::Unchanged);
        assert!(queued.sync.is_none());
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn navigate_gates_protected_views() {
        let (manager, _, _) = setup().await;
        let queued = manager.navigate("/dashboard", false).await.unwrap();
        assert_eq!(queued.value.to, Stage::Signup);
        settle(queued.sync).await;

        let queued = manager.navigate("/dashboard", true).await.unwrap();
        assert_eq!(queued.value.to, Stage::Dashboard);
        settle(queued.sync).await;
    }

    #[tokio::test]
    async fn advance_failure_keeps_local_stage() {
        let (manager, api, _) = setup().await;
        api.fail.store(true, Ordering::SeqCst);
        let queued = manager.advance(Stage::Trial).await.unwrap();
        let result = queued.sync.unwrap().await.unwrap();
        assert!(result.is_err());
        assert_eq!(manager.current_stage().await, Stage::Trial);
    }

    #[tokio::test]
    async fn out_of_order_responses_do_not_regress() {
        let (manager, api, _) = setup().await;
        let caption_gate = api.gate("generate_caption").await;

        let caption = manager.complete_item("generate_caption").await.unwrap();
        let share = manager.complete_item("share_sns").await.unwrap();

        // The share response lands first and does not know about the caption.
        let applied = settle(share.sync).await;
        let Reconciled::Applied(state) = applied else {
            panic!("expected applied");
        };
        assert_eq!(state.checklist.get("generate_caption"), Some(&true));
        assert_eq!(state.checklist.get("share_sns"), Some(&true));

        // The caption response is older than the applied one; it only
        // contributes its own key.
        caption_gate.notify_one();
        let late = settle(caption.sync).await;
        assert!(matches!(late, Reconciled::Superseded { .. }));

        let state = manager.state().await;
        assert_eq!(state.checklist.get("generate_caption"), Some(&true));
        assert_eq!(state.checklist.get("share_sns"), Some(&true));
        assert_eq!(manager.checklist().total_reward(&state), 4);
    }

    #[tokio::test]
    async fn push_update_sends_full_checklist() {
        let (manager, api, _) = setup().await;
        let a = manager.complete_item("create_project").await.unwrap();
        settle(a.sync).await;

        let update = OnboardingProgressUpdate {
            checklist: Some([("upload_image".to_string(), true)].into_iter().collect()),
            ..Default::default()
        };
        manager.push_update(update).await.unwrap();

        let record = api.record.lock().await;
        assert_eq!(record.checklist.get("create_project"), Some(&true));
        assert_eq!(record.checklist.get("upload_image"), Some(&true));
    }

    #[tokio::test]
    async fn push_update_rejects_unknown_keys() {
        let (manager, api, _) = setup().await;
        let update = OnboardingProgressUpdate {
            checklist: Some([("bogus".to_string(), true)].into_iter().collect()),
            ..Default::default()
        };
        assert!(matches!(
            manager.push_update(update).await,
            Err(Error::Checklist(_))
        ));
        assert_eq!(api.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tutorial_steps_push_current_step() {
        let (manager, api, _) = setup().await;

        let one = manager.complete_step(1, "Spring collection").await.unwrap();
        assert!(one.value);
        settle(one.sync).await;
        assert_eq!(api.record.lock().await.tutorial_step, Some(2));

        let again = manager.complete_step(1, "").await.unwrap();
        assert!(!again.value);
        assert!(again.sync.is_none());

        let three = manager.complete_step(3, "shoe.png").await.unwrap();
        assert!(three.value);
        // Step 3 is last and does not move the current step.
        assert!(three.sync.is_none());

        let err = manager.complete_step(2, "neon").await.unwrap_err();
        assert!(matches!(err, Error::Tutorial(_)));

        let two = manager.complete_step(2, "gradient").await.unwrap();
        settle(two.sync).await;
        assert!(manager.status().await.tutorial_complete);
    }

    #[tokio::test]
    async fn finish_onboarding_stamps_completion() {
        let (manager, _, _) = setup().await;
        manager.finish_onboarding().await.unwrap();
        let status = manager.status().await;
        assert_eq!(status.stage, Stage::Dashboard);
        assert!(status.completed_at.is_some());
        assert!(status.synced);
    }

    #[tokio::test]
    async fn state_survives_reopen() {
        let api = StubApi::new();
        let store = Arc::new(MemoryStore::new());
        let notifier = RewardNotifier::new(DEFAULT_NOTICE_DURATION);

        let manager = OnboardingManager::open(api.clone(), store.clone(), notifier.clone())
            .await
            .unwrap();
        api.fail.store(true, Ordering::SeqCst);
        let queued = manager.complete_item("upload_image").await.unwrap();
        let _ = queued.sync.unwrap().await;
        drop(manager);

        let reopened = OnboardingManager::open(api, store, notifier).await.unwrap();
        let state = reopened.state().await;
        assert_eq!(state.checklist.get("upload_image"), Some(&true));
        assert_eq!(reopened.checklist().total_reward(&state), 2);
    }

    #[tokio::test]
    async fn reset_clears_local_state() {
        let (manager, _, store) = setup().await;
        let queued = manager.advance(Stage::Signup).await.unwrap();
        settle(queued.sync).await;

        manager.reset().await.unwrap();
        assert_eq!(manager.state().await, OnboardingState::default());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stale_response_after_reset_is_dropped() {
        let (manager, api, _) = setup().await;
        let gate = api.gate("share_sns").await;
        let queued = manager.complete_item("share_sns").await.unwrap();

        manager.reset().await.unwrap();
        gate.notify_one();
        let result = settle(queued.sync).await;
        assert!(matches!(result, Reconciled::Stale { .. }));
        assert_eq!(manager.state().await, OnboardingState::default());
    }

    #[tokio::test]
    async fn notices_auto_dismiss() {
        let api = StubApi::new();
        let store = Arc::new(MemoryStore::new());
        let notifier = RewardNotifier::new(Duration::from_millis(10));
        let mut rx = notifier.subscribe();
        let manager = OnboardingManager::open(api, store, notifier).await.unwrap();

        let queued = manager.complete_item("create_project").await.unwrap();
        let notice = queued.value.unwrap();

        let dismissed = tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if let Ok(NoticeEvent::Dismissed { id }) = rx.recv().await {
                    return id;
                }
            }
        })
        .await
        .expect("notice was never dismissed");
        assert_eq!(dismissed, notice.id);
        assert!(manager.notifier().is_empty().await);
    }

    #[tokio::test]
    async fn finish_racing_checklist_keeps_completion() {
        let (manager, api, _) = setup().await;
        let gate = api.gate(PROGRESS_GATE).await;

        let finishing = Arc::clone(&manager);
        let finish = tokio::spawn(async move { finishing.finish_onboarding().await });
        api.arrived.notified().await;

        // The checklist round trip completes while the PATCH is held.
        let item = manager.complete_item("create_project").await.unwrap();
        assert!(settle(item.sync).await.is_applied());
        assert_eq!(manager.current_stage().await, Stage::Dashboard);

        gate.notify_one();
        let outcome = finish.await.unwrap().unwrap();
        let Reconciled::Superseded { state, .. } = outcome else {
            panic!("expected superseded, got {outcome:?}");
        };
        assert_eq!(state.current_stage, Stage::Dashboard);

        let status = manager.status().await;
        assert!(status.completed_at.is_some());
        assert_eq!(status.stage, Stage::Dashboard);
        assert_eq!(status.total_reward, 2);
        assert_eq!(
            api.record.lock().await.completed_at,
            status.completed_at
        );
    }

    #[tokio::test]
    async fn empty_update_fetches_instead() {
        let (manager, api, _) = setup().await;
        api.record.lock().await.stage = Stage::Trial;

        let outcome = manager
            .push_update(OnboardingProgressUpdate::default())
            .await
            .unwrap();
        assert!(outcome.is_applied());
        assert_eq!(api.patches.load(Ordering::SeqCst), 0);
        assert_eq!(manager.current_stage().await, Stage::Trial);
    }

    #[tokio::test]
    async fn fetch_after_reset_restores_finished_tutorial() {
        let (manager, api, _) = setup().await;
        {
            let mut record = api.record.lock().await;
            record.stage = Stage::Dashboard;
            record.tutorial_step = Some(3);
        }

        manager.reset().await.unwrap();
        manager.fetch_progress().await.unwrap();
        assert!(manager.status().await.tutorial_complete);
    }
}
