//! The store runtime.
//!
//! A [`Store`] owns one snapshot of state, the status/error machine around
//! it, a TTL scheduler, a map of tracked action statuses and any background
//! tasks its plugins started. Handles are cheap to clone; the store is torn
//! down when [`Store::destroy`] is called or the last handle is dropped.

use crate::action::{ActionRegistry, ActionStatus, TrackedAction};
use crate::metrics::{
    ACTION_FAILED, ACTION_TOTAL, LOAD_DURATION, RELOAD_FAILED, RELOAD_SUPERSEDED, RELOAD_TOTAL,
    TTL_FIRED,
};
use crate::status_cell::StatusCell;
use crate::ttl::{TtlScheduler, remaining_delay};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use signal_store_core::{
    HistoryRecorder, Merge, Signal, Status, StoreError, StoreState, Subscription, deep_freeze,
};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Action name under which [`Store::force_reload`] is tracked.
pub const FORCE_RELOAD_ACTION: &str = "forceReload";

/// Bound loader: dependencies are already applied.
pub type LoaderFn<S> =
    Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<<S as Merge>::Patch>> + Send + Sync>;

/// One stage of the reload pipeline.
///
/// The innermost stage performs the load; plugins wrap it.
pub type ReloadFn<S> = Arc<dyn Fn(Store<S>, ReloadMode) -> BoxFuture<'static, LoadOutcome> + Send + Sync>;

/// Builder-registered action with its dependencies applied.
pub(crate) type BoundAction<S> =
    Arc<dyn Fn(Store<S>, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

/// Selector projecting a snapshot into a JSON value.
pub(crate) type SelectorFn<S> = Arc<dyn Fn(&S) -> Value + Send + Sync>;

/// How a reload was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMode {
    /// Regular reload; plugins may skip it
    Normal,
    /// Forced reload; cache checks are bypassed
    Force,
    /// TTL expiry; the data is known stale, so cache checks are bypassed
    Expired,
}

/// Result of running the reload pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// The loader ran and its result was applied
    Loaded,
    /// A plugin (or a destroyed store) skipped the load
    Skipped,
    /// The loader ran but a newer load started meanwhile; the result was dropped
    Superseded,
    /// The loader failed; the error is in the store's error slot
    Failed(StoreError),
}

impl LoadOutcome {
    /// Whether the loader's result was applied.
    #[must_use]
    pub const fn is_loaded(&self) -> bool {
        matches!(self, Self::Loaded)
    }
}

/// What [`Store::resume_ttl`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlResume {
    /// A reload is scheduled after the remaining delay
    Rescheduled(Duration),
    /// The TTL had already expired; a reload was started immediately
    ReloadTriggered,
    /// TTL disabled, store not resolved, or nothing fetched yet
    Inactive,
}

/// Everything needed to assemble a live store.
pub(crate) struct StoreParts<S: StoreState> {
    pub scope: String,
    pub initial_state: Arc<S>,
    pub loader: LoaderFn<S>,
    pub pipeline: ReloadFn<S>,
    pub ttl: Duration,
    pub actions: HashMap<String, BoundAction<S>>,
    pub selectors: Vec<(String, SelectorFn<S>)>,
    pub history: Option<Arc<HistoryRecorder>>,
    pub runtime: Handle,
}

pub(crate) struct StoreInner<S: StoreState> {
    scope: String,
    state: Signal<Arc<S>>,
    status: StatusCell,
    loader: LoaderFn<S>,
    pipeline: ReloadFn<S>,
    ttl: TtlScheduler,
    load_seq: AtomicU64,
    actions: ActionRegistry,
    bound_actions: HashMap<String, BoundAction<S>>,
    selectors: HashMap<String, Signal<Value>>,
    history: Option<Arc<HistoryRecorder>>,
    runtime: Handle,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    teardown: Mutex<Vec<Box<dyn FnOnce() + Send>>>,
    destroyed: AtomicBool,
}

impl<S: StoreState> StoreInner<S> {
    fn shutdown(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.ttl.cancel();
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
        self.actions.close();
        let callbacks: Vec<_> = lock(&self.teardown).drain(..).collect();
        for callback in callbacks {
            callback();
        }
        tracing::debug!(store = %self.scope, "store destroyed");
    }
}

impl<S: StoreState> Drop for StoreInner<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Handle to a live store.
///
/// Cloning shares the store. See the crate documentation for an overview.
pub struct Store<S: StoreState> {
    inner: Arc<StoreInner<S>>,
}

impl<S: StoreState> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StoreState> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("scope", &self.inner.scope)
            .field("status", &self.status())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Non-owning store handle, used by timers and background tasks.
pub struct WeakStore<S: StoreState> {
    inner: Weak<StoreInner<S>>,
}

impl<S: StoreState> WeakStore<S> {
    /// Upgrade to a live handle, unless the store is gone or destroyed.
    #[must_use]
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner
            .upgrade()
            .filter(|inner| !inner.destroyed.load(Ordering::Acquire))
            .map(|inner| Store { inner })
    }
}

impl<S: StoreState> Clone for WeakStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<S: StoreState> Store<S> {
    pub(crate) fn assemble(parts: StoreParts<S>) -> Self {
        let StoreParts {
            scope,
            initial_state,
            loader,
            pipeline,
            ttl,
            actions,
            selectors,
            history,
            runtime,
        } = parts;

        deep_freeze(&*initial_state);
        let state = Signal::new(initial_state);
        let selectors = selectors
            .into_iter()
            .map(|(name, select)| {
                let derived = state.map(move |snapshot: &Arc<S>| select(snapshot.as_ref()));
                (name, derived)
            })
            .collect();

        Self {
            inner: Arc::new(StoreInner {
                actions: ActionRegistry::new(scope.clone()),
                scope,
                state,
                status: StatusCell::new(),
                loader,
                pipeline,
                ttl: TtlScheduler::new(ttl),
                load_seq: AtomicU64::new(0),
                bound_actions: actions,
                selectors,
                history,
                runtime,
                tasks: Mutex::new(Vec::new()),
                teardown: Mutex::new(Vec::new()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Scope name identifying this store in logs, history and storage.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.inner.scope
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    /// Current snapshot.
    #[must_use]
    pub fn state(&self) -> Arc<S> {
        self.inner.state.get()
    }

    /// Read the current snapshot through a closure.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.inner.state.with(|snapshot| f(snapshot.as_ref()))
    }

    /// Observable snapshot cell.
    #[must_use]
    pub fn state_signal(&self) -> Signal<Arc<S>> {
        self.inner.state.clone()
    }

    /// Merge `patch` into the current snapshot and publish the result.
    ///
    /// The merge builds a new snapshot; the previous one is left untouched
    /// for anyone still holding it. The new snapshot is deep-frozen before
    /// observers see it.
    pub fn update_state(&self, patch: S::Patch) {
        let scope = &self.inner.scope;
        self.inner.state.update(|current| {
            let next = current.merge(patch);
            deep_freeze(&next);
            tracing::debug!(store = %scope, state = ?next, "state updated");
            *current = Arc::new(next);
        });
    }

    /// Replace the snapshot wholesale.
    pub fn replace_state(&self, state: S) {
        deep_freeze(&state);
        tracing::debug!(store = %self.inner.scope, state = ?state, "state replaced");
        self.inner.state.set(Arc::new(state));
    }

    /// Observable projection of the snapshot.
    #[must_use]
    pub fn derive<U, F>(&self, f: F) -> Signal<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&S) -> U + Send + Sync + 'static,
    {
        self.inner.state.map(move |snapshot: &Arc<S>| f(snapshot.as_ref()))
    }

    /// Current value of a named selector.
    #[must_use]
    pub fn select(&self, name: &str) -> Option<Value> {
        self.inner.selectors.get(name).map(Signal::get)
    }

    /// Observable cell of a named selector.
    #[must_use]
    pub fn selector(&self, name: &str) -> Option<Signal<Value>> {
        self.inner.selectors.get(name).cloned()
    }

    // ------------------------------------------------------------------
    // Status & error
    // ------------------------------------------------------------------

    /// Observed status. A populated error slot always reads as `Error`.
    #[must_use]
    pub fn status(&self) -> Status {
        self.inner.status.status()
    }

    /// Observable status cell.
    #[must_use]
    pub fn status_signal(&self) -> Signal<Status> {
        self.inner.status.status_signal()
    }

    /// Last error, if any.
    #[must_use]
    pub fn error(&self) -> Option<StoreError> {
        self.inner.status.error()
    }

    /// Observable error cell.
    #[must_use]
    pub fn error_signal(&self) -> Signal<Option<StoreError>> {
        self.inner.status.error_signal()
    }

    /// Check if idle
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.status().is_idle()
    }

    /// Check if loading
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status().is_loading()
    }

    /// Check if resolved
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.status().is_resolved()
    }

    /// Check if failed
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status().is_error()
    }

    /// Put an error in the error slot without touching the raw status.
    pub fn set_error(&self, error: StoreError) {
        tracing::debug!(store = %self.inner.scope, %error, "error set");
        self.inner.status.set_error(error);
    }

    /// Clear the error slot without reloading.
    ///
    /// A store whose last load failed goes back to `Idle`; any other raw
    /// status is kept.
    pub fn clear_error(&self) {
        self.inner.status.clear_error();
        tracing::debug!(store = %self.inner.scope, status = %self.status(), "error cleared");
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Reload through the plugin pipeline.
    ///
    /// Never fails: a loader error ends up in the error slot and is also
    /// returned as [`LoadOutcome::Failed`] for callers that care.
    #[tracing::instrument(skip(self), fields(store = %self.inner.scope))]
    pub async fn reload(&self) -> LoadOutcome {
        (self.inner.pipeline)(self.clone(), ReloadMode::Normal).await
    }

    /// Reload, bypassing cache checks, tracked as the `forceReload` action.
    ///
    /// # Errors
    ///
    /// Returns the normalized loader error after recording it in both the
    /// store's error slot and the `forceReload` action status, or
    /// [`StoreError::Destroyed`] if the store was torn down.
    #[tracing::instrument(skip(self), fields(store = %self.inner.scope))]
    pub async fn force_reload(&self) -> Result<(), StoreError> {
        let pipeline = Arc::clone(&self.inner.pipeline);
        let store = self.clone();
        self.run_action(FORCE_RELOAD_ACTION, Value::Null, async move {
            match pipeline(store, ReloadMode::Force).await {
                LoadOutcome::Failed(error) => Err(anyhow::Error::new(error)),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn reload_expired(&self) -> LoadOutcome {
        (self.inner.pipeline)(self.clone(), ReloadMode::Expired).await
    }

    /// Innermost pipeline stage: run the loader and apply its result.
    pub(crate) async fn load(self, mode: ReloadMode) -> LoadOutcome {
        if self.is_destroyed() {
            return LoadOutcome::Skipped;
        }
        let scope = self.inner.scope.clone();

        self.inner.ttl.cancel();
        let seq = self.inner.load_seq.fetch_add(1, Ordering::AcqRel) + 1;
        self.inner.status.begin();
        metrics::counter!(RELOAD_TOTAL, "store" => scope.clone()).increment(1);
        tracing::debug!(store = %scope, ?mode, seq, "load started");

        let started = Instant::now();
        let pending = (self.inner.loader)();
        let result = match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(result) => result.map_err(StoreError::from),
            Err(payload) => Err(StoreError::from_panic(payload.as_ref())),
        };
        metrics::histogram!(LOAD_DURATION, "store" => scope.clone()).record(started.elapsed().as_secs_f64());

        if self.inner.load_seq.load(Ordering::Acquire) != seq {
            tracing::debug!(store = %scope, seq, "discarding result of superseded load");
            metrics::counter!(RELOAD_SUPERSEDED, "store" => scope).increment(1);
            return LoadOutcome::Superseded;
        }
        if self.is_destroyed() {
            return LoadOutcome::Skipped;
        }

        match result {
            Ok(patch) => {
                self.update_state(patch);
                self.inner.ttl.record_fetch(Instant::now());
                self.inner.status.resolve();
                tracing::debug!(store = %scope, seq, "load resolved");
                let ttl = self.inner.ttl.ttl();
                if !ttl.is_zero() && !self.inner.ttl.is_paused() {
                    self.schedule_ttl(ttl);
                }
                LoadOutcome::Loaded
            },
            Err(error) => {
                tracing::warn!(store = %scope, seq, %error, "load failed");
                metrics::counter!(RELOAD_FAILED, "store" => scope).increment(1);
                self.inner.status.fail(error.clone());
                LoadOutcome::Failed(error)
            },
        }
    }

    // ------------------------------------------------------------------
    // TTL
    // ------------------------------------------------------------------

    /// Configured TTL; zero means disabled.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.inner.ttl.ttl()
    }

    /// When the last successful load completed.
    #[must_use]
    pub fn last_fetched_at(&self) -> Option<Instant> {
        self.inner.ttl.last_fetch()
    }

    /// Whether the last successful load completed less than `window` ago.
    #[must_use]
    pub fn fetched_within(&self, window: Duration) -> bool {
        self.last_fetched_at()
            .is_some_and(|fetched| fetched.elapsed() < window)
    }

    /// When the pending TTL reload fires, if one is scheduled.
    #[must_use]
    pub fn ttl_deadline(&self) -> Option<Instant> {
        self.inner.ttl.deadline()
    }

    /// Whether TTL scheduling is paused.
    #[must_use]
    pub fn is_ttl_paused(&self) -> bool {
        self.inner.ttl.is_paused()
    }

    /// Cancel the pending TTL reload. The last fetch time is kept.
    pub fn pause_ttl(&self) {
        self.inner.ttl.pause();
        tracing::debug!(store = %self.inner.scope, "ttl paused");
    }

    /// Resume TTL scheduling relative to the last successful fetch.
    ///
    /// Time spent paused counts against the TTL: if it has already expired
    /// a reload starts immediately instead of being scheduled.
    pub fn resume_ttl(&self) -> TtlResume {
        self.inner.ttl.resume();
        let ttl = self.inner.ttl.ttl();
        let last_fetch = self.inner.ttl.last_fetch();

        let outcome = match last_fetch {
            Some(fetched) if !ttl.is_zero() && self.is_resolved() && !self.is_destroyed() => {
                match remaining_delay(ttl, fetched, Instant::now()) {
                    Some(remaining) => {
                        self.schedule_ttl(remaining);
                        TtlResume::Rescheduled(remaining)
                    },
                    None => {
                        self.inner.ttl.cancel();
                        let store = self.clone();
                        self.inner.runtime.spawn(async move {
                            store.reload_expired().await;
                        });
                        TtlResume::ReloadTriggered
                    },
                }
            },
            _ => TtlResume::Inactive,
        };
        tracing::debug!(store = %self.inner.scope, ?outcome, "ttl resumed");
        outcome
    }

    fn schedule_ttl(&self, delay: Duration) {
        let weak = self.downgrade();
        let scope = self.inner.scope.clone();
        self.inner.ttl.arm(&self.inner.runtime, delay, move |timer| async move {
            let Some(store) = weak.upgrade() else {
                return;
            };
            if !store.inner.ttl.disarm(timer) {
                return;
            }
            metrics::counter!(TTL_FIRED, "store" => scope.clone()).increment(1);
            tracing::debug!(store = %scope, "ttl expired, reloading");
            store.reload_expired().await;
        });
        tracing::trace!(
            store = %self.inner.scope,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "ttl scheduled"
        );
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Run `action` as the tracked action `name`.
    ///
    /// The action's status goes `loading` then `resolved` or `error`,
    /// independently of the store's own status. With history enabled, both
    /// transitions are recorded with `params`.
    ///
    /// # Errors
    ///
    /// Returns the normalized action error (after recording it under
    /// `name`), or [`StoreError::Destroyed`] if the store was torn down.
    pub async fn run_action<T, Fut>(&self, name: &str, params: Value, action: Fut) -> Result<T, StoreError>
    where
        Fut: Future<Output = anyhow::Result<T>>,
    {
        if self.is_destroyed() {
            return Err(StoreError::Destroyed(self.inner.scope.clone()));
        }
        let scope = self.inner.scope.clone();
        let entry = self.inner.actions.entry(name);
        entry.begin();
        self.record_history(name, &params, Status::Loading);
        metrics::counter!(ACTION_TOTAL, "store" => scope.clone(), "action" => name.to_string())
            .increment(1);

        let result = match AssertUnwindSafe(action).catch_unwind().await {
            Ok(result) => result.map_err(StoreError::from),
            Err(payload) => Err(StoreError::from_panic(payload.as_ref())),
        };

        // The entry may have been cleared (or replaced) while the action ran.
        let tracked = self.inner.actions.is_current(name, &entry);
        match result {
            Ok(value) => {
                if tracked {
                    entry.resolve();
                    self.record_history(name, &params, Status::Resolved);
                }
                Ok(value)
            },
            Err(error) => {
                metrics::counter!(ACTION_FAILED, "store" => scope.clone(), "action" => name.to_string())
                    .increment(1);
                if tracked {
                    tracing::warn!(store = %scope, action = name, %error, "action failed");
                    entry.fail(error.clone());
                    self.record_history(name, &params, Status::Error);
                }
                Err(error)
            },
        }
    }

    /// Wrap `action` so every call is tracked under `name`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let save = store.wrap_action("save", move |name: String| async move {
    ///     api.save(&name).await?;
    ///     Ok(())
    /// });
    /// save.call("ada".to_string()).await?;
    /// assert!(store.action_status("save").is_resolved());
    /// ```
    #[must_use]
    pub fn wrap_action<P, T, F, Fut>(&self, name: impl Into<String>, action: F) -> TrackedAction<S, P, T>
    where
        P: Serialize + Send + 'static,
        T: Send + 'static,
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        TrackedAction::new(self.clone(), name.into(), action)
    }

    /// Run an action registered on the builder.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownAction`] if no action named `name` was
    /// registered, otherwise whatever [`Store::run_action`] returns.
    pub async fn dispatch(&self, name: &str, params: Value) -> Result<Value, StoreError> {
        let Some(action) = self.inner.bound_actions.get(name).cloned() else {
            return Err(StoreError::UnknownAction(name.to_string()));
        };
        let pending = action(self.clone(), params.clone());
        self.run_action(name, params, pending).await
    }

    /// Names of the actions registered on the builder, sorted.
    #[must_use]
    pub fn action_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.bound_actions.keys().cloned().collect();
        names.sort();
        names
    }

    /// Status of the tracked action `name`, created on first access.
    ///
    /// A destroyed store returns an idle view that is not tracked.
    #[must_use]
    pub fn action_status(&self, name: &str) -> ActionStatus {
        self.inner.actions.entry(name).view()
    }

    /// Stop tracking `name`.
    ///
    /// Observers of the action's cells are detached and no status for
    /// `name` is emitted afterwards, even by an action still in flight.
    /// Returns whether `name` was tracked.
    pub fn clear_action_status(&self, name: &str) -> bool {
        self.inner.actions.clear(name)
    }

    /// Names of the currently tracked actions, sorted.
    #[must_use]
    pub fn tracked_actions(&self) -> Vec<String> {
        self.inner.actions.names()
    }

    /// History recorder this store writes to, if any.
    #[must_use]
    pub fn history(&self) -> Option<Arc<HistoryRecorder>> {
        self.inner.history.clone()
    }

    fn record_history(&self, action: &str, params: &Value, status: Status) {
        if let Some(history) = &self.inner.history {
            history.record(self.inner.scope.clone(), action, params.clone(), status);
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Non-owning handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakStore<S> {
        WeakStore {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Spawn a background task owned by this store; it is aborted on destroy.
    pub fn spawn_owned<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = self.inner.runtime.spawn(task);
        if self.is_destroyed() {
            handle.abort();
            return;
        }
        let mut tasks = lock(&self.inner.tasks);
        tasks.retain(|task| !task.is_finished());
        tasks.push(handle);
    }

    /// Register a callback to run when the store is destroyed.
    pub fn on_destroy(&self, callback: impl FnOnce() + Send + 'static) {
        if self.is_destroyed() {
            callback();
            return;
        }
        lock(&self.inner.teardown).push(Box::new(callback));
    }

    /// Keep `subscription` alive until the store is destroyed.
    pub fn retain_subscription(&self, subscription: Subscription) {
        self.on_destroy(move || drop(subscription));
    }

    /// Tear the store down: cancel timers and owned tasks, clear every
    /// tracked action and run destroy callbacks. Idempotent.
    pub fn destroy(&self) {
        self.inner.shutdown();
    }

    /// Whether [`Store::destroy`] ran.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    pub(crate) fn spawn_initial_load(&self) {
        let store = self.clone();
        self.inner.runtime.spawn(async move {
            store.reload().await;
        });
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
