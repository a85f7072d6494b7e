//! Per-action status tracking.
//!
//! Each action name gets its own status and error cells, created lazily the
//! first time the name is seen. Clearing a name drops its cells from the
//! registry and detaches their observers; an action still in flight for
//! that name then settles silently.

use crate::status_cell::StatusCell;
use crate::store::{Store, lock};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde_json::Value;
use signal_store_core::{Signal, Status, StoreError, StoreState, Subscription};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

/// Status view of one tracked action.
#[derive(Clone)]
pub struct ActionStatus {
    cell: StatusCell,
}

impl ActionStatus {
    fn new() -> Self {
        Self {
            cell: StatusCell::new(),
        }
    }

    /// Observed status; a populated error slot reads as `Error`.
    #[must_use]
    pub fn status(&self) -> Status {
        self.cell.status()
    }

    /// Last error of this action.
    #[must_use]
    pub fn error(&self) -> Option<StoreError> {
        self.cell.error()
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

    /// Observable status cell, derived the same way as
    /// [`Store::status_signal`].
    #[must_use]
    pub fn status_signal(&self) -> Signal<Status> {
        self.cell.status_signal()
    }

    /// Observable error cell.
    #[must_use]
    pub fn error_signal(&self) -> Signal<Option<StoreError>> {
        self.cell.error_signal()
    }
}

impl fmt::Debug for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionStatus")
            .field("status", &self.status())
            .field("error", &self.error())
            .finish()
    }
}

pub(crate) struct ActionEntry {
    view: ActionStatus,
    diagnostics: Mutex<Option<Subscription>>,
}

impl ActionEntry {
    fn new(scope: &str, name: &str) -> Self {
        let view = ActionStatus::new();
        let scope = scope.to_string();
        let action = name.to_string();
        let diagnostics = view.status_signal().subscribe(move |status| {
            tracing::debug!(store = %scope, action = %action, %status, "action status changed");
        });
        Self {
            view,
            diagnostics: Mutex::new(Some(diagnostics)),
        }
    }

    pub(crate) fn view(&self) -> ActionStatus {
        self.view.clone()
    }

    pub(crate) fn begin(&self) {
        self.view.cell.begin();
    }

    pub(crate) fn resolve(&self) {
        self.view.cell.resolve();
    }

    pub(crate) fn fail(&self, error: StoreError) {
        self.view.cell.fail(error);
    }

    fn detach(&self) {
        drop(lock(&self.diagnostics).take());
        self.view.cell.detach();
    }
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, Arc<ActionEntry>>,
    /// Set once the owning store is destroyed
    closed: bool,
}

pub(crate) struct ActionRegistry {
    scope: String,
    entries: Mutex<Entries>,
}

impl ActionRegistry {
    pub(crate) fn new(scope: String) -> Self {
        Self {
            scope,
            entries: Mutex::new(Entries::default()),
        }
    }

    /// Entry for `name`, created on first access.
    ///
    /// A closed registry hands out detached entries that are never stored.
    pub(crate) fn entry(&self, name: &str) -> Arc<ActionEntry> {
        let mut entries = lock(&self.entries);
        if entries.closed {
            let entry = ActionEntry::new(&self.scope, name);
            entry.detach();
            return Arc::new(entry);
        }
        if let Some(entry) = entries.by_name.get(name) {
            return Arc::clone(entry);
        }
        let entry = Arc::new(ActionEntry::new(&self.scope, name));
        entries.by_name.insert(name.to_string(), Arc::clone(&entry));
        entry
    }

    /// Whether `entry` is still the registered entry for `name`.
    pub(crate) fn is_current(&self, name: &str, entry: &Arc<ActionEntry>) -> bool {
        lock(&self.entries)
            .by_name
            .get(name)
            .is_some_and(|current| Arc::ptr_eq(current, entry))
    }

    pub(crate) fn clear(&self, name: &str) -> bool {
        let removed = lock(&self.entries).by_name.remove(name);
        removed.is_some_and(|entry| {
            entry.detach();
            true
        })
    }

    /// Detach every entry and stop registering new ones.
    pub(crate) fn close(&self) {
        let drained: Vec<_> = {
            let mut entries = lock(&self.entries);
            entries.closed = true;
            entries.by_name.drain().map(|(_, entry)| entry).collect()
        };
        for entry in drained {
            entry.detach();
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = lock(&self.entries).by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

type ActionFn<P, T> = Arc<dyn Fn(P) -> BoxFuture<'static, anyhow::Result<T>> + Send + Sync>;

/// An async function whose calls are tracked under a fixed action name.
///
/// Created by [`Store::wrap_action`].
pub struct TrackedAction<S: StoreState, P, T> {
    store: Store<S>,
    name: Arc<str>,
    action: ActionFn<P, T>,
}

impl<S, P, T> TrackedAction<S, P, T>
where
    S: StoreState,
    P: Serialize + Send + 'static,
    T: Send + 'static,
{
    pub(crate) fn new<F, Fut>(store: Store<S>, name: String, action: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        Self {
            store,
            name: name.into(),
            action: Arc::new(move |params: P| action(params).boxed()),
        }
    }

    /// Invoke the action.
    ///
    /// # Errors
    ///
    /// Returns the action's normalized error after it has been recorded in
    /// the action status.
    pub async fn call(&self, params: P) -> Result<T, StoreError> {
        let recorded = serde_json::to_value(&params).unwrap_or_else(|error| {
            tracing::warn!(
                store = %self.store.scope(),
                action = %self.name,
                %error,
                "action params are not serializable, recording null"
            );
            Value::Null
        });
        let pending = (self.action)(params);
        self.store.run_action(&self.name, recorded, pending).await
    }

    /// Tracked name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Status of this action.
    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.store.action_status(&self.name)
    }
}

impl<S: StoreState, P, T> Clone for TrackedAction<S, P, T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            name: Arc::clone(&self.name),
            action: Arc::clone(&self.action),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn entries_are_created_once_per_name() {
        let registry = ActionRegistry::new("cart".into());
        let first = registry.entry("add");
        let second = registry.entry("add");

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.names(), vec!["add".to_string()]);
    }

    #[test]
    fn failed_entry_reads_as_error_and_begin_clears_it() {
        let registry = ActionRegistry::new("cart".into());
        let entry = registry.entry("add");

        entry.fail(StoreError::failed("nope"));
        assert!(entry.view().is_error());
        assert_eq!(entry.view().error().map(|e| e.message()), Some("nope".to_string()));

        entry.begin();
        assert!(entry.view().is_loading());
        assert!(entry.view().error().is_none());
    }

    #[test]
    fn status_signal_is_derived_and_only_emits_changes() {
        let registry = ActionRegistry::new("cart".into());
        let entry = registry.entry("add");
        let view = entry.view();
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let _subscription = view.status_signal().subscribe(move |status| {
            sink.lock().expect("sink").push(*status);
        });

        entry.begin();
        entry.fail(StoreError::failed("nope"));
        assert_eq!(view.status_signal().get(), view.status());
        entry.begin();
        entry.resolve();
        entry.resolve();

        assert_eq!(
            *emitted.lock().expect("sink"),
            vec![Status::Loading, Status::Error, Status::Loading, Status::Resolved]
        );
    }

    #[test]
    fn closed_registry_hands_out_untracked_entries() {
        let registry = ActionRegistry::new("cart".into());
        let _ = registry.entry("add");
        registry.close();

        let late = registry.entry("add");
        assert!(late.view().is_idle());
        assert!(!registry.is_current("add", &late));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn clearing_detaches_observers_and_forgets_the_entry() {
        let registry = ActionRegistry::new("cart".into());
        let entry = registry.entry("add");
        let view = entry.view();
        let _subscription = view.status_signal().subscribe(|_| {});
        assert_eq!(view.status_signal().observer_count(), 2);

        assert!(registry.clear("add"));
        assert_eq!(view.status_signal().observer_count(), 0);
        assert!(!registry.is_current("add", &entry));
        assert!(!registry.clear("add"));
    }
}
