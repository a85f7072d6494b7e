//! Append-only record of tracked action transitions.
//!
//! Stores opt into recording; every tracked action then appends one event
//! when it starts (`loading`) and one when it settles (`resolved` or
//! `error`). The recorder outlives individual stores and is shared across
//! them, so events carry the scope of the store that produced them.

use crate::environment::{Clock, SystemClock};
use crate::status::Status;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

/// One recorded action transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEvent {
    /// Scope name of the store that ran the action
    pub store_scope: String,
    /// Action name
    pub action: String,
    /// Parameters the action was invoked with
    pub params: Value,
    /// Status the action entered
    pub status: Status,
    /// When the transition happened
    pub timestamp: DateTime<Utc>,
}

/// Shared, append-only event log.
pub struct HistoryRecorder {
    events: Mutex<Vec<HistoryEvent>>,
    clock: Arc<dyn Clock>,
}

impl HistoryRecorder {
    /// Create an empty recorder using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty recorder with an injected clock.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            clock,
        }
    }

    /// The process-wide recorder.
    #[must_use]
    pub fn global() -> Arc<Self> {
        static GLOBAL: OnceLock<Arc<HistoryRecorder>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(Self::new())))
    }

    /// Append an event stamped with the recorder's clock.
    pub fn record(
        &self,
        store_scope: impl Into<String>,
        action: impl Into<String>,
        params: Value,
        status: Status,
    ) {
        let event = HistoryEvent {
            store_scope: store_scope.into(),
            action: action.into(),
            params,
            status,
            timestamp: self.clock.now(),
        };
        tracing::trace!(
            store = %event.store_scope,
            action = %event.action,
            status = %event.status,
            "history event recorded"
        );
        self.events().push(event);
    }

    /// Every event, oldest first.
    #[must_use]
    pub fn all_events(&self) -> Vec<HistoryEvent> {
        self.events().clone()
    }

    /// Events produced by the store with this scope, oldest first.
    #[must_use]
    pub fn events_by_store(&self, store_scope: &str) -> Vec<HistoryEvent> {
        self.events()
            .iter()
            .filter(|event| event.store_scope == store_scope)
            .cloned()
            .collect()
    }

    /// Drop every recorded event.
    pub fn clear(&self) {
        self.events().clear();
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events().is_empty()
    }

    fn events(&self) -> MutexGuard<'_, Vec<HistoryEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HistoryRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HistoryRecorder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryRecorder")
            .field("events", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn events_are_kept_in_order_and_filterable() {
        let recorder = HistoryRecorder::new();
        recorder.record("cart", "add", json!({ "sku": 1 }), Status::Loading);
        recorder.record("profile", "save", Value::Null, Status::Loading);
        recorder.record("cart", "add", json!({ "sku": 1 }), Status::Resolved);

        let all = recorder.all_events();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].store_scope, "profile");

        let cart = recorder.events_by_store("cart");
        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].status, Status::Loading);
        assert_eq!(cart[1].status, Status::Resolved);
        assert!(cart[0].timestamp <= cart[1].timestamp);
    }

    #[test]
    fn clear_empties_the_log() {
        let recorder = HistoryRecorder::new();
        recorder.record("cart", "add", Value::Null, Status::Error);
        recorder.clear();
        assert!(recorder.is_empty());
        assert!(recorder.events_by_store("cart").is_empty());
    }

    #[test]
    fn global_is_a_single_instance() {
        assert!(Arc::ptr_eq(&HistoryRecorder::global(), &HistoryRecorder::global()));
    }
}
