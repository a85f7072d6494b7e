use super::Plugin;
use crate::store::{LoadOutcome, ReloadFn, ReloadMode, Store};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use signal_store_core::{StorageBackend, StoreState};
use std::fmt;
use std::sync::Arc;

/// Mirrors the snapshot into a [`StorageBackend`] as JSON.
///
/// On install the stored snapshot, if any, replaces the initial state. After
/// every successful load the new snapshot is written back. Storage errors
/// are logged and never fail a load.
#[derive(Clone)]
pub struct Persistence {
    storage: Arc<dyn StorageBackend>,
    key: Option<String>,
}

impl Persistence {
    /// Persist under the store's scope.
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage, key: None }
    }

    /// Persist under an explicit key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    fn key_for(&self, scope: &str) -> String {
        self.key.clone().unwrap_or_else(|| scope.to_string())
    }
}

impl fmt::Debug for Persistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Persistence")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl<S> Plugin<S> for Persistence
where
    S: StoreState + Serialize + DeserializeOwned,
{
    fn name(&self) -> &'static str {
        "persistence"
    }

    fn install(&self, store: &Store<S>) {
        let key = self.key_for(store.scope());
        let Some(raw) = self.storage.get(&key) else {
            return;
        };
        match serde_json::from_str::<S>(&raw) {
            Ok(state) => {
                tracing::debug!(store = %store.scope(), %key, "hydrated from storage");
                store.replace_state(state);
            },
            Err(error) => {
                tracing::warn!(store = %store.scope(), %key, %error, "ignoring unreadable persisted state");
            },
        }
    }

    fn wrap_reload(&self, next: ReloadFn<S>) -> ReloadFn<S> {
        let persistence = self.clone();
        Arc::new(move |store: Store<S>, mode: ReloadMode| -> BoxFuture<'static, LoadOutcome> {
            let persistence = persistence.clone();
            let pending = next(store.clone(), mode);
            async move {
                let outcome = pending.await;
                if outcome.is_loaded() {
                    let key = persistence.key_for(store.scope());
                    match serde_json::to_string(&*store.state()) {
                        Ok(raw) => persistence.storage.set(&key, raw),
                        Err(error) => {
                            tracing::warn!(store = %store.scope(), %key, %error, "failed to serialize snapshot");
                        },
                    }
                }
                outcome
            }
            .boxed()
        })
    }
}
