//! Binding a store to application navigation.
//!
//! A store created with a navigation source remembers the URL active at
//! creation. When a navigation ends somewhere else its TTL is paused; when
//! a navigation ends back on that URL the TTL resumes, reloading right away
//! if the data went stale in the meantime.

use crate::store::Store;
use signal_store_core::{NavigationEvent, NavigationSource, StoreState};
use tokio::sync::broadcast::error::RecvError;

pub(crate) fn bind_navigation<S: StoreState>(store: &Store<S>, navigation: &dyn NavigationSource) {
    let origin = navigation.current_url();
    let mut events = navigation.subscribe();
    let weak = store.downgrade();
    let scope = store.scope().to_string();

    tracing::debug!(store = %scope, %origin, "bound to navigation");
    store.spawn_owned(async move {
        loop {
            match events.recv().await {
                Ok(NavigationEvent::TransitionEnd { url }) => {
                    let Some(store) = weak.upgrade() else {
                        break;
                    };
                    if url == origin {
                        let outcome = store.resume_ttl();
                        tracing::debug!(store = %scope, %url, ?outcome, "returned to origin route");
                    } else {
                        store.pause_ttl();
                        tracing::debug!(store = %scope, %url, "left origin route");
                    }
                },
                Ok(NavigationEvent::TransitionStart { url }) => {
                    tracing::trace!(store = %scope, %url, "navigation started");
                },
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(store = %scope, skipped, "navigation events lagged");
                },
                Err(RecvError::Closed) => break,
            }
        }
    });
}
