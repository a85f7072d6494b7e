use super::Plugin;
use crate::metrics::RELOAD_SKIPPED;
use crate::store::{LoadOutcome, ReloadFn, ReloadMode, Store};
use futures::FutureExt;
use futures::future::BoxFuture;
use signal_store_core::StoreState;
use std::sync::Arc;
use std::time::Duration;

/// Lazy cache: regular reloads are skipped while the store holds data
/// fetched less than `window` ago. Forced reloads and TTL expiries always
/// go through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheWindow {
    window: Duration,
}

impl CacheWindow {
    /// Create a cache window.
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    /// Window length.
    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }
}

impl<S: StoreState> Plugin<S> for CacheWindow {
    fn name(&self) -> &'static str {
        "cache-window"
    }

    fn wrap_reload(&self, next: ReloadFn<S>) -> ReloadFn<S> {
        let window = self.window;
        Arc::new(move |store: Store<S>, mode: ReloadMode| -> BoxFuture<'static, LoadOutcome> {
            if mode == ReloadMode::Normal && store.is_resolved() && store.fetched_within(window) {
                tracing::debug!(store = %store.scope(), "reload skipped, cached data still fresh");
                metrics::counter!(RELOAD_SKIPPED, "store" => store.scope().to_string()).increment(1);
                return async { LoadOutcome::Skipped }.boxed();
            }
            next(store, mode)
        })
    }
}
