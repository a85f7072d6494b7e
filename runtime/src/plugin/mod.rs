//! Store plugins.
//!
//! A plugin gets two hooks: [`Plugin::install`] runs once per store right
//! after it is assembled and before the initial load, and
//! [`Plugin::wrap_reload`] decorates the reload pipeline. Plugins are applied
//! in registration order with the first registered plugin outermost, so it
//! sees every reload request first and every outcome last.

mod auto_refresh;
mod cache_window;
mod error_hook;
mod persistence;

pub use auto_refresh::AutoRefresh;
pub use cache_window::CacheWindow;
pub use error_hook::ErrorHook;
pub use persistence::Persistence;

use crate::store::{ReloadFn, Store};
use signal_store_core::StoreState;
use std::sync::Arc;

/// Extension point for stores.
pub trait Plugin<S: StoreState>: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Called once per store instance, before its initial load.
    fn install(&self, store: &Store<S>) {
        let _ = store;
    }

    /// Decorate the next stage of the reload pipeline.
    fn wrap_reload(&self, next: ReloadFn<S>) -> ReloadFn<S> {
        next
    }
}

/// Wrap `base` with every plugin; the first plugin ends up outermost.
pub(crate) fn compose<S: StoreState>(base: ReloadFn<S>, plugins: &[Arc<dyn Plugin<S>>]) -> ReloadFn<S> {
    plugins
        .iter()
        .rev()
        .fold(base, |next, plugin| plugin.wrap_reload(next))
}
