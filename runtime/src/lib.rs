//! # Signal Store Runtime
//!
//! Runtime for Signal Store: live stores built from a loader, a TTL and a
//! stack of plugins.
//!
//! ## Core Components
//!
//! - **Store**: immutable snapshot, status/error machine, TTL scheduling,
//!   tracked actions and owned background tasks
//! - **Builder**: fixed-order, write-once configuration producing a factory
//! - **Plugins**: lazy cache window, auto refresh, storage persistence and
//!   error hook, composed around the reload pipeline
//! - **Config**: the same knobs from a TOML document
//! - **Metrics**: `metrics` counters labelled by store scope
//!
//! ## Example
//!
//! ```ignore
//! use signal_store_runtime::{StoreBuilder, plugin::CacheWindow};
//! use serde_json::json;
//! use std::time::Duration;
//!
//! let factory = StoreBuilder::from_state(json!({ "items": [] }))
//!     .with_loader(|api: Api| async move { api.fetch_items().await })
//!     .with_scope("catalog")
//!     .with_ttl(Duration::from_secs(30))
//!     .with_plugin(CacheWindow::new(Duration::from_secs(300)))
//!     .build()?;
//!
//! let store = factory.create(api)?;
//! store.status_signal().subscribe(|status| println!("catalog is {status}"));
//! ```

/// Tracked action statuses
pub mod action;

/// Store builder and factory
pub mod builder;

/// Declarative configuration
pub mod config;

mod lifecycle;

/// Metric names and descriptions
pub mod metrics;

pub mod plugin;

/// The store runtime
pub mod store;

mod status_cell;
mod ttl;

pub use action::{ActionStatus, TrackedAction};
pub use builder::{ActionContext, LoaderBuilder, StoreBuilder, StoreFactory};
pub use config::{ConfigError, StoreConfig};
pub use plugin::Plugin;
pub use store::{
    FORCE_RELOAD_ACTION, LoadOutcome, LoaderFn, ReloadFn, ReloadMode, Store, TtlResume, WeakStore,
};

// Re-export core types used in store signatures
pub use signal_store_core::{Merge, Signal, Status, StoreError, StoreState, Subscription};

#[cfg(test)]
pub(crate) mod testing_support {
    use crate::store::{LoadOutcome, ReloadFn, ReloadMode, Store, StoreParts};
    use futures::FutureExt;
    use futures::future::BoxFuture;
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::runtime::Handle;

    /// JSON store with a no-op loader and no plugins. Must run inside a runtime.
    pub(crate) fn json_store(scope: &str) -> Store<Value> {
        let base: ReloadFn<Value> =
            Arc::new(|store: Store<Value>, mode: ReloadMode| -> BoxFuture<'static, LoadOutcome> {
                store.load(mode).boxed()
            });
        Store::assemble(StoreParts {
            scope: scope.to_string(),
            initial_state: Arc::new(Value::Null),
            loader: Arc::new(|| async { Ok::<_, anyhow::Error>(Value::Null) }.boxed()),
            pipeline: base,
            ttl: Duration::ZERO,
            actions: HashMap::new(),
            selectors: Vec::new(),
            history: None,
            runtime: Handle::current(),
        })
    }
}
