//! Store builder and factory.
//!
//! Construction happens in a fixed order, enforced by the types:
//!
//! 1. [`StoreBuilder`]: initial state (and optionally the scope)
//! 2. [`StoreBuilder::with_loader`] → [`LoaderBuilder`]: TTL, plugins,
//!    actions, selectors, history, config
//! 3. [`LoaderBuilder::build`] → [`StoreFactory`], validated once
//! 4. [`StoreFactory::create`] → a live [`Store`] per dependency set
//!
//! Every setter is write-once. Conflicts are collected and reported
//! together as a [`StoreError::Configuration`] from `build`.

use crate::action::TrackedAction;
use crate::config::StoreConfig;
use crate::lifecycle;
use crate::plugin::{self, AutoRefresh, CacheWindow, Plugin};
use crate::store::{
    BoundAction, LoadOutcome, LoaderFn, ReloadFn, ReloadMode, SelectorFn, Store, StoreParts,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use signal_store_core::{HistoryRecorder, Merge, NavigationSource, StoreError, StoreState};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

type LoaderFactory<S, D> =
    Arc<dyn Fn(D) -> BoxFuture<'static, anyhow::Result<<S as Merge>::Patch>> + Send + Sync>;

type ActionFactory<S, D> =
    Arc<dyn Fn(ActionContext<S, D>, Value) -> BoxFuture<'static, anyhow::Result<Value>> + Send + Sync>;

type PluginList<S> = SmallVec<[Arc<dyn Plugin<S>>; 4]>;

/// What a builder-registered action receives besides its params.
pub struct ActionContext<S: StoreState, D> {
    /// The store the action was dispatched on
    pub store: Store<S>,
    /// The dependencies the store was created with
    pub deps: D,
}

impl<S: StoreState, D: Clone> Clone for ActionContext<S, D> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            deps: self.deps.clone(),
        }
    }
}

fn assign_once<T>(slot: &mut Option<T>, value: T, field: &str, conflicts: &mut Vec<String>) {
    if slot.is_some() {
        conflicts.push(format!("{field} was configured more than once"));
    } else {
        *slot = Some(value);
    }
}

/// Scope derived from the state type: its last path segment.
fn default_scope<S>() -> String {
    let name = std::any::type_name::<S>();
    let base = name.split('<').next().unwrap_or(name);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// First construction stage.
pub struct StoreBuilder<S: StoreState> {
    scope: Option<String>,
    initial_state: S,
    conflicts: Vec<String>,
}

impl<S: StoreState + Default> StoreBuilder<S> {
    /// Start from `S::default()`.
    #[must_use]
    pub fn new() -> Self {
        Self::from_state(S::default())
    }
}

impl<S: StoreState + Default> Default for StoreBuilder<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: StoreState> StoreBuilder<S> {
    /// Start from an explicit initial state.
    #[must_use]
    pub const fn from_state(initial_state: S) -> Self {
        Self {
            scope: None,
            initial_state,
            conflicts: Vec::new(),
        }
    }

    /// Name the store.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        assign_once(&mut self.scope, scope.into(), "scope", &mut self.conflicts);
        self
    }

    /// Attach the loader; the rest of the configuration follows.
    ///
    /// The loader receives the dependencies passed to
    /// [`StoreFactory::create`] and returns the patch to merge.
    #[must_use]
    pub fn with_loader<D, F, Fut>(self, loader: F) -> LoaderBuilder<S, D>
    where
        D: Clone + Send + Sync + 'static,
        F: Fn(D) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<S::Patch>> + Send + 'static,
    {
        LoaderBuilder {
            scope: self.scope,
            initial_state: self.initial_state,
            loader: Arc::new(move |deps: D| loader(deps).boxed()),
            ttl: None,
            plugins: SmallVec::new(),
            actions: Vec::new(),
            selectors: Vec::new(),
            history: None,
            conflicts: self.conflicts,
        }
    }
}

/// Second construction stage: everything that follows the loader.
pub struct LoaderBuilder<S: StoreState, D> {
    scope: Option<String>,
    initial_state: S,
    loader: LoaderFactory<S, D>,
    ttl: Option<Duration>,
    plugins: PluginList<S>,
    actions: Vec<(String, ActionFactory<S, D>)>,
    selectors: Vec<(String, SelectorFn<S>)>,
    history: Option<Arc<HistoryRecorder>>,
    conflicts: Vec<String>,
}

impl<S, D> LoaderBuilder<S, D>
where
    S: StoreState,
    D: Clone + Send + Sync + 'static,
{
    /// Name the store.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        assign_once(&mut self.scope, scope.into(), "scope", &mut self.conflicts);
        self
    }

    /// Reload automatically once data is older than `ttl`. Zero disables it.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        assign_once(&mut self.ttl, ttl, "ttl", &mut self.conflicts);
        self
    }

    /// Add a plugin. The first plugin added wraps all later ones.
    #[must_use]
    pub fn with_plugin(mut self, plugin: impl Plugin<S>) -> Self {
        self.plugins.push(Arc::new(plugin));
        self
    }

    /// Register a named action, run through [`Store::dispatch`].
    #[must_use]
    pub fn with_action<F, Fut>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(ActionContext<S, D>, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let name = name.into();
        if self.actions.iter().any(|(existing, _)| *existing == name) {
            self.conflicts.push(format!("action `{name}` was registered more than once"));
        } else {
            let action: ActionFactory<S, D> =
                Arc::new(move |ctx: ActionContext<S, D>, params: Value| action(ctx, params).boxed());
            self.actions.push((name, action));
        }
        self
    }

    /// Register a named selector, read through [`Store::select`].
    #[must_use]
    pub fn with_selector<F>(mut self, name: impl Into<String>, selector: F) -> Self
    where
        F: Fn(&S) -> Value + Send + Sync + 'static,
    {
        let name = name.into();
        if self.selectors.iter().any(|(existing, _)| *existing == name) {
            self.conflicts.push(format!("selector `{name}` was registered more than once"));
        } else {
            self.selectors.push((name, Arc::new(selector)));
        }
        self
    }

    /// Record tracked actions into `recorder`.
    #[must_use]
    pub fn with_history(mut self, recorder: Arc<HistoryRecorder>) -> Self {
        assign_once(&mut self.history, recorder, "history", &mut self.conflicts);
        self
    }

    /// Record tracked actions into the process-wide recorder.
    #[must_use]
    pub fn with_global_history(self) -> Self {
        self.with_history(HistoryRecorder::global())
    }

    /// Apply a declarative configuration.
    ///
    /// The cache window and refresh interval become [`CacheWindow`] and
    /// [`AutoRefresh`] plugins, appended after any plugin already added.
    #[must_use]
    pub fn with_config(mut self, config: &StoreConfig) -> Self {
        if let Err(error) = config.validate() {
            self.conflicts.push(error.to_string());
            return self;
        }
        if let Some(scope) = &config.scope {
            self = self.with_scope(scope.clone());
        }
        if config.ttl_ms > 0 {
            self = self.with_ttl(config.ttl());
        }
        if let Some(window) = config.cache_window() {
            self = self.with_plugin(CacheWindow::new(window));
        }
        if let Some(interval) = config.refresh_interval() {
            self = self.with_plugin(AutoRefresh::new(interval));
        }
        if config.record_history {
            self = self.with_global_history();
        }
        self
    }

    /// Validate the configuration and produce a factory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] listing every write-once
    /// violation and duplicate name, or if the scope is blank.
    pub fn build(self) -> Result<StoreFactory<S, D>, StoreError> {
        if !self.conflicts.is_empty() {
            return Err(StoreError::Configuration(self.conflicts.join("; ")));
        }
        let scope = self.scope.unwrap_or_else(default_scope::<S>);
        if scope.trim().is_empty() {
            return Err(StoreError::Configuration("scope cannot be empty".to_string()));
        }

        tracing::debug!(
            store = %scope,
            plugins = self.plugins.len(),
            actions = self.actions.len(),
            selectors = self.selectors.len(),
            "store factory built"
        );

        Ok(StoreFactory {
            blueprint: Arc::new(Blueprint {
                scope,
                initial_state: Arc::new(self.initial_state),
                loader: self.loader,
                ttl: self.ttl.unwrap_or(Duration::ZERO),
                plugins: self.plugins,
                actions: self.actions,
                selectors: self.selectors,
                history: self.history,
            }),
        })
    }
}

struct Blueprint<S: StoreState, D> {
    scope: String,
    initial_state: Arc<S>,
    loader: LoaderFactory<S, D>,
    ttl: Duration,
    plugins: PluginList<S>,
    actions: Vec<(String, ActionFactory<S, D>)>,
    selectors: Vec<(String, SelectorFn<S>)>,
    history: Option<Arc<HistoryRecorder>>,
}

/// Validated store definition. Each [`create`](Self::create) call yields an
/// independent store bound to its own dependencies.
pub struct StoreFactory<S: StoreState, D> {
    blueprint: Arc<Blueprint<S, D>>,
}

impl<S: StoreState, D> Clone for StoreFactory<S, D> {
    fn clone(&self) -> Self {
        Self {
            blueprint: Arc::clone(&self.blueprint),
        }
    }
}

impl<S: StoreState, D> fmt::Debug for StoreFactory<S, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreFactory")
            .field("scope", &self.blueprint.scope)
            .field("ttl", &self.blueprint.ttl)
            .field(
                "plugins",
                &self.blueprint.plugins.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

impl<S, D> StoreFactory<S, D>
where
    S: StoreState,
    D: Clone + Send + Sync + 'static,
{
    /// Scope of the stores this factory creates.
    #[must_use]
    pub fn scope(&self) -> &str {
        &self.blueprint.scope
    }

    /// Create a store and start its initial load.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] when called outside a tokio
    /// runtime.
    pub fn create(&self, deps: D) -> Result<Store<S>, StoreError> {
        self.instantiate(deps, None)
    }

    /// Create a store whose TTL pauses while the app is away from the
    /// route it was created on.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Configuration`] when called outside a tokio
    /// runtime.
    pub fn create_with_navigation(&self, deps: D, navigation: &dyn NavigationSource) -> Result<Store<S>, StoreError> {
        self.instantiate(deps, Some(navigation))
    }

    fn instantiate(&self, deps: D, navigation: Option<&dyn NavigationSource>) -> Result<Store<S>, StoreError> {
        let runtime = Handle::try_current().map_err(|_| {
            StoreError::Configuration("stores must be created inside a tokio runtime".to_string())
        })?;
        let blueprint = &self.blueprint;

        let make_loader = Arc::clone(&blueprint.loader);
        let loader_deps = deps.clone();
        let loader: LoaderFn<S> = Arc::new(move || make_loader(loader_deps.clone()));

        let actions: HashMap<String, BoundAction<S>> = blueprint
            .actions
            .iter()
            .map(|(name, action)| {
                let action = Arc::clone(action);
                let deps = deps.clone();
                let bound: BoundAction<S> = Arc::new(move |store: Store<S>, params: Value| {
                    action(
                        ActionContext {
                            store,
                            deps: deps.clone(),
                        },
                        params,
                    )
                });
                (name.clone(), bound)
            })
            .collect();

        let base: ReloadFn<S> =
            Arc::new(|store: Store<S>, mode: ReloadMode| -> BoxFuture<'static, LoadOutcome> { store.load(mode).boxed() });
        let pipeline = plugin::compose(base, &blueprint.plugins);

        let store = Store::assemble(StoreParts {
            scope: blueprint.scope.clone(),
            initial_state: Arc::clone(&blueprint.initial_state),
            loader,
            pipeline,
            ttl: blueprint.ttl,
            actions,
            selectors: blueprint.selectors.clone(),
            history: blueprint.history.clone(),
            runtime,
        });

        for plugin in &blueprint.plugins {
            plugin.install(&store);
            tracing::debug!(store = %blueprint.scope, plugin = plugin.name(), "plugin installed");
        }
        if let Some(navigation) = navigation {
            lifecycle::bind_navigation(&store, navigation);
        }

        tracing::info!(store = %blueprint.scope, "store created");
        store.spawn_initial_load();
        Ok(store)
    }
}

impl<S: StoreState> Store<S> {
    /// Shorthand for a one-off store without dependencies.
    ///
    /// # Errors
    ///
    /// See [`LoaderBuilder::build`] and [`StoreFactory::create`].
    pub fn standalone<F, Fut>(initial_state: S, loader: F) -> Result<Self, StoreError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<S::Patch>> + Send + 'static,
    {
        StoreBuilder::from_state(initial_state)
            .with_loader(move |()| loader())
            .build()?
            .create(())
    }

    /// Wrap an async closure into a tracked action on this store.
    ///
    /// Alias of [`Store::wrap_action`] for actions without params.
    #[must_use]
    pub fn tracked<T, F, Fut>(&self, name: impl Into<String>, action: F) -> TrackedAction<S, (), T>
    where
        T: Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        self.wrap_action(name, move |()| action())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder() -> LoaderBuilder<Value, ()> {
        StoreBuilder::from_state(json!({ "count": 0 }))
            .with_loader(|()| async { Ok(json!({ "count": 1 })) })
    }

    #[test]
    fn default_scope_is_the_type_name() {
        assert_eq!(default_scope::<Value>(), "Value");
        assert_eq!(default_scope::<Vec<String>>(), "Vec");
    }

    #[test]
    fn write_once_violations_are_reported_together() {
        let result = StoreBuilder::from_state(json!({}))
            .with_scope("a")
            .with_loader(|()| async { Ok(json!({})) })
            .with_scope("b")
            .with_ttl(Duration::from_secs(1))
            .with_ttl(Duration::from_secs(2))
            .build();

        let Err(StoreError::Configuration(message)) = result else {
            panic!("expected a configuration error");
        };
        assert!(message.contains("scope"));
        assert!(message.contains("ttl"));
    }

    #[test]
    fn duplicate_action_and_selector_names_are_rejected() {
        let result = builder()
            .with_action("save", |_ctx, params| async move { Ok(params) })
            .with_action("save", |_ctx, params| async move { Ok(params) })
            .build();
        assert!(matches!(result, Err(StoreError::Configuration(m)) if m.contains("save")));

        let result = builder()
            .with_selector("count", |s| s["count"].clone())
            .with_selector("count", |s| s["count"].clone())
            .build();
        assert!(matches!(result, Err(StoreError::Configuration(m)) if m.contains("count")));
    }

    #[test]
    fn blank_scope_is_rejected() {
        let result = builder().with_scope("   ").build();
        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }

    #[test]
    fn invalid_config_is_reported_at_build() {
        let config = StoreConfig {
            cache_window_ms: Some(0),
            ..StoreConfig::default()
        };
        assert!(builder().with_config(&config).build().is_err());
    }

    #[test]
    fn config_fills_in_scope_ttl_and_plugins() {
        let config = StoreConfig::default()
            .with_scope("catalog")
            .with_ttl(Duration::from_secs(30))
            .with_cache_window(Duration::from_secs(60));
        let factory = builder().with_config(&config).build().expect("factory");

        assert_eq!(factory.scope(), "catalog");
        let debug = format!("{factory:?}");
        assert!(debug.contains("cache-window"));
    }

    #[test]
    fn creating_outside_a_runtime_fails() {
        let factory = builder().build().expect("factory");
        assert!(matches!(factory.create(()), Err(StoreError::Configuration(_))));
    }
}
