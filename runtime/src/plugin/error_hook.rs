use super::Plugin;
use crate::store::{LoadOutcome, ReloadFn, ReloadMode, Store};
use futures::FutureExt;
use futures::future::BoxFuture;
use signal_store_core::{StoreError, StoreState};
use std::fmt;
use std::sync::Arc;

type Hook = Arc<dyn Fn(&str, &StoreError) + Send + Sync>;

/// Calls a hook with the store scope and error whenever a load fails.
#[derive(Clone)]
pub struct ErrorHook {
    hook: Hook,
}

impl ErrorHook {
    /// Create an error hook.
    pub fn new(hook: impl Fn(&str, &StoreError) + Send + Sync + 'static) -> Self {
        Self { hook: Arc::new(hook) }
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHook").finish_non_exhaustive()
    }
}

impl<S: StoreState> Plugin<S> for ErrorHook {
    fn name(&self) -> &'static str {
        "error-hook"
    }

    fn wrap_reload(&self, next: ReloadFn<S>) -> ReloadFn<S> {
        let hook = Arc::clone(&self.hook);
        Arc::new(move |store: Store<S>, mode: ReloadMode| -> BoxFuture<'static, LoadOutcome> {
            let hook = Arc::clone(&hook);
            let scope = store.scope().to_string();
            let pending = next(store, mode);
            async move {
                let outcome = pending.await;
                if let LoadOutcome::Failed(error) = &outcome {
                    hook(&scope, error);
                }
                outcome
            }
            .boxed()
        })
    }
}
