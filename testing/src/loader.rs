//! Scripted loaders with simulated latency.

use futures::FutureExt;
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone)]
enum Step<P> {
    Resolve { delay: Duration, patch: P },
    Reject { delay: Duration, message: String },
}

#[derive(Debug)]
struct Script<P> {
    steps: Mutex<VecDeque<Step<P>>>,
    calls: AtomicUsize,
}

/// Loader that plays back a script of responses.
///
/// Each call consumes the next step; the last step repeats forever. Delays
/// use `tokio::time`, so a paused test clock controls them.
///
/// # Example
///
/// ```
/// use signal_store_testing::ScriptedLoader;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let script = ScriptedLoader::new()
///     .reject_after(Duration::ZERO, "offline")
///     .resolve_after(Duration::ZERO, 5);
/// let load = script.loader::<()>();
///
/// assert!(load(()).await.is_err());
/// assert_eq!(load(()).await.ok(), Some(5));
/// assert_eq!(load(()).await.ok(), Some(5));
/// assert_eq!(script.calls(), 3);
/// # }
/// ```
#[derive(Debug)]
pub struct ScriptedLoader<P> {
    script: Arc<Script<P>>,
}

impl<P> Clone for ScriptedLoader<P> {
    fn clone(&self) -> Self {
        Self {
            script: Arc::clone(&self.script),
        }
    }
}

impl<P> Default for ScriptedLoader<P> {
    fn default() -> Self {
        Self {
            script: Arc::new(Script {
                steps: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
            }),
        }
    }
}

impl<P> ScriptedLoader<P>
where
    P: Clone + Send + Sync + 'static,
{
    /// Empty script; calls fail until a step is added.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step resolving with `patch` after `delay`.
    #[must_use]
    pub fn resolve_after(self, delay: Duration, patch: P) -> Self {
        self.push(Step::Resolve { delay, patch });
        self
    }

    /// Append a step failing with `message` after `delay`.
    #[must_use]
    pub fn reject_after(self, delay: Duration, message: impl Into<String>) -> Self {
        self.push(Step::Reject {
            delay,
            message: message.into(),
        });
        self
    }

    /// Number of times the loader was invoked.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    /// Loader closure, usable with any dependency type.
    pub fn loader<D: 'static>(&self) -> impl Fn(D) -> BoxFuture<'static, anyhow::Result<P>> + Send + Sync + 'static {
        let script = Arc::clone(&self.script);
        move |_deps: D| {
            script.calls.fetch_add(1, Ordering::SeqCst);
            let step = next_step(&script);
            async move {
                match step {
                    Some(Step::Resolve { delay, patch }) => {
                        tokio::time::sleep(delay).await;
                        Ok(patch)
                    },
                    Some(Step::Reject { delay, message }) => {
                        tokio::time::sleep(delay).await;
                        Err(anyhow::anyhow!(message))
                    },
                    None => Err(anyhow::anyhow!("scripted loader has no steps")),
                }
            }
            .boxed()
        }
    }

    fn push(&self, step: Step<P>) {
        self.script
            .steps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(step);
    }
}

fn next_step<P: Clone>(script: &Script<P>) -> Option<Step<P>> {
    let mut steps = script.steps.lock().unwrap_or_else(PoisonError::into_inner);
    if steps.len() > 1 {
        steps.pop_front()
    } else {
        steps.front().cloned()
    }
}
