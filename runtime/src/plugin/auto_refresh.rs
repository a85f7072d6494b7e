use super::Plugin;
use crate::store::Store;
use signal_store_core::StoreState;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};

/// Reload on a fixed interval for as long as the store lives.
///
/// The first reload happens one interval after the store is created. Ticks
/// go through the whole pipeline, so a [`CacheWindow`](super::CacheWindow)
/// registered before this plugin still applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoRefresh {
    interval: Duration,
}

impl AutoRefresh {
    /// Create an auto-refresh plugin. A zero interval is raised to 1ms.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    /// Refresh interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }
}

impl<S: StoreState> Plugin<S> for AutoRefresh {
    fn name(&self) -> &'static str {
        "auto-refresh"
    }

    fn install(&self, store: &Store<S>) {
        let period = self.interval;
        let weak = store.downgrade();
        store.spawn_owned(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(store) = weak.upgrade() else {
                    break;
                };
                tracing::debug!(store = %store.scope(), "auto refresh tick");
                store.reload().await;
            }
        });
    }
}
