//! TTL bookkeeping: last fetch time, pause flag and the single pending timer.
//!
//! The scheduler does not know what a reload is. The store hands it a
//! closure to run when the timer fires; the closure receives the timer id
//! and must call [`TtlScheduler::disarm`] with it before doing any work, so
//! that a timer replaced or cancelled in the meantime becomes a no-op.

use crate::store::lock;
use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

struct PendingTimer {
    id: u64,
    deadline: Instant,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct TtlState {
    last_fetch: Option<Instant>,
    paused: bool,
    pending: Option<PendingTimer>,
}

pub(crate) struct TtlScheduler {
    ttl: Duration,
    state: Mutex<TtlState>,
    next_timer: AtomicU64,
}

impl TtlScheduler {
    pub(crate) fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            state: Mutex::new(TtlState::default()),
            next_timer: AtomicU64::new(1),
        }
    }

    pub(crate) const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Replace any pending timer with one firing after `delay`.
    pub(crate) fn arm<F, Fut>(&self, runtime: &Handle, delay: Duration, fire: F)
    where
        F: FnOnce(u64) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = self.next_timer.fetch_add(1, Ordering::Relaxed);
        let deadline = Instant::now() + delay;

        // Spawn under the lock so the task cannot disarm before it is stored.
        let mut state = lock(&self.state);
        let handle = runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            fire(id).await;
        });
        if let Some(previous) = state.pending.replace(PendingTimer { id, deadline, handle }) {
            previous.handle.abort();
        }
    }

    /// Release the slot held by timer `id` without aborting it.
    ///
    /// Returns `false` if `id` is no longer the pending timer.
    pub(crate) fn disarm(&self, id: u64) -> bool {
        let mut state = lock(&self.state);
        if state.pending.as_ref().is_some_and(|timer| timer.id == id) {
            state.pending = None;
            true
        } else {
            false
        }
    }

    /// Abort the pending timer, if any.
    pub(crate) fn cancel(&self) -> bool {
        let pending = lock(&self.state).pending.take();
        pending.is_some_and(|timer| {
            timer.handle.abort();
            true
        })
    }

    pub(crate) fn record_fetch(&self, at: Instant) {
        lock(&self.state).last_fetch = Some(at);
    }

    pub(crate) fn last_fetch(&self) -> Option<Instant> {
        lock(&self.state).last_fetch
    }

    pub(crate) fn deadline(&self) -> Option<Instant> {
        lock(&self.state).pending.as_ref().map(|timer| timer.deadline)
    }

    pub(crate) fn pause(&self) {
        lock(&self.state).paused = true;
        self.cancel();
    }

    pub(crate) fn resume(&self) {
        lock(&self.state).paused = false;
    }

    pub(crate) fn is_paused(&self) -> bool {
        lock(&self.state).paused
    }
}

/// Time left before a fetch made at `fetched` goes stale, or `None` if it
/// already has.
pub(crate) fn remaining_delay(ttl: Duration, fetched: Instant, now: Instant) -> Option<Duration> {
    let elapsed = now.saturating_duration_since(fetched);
    ttl.checked_sub(elapsed).filter(|remaining| !remaining.is_zero())
}
