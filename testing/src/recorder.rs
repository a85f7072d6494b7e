//! Capture what a signal emits.

use signal_store_core::{Signal, Subscription};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Records the current value of a signal and every value it emits
/// afterwards, until dropped.
///
/// # Example
///
/// ```
/// use signal_store_core::{Signal, Status};
/// use signal_store_testing::SignalRecorder;
///
/// let status = Signal::new(Status::Idle);
/// let recorder = SignalRecorder::new(&status);
/// status.set(Status::Loading);
///
/// assert_eq!(recorder.values(), vec![Status::Idle, Status::Loading]);
/// ```
#[derive(Debug)]
pub struct SignalRecorder<T> {
    values: Arc<Mutex<Vec<T>>>,
    _subscription: Subscription,
}

impl<T> SignalRecorder<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start recording `signal`.
    #[must_use]
    pub fn new(signal: &Signal<T>) -> Self {
        let values = Arc::new(Mutex::new(vec![signal.get()]));
        let sink = Arc::clone(&values);
        let subscription = signal.subscribe(move |value| {
            sink.lock().unwrap_or_else(PoisonError::into_inner).push(value.clone());
        });
        Self {
            values,
            _subscription: subscription,
        }
    }

    /// Everything recorded so far, oldest first.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        self.guard().clone()
    }

    /// Most recent value.
    #[must_use]
    pub fn last(&self) -> Option<T> {
        self.guard().last().cloned()
    }

    /// Number of recorded values, including the initial one.
    #[must_use]
    pub fn len(&self) -> usize {
        self.guard().len()
    }

    /// Whether nothing was recorded; only after [`clear`](Self::clear).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Forget what was recorded so far.
    pub fn clear(&self) {
        self.guard().clear();
    }

    fn guard(&self) -> MutexGuard<'_, Vec<T>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_recording_when_dropped() {
        let signal = Signal::new(0);
        let recorder = SignalRecorder::new(&signal);
        signal.set(1);
        assert_eq!(recorder.values(), vec![0, 1]);

        drop(recorder);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn clear_resets_the_log() {
        let signal = Signal::new("a");
        let recorder = SignalRecorder::new(&signal);
        recorder.clear();
        assert!(recorder.is_empty());

        signal.set("b");
        assert_eq!(recorder.last(), Some("b"));
        assert_eq!(recorder.len(), 1);
    }
}
