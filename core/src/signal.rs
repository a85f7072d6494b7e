//! Observable value cells.
//!
//! A [`Signal`] is a shared, mutable cell that notifies its observers
//! synchronously whenever it is written. Every observable output of a store
//! (state, status, error, action status, selectors) is a `Signal`.
//!
//! # Example
//!
//! ```
//! use signal_store_core::signal::Signal;
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! let count = Signal::new(0);
//! let seen = Arc::new(AtomicUsize::new(0));
//! let seen_clone = Arc::clone(&seen);
//!
//! let subscription = count.subscribe(move |value| {
//!     seen_clone.store(*value, Ordering::SeqCst);
//! });
//!
//! count.set(5);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//!
//! drop(subscription);
//! count.set(6);
//! assert_eq!(seen.load(Ordering::SeqCst), 5);
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Observer<T> {
    id: u64,
    active: Arc<AtomicBool>,
    callback: Callback<T>,
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            active: Arc::clone(&self.active),
            callback: Arc::clone(&self.callback),
        }
    }
}

struct SignalInner<T> {
    value: RwLock<T>,
    observers: Mutex<Vec<Observer<T>>>,
    next_observer: AtomicU64,
    /// Subscriptions this cell holds on its sources (derived cells only)
    sources: Mutex<Vec<Subscription>>,
}

impl<T> SignalInner<T> {
    fn observers(&self) -> MutexGuard<'_, Vec<Observer<T>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove_observer(&self, id: u64) {
        let mut observers = self.observers();
        if let Some(position) = observers.iter().position(|o| o.id == id) {
            let observer = observers.remove(position);
            observer.active.store(false, Ordering::Release);
        }
    }
}

/// A shared observable cell.
///
/// Cloning a `Signal` yields another handle to the same cell.
pub struct Signal<T> {
    inner: Arc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new cell holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                value: RwLock::new(initial),
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(1),
                sources: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Current value (cloned).
    #[must_use]
    pub fn get(&self) -> T {
        self.inner
            .value
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Read the current value through a closure without cloning it.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let value = self.inner.value.read().unwrap_or_else(PoisonError::into_inner);
        f(&value)
    }

    /// Replace the value and notify observers.
    pub fn set(&self, value: T) {
        {
            let mut slot = self.inner.value.write().unwrap_or_else(PoisonError::into_inner);
            *slot = value;
        }
        self.notify();
    }

    /// Mutate the value in place and notify observers.
    ///
    /// The closure runs under the write lock, so concurrent updates are
    /// applied one after another. Observers run after the lock is released.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        {
            let mut slot = self.inner.value.write().unwrap_or_else(PoisonError::into_inner);
            f(&mut slot);
        }
        self.notify();
    }

    /// Register an observer that runs on every subsequent write.
    ///
    /// The observer is not called with the current value. Dropping the
    /// returned [`Subscription`] unsubscribes it.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        let active = Arc::new(AtomicBool::new(true));
        self.inner.observers().push(Observer {
            id,
            active: Arc::clone(&active),
            callback: Arc::new(callback),
        });

        let weak: Weak<SignalInner<T>> = Arc::downgrade(&self.inner);
        Subscription::new(active, move || {
            if let Some(inner) = weak.upgrade() {
                inner.remove_observer(id);
            }
        })
    }

    /// Create a derived cell that tracks `f(value)`.
    ///
    /// The derived cell stays subscribed for as long as this cell lives.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> Signal<U>
    where
        U: Clone + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = Signal::new(self.with(&f));
        let target = derived.clone();
        let subscription = self.subscribe(move |value| target.set(f(value)));
        derived
            .inner
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
        derived
    }

    /// Number of live observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.observers().len()
    }

    /// Detach every observer. None of them will be invoked again.
    pub fn clear_observers(&self) {
        let drained: Vec<Observer<T>> = self.inner.observers().drain(..).collect();
        for observer in drained {
            observer.active.store(false, Ordering::Release);
        }
    }

    /// Whether both handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let observers: Vec<Observer<T>> = self.inner.observers().clone();
        if observers.is_empty() {
            return;
        }
        let value = self.get();
        for observer in observers {
            // An observer removed during this pass must not run.
            if observer.active.load(Ordering::Acquire) {
                (observer.callback)(&value);
            }
        }
    }
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Replace the value, notifying observers only if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set_if_changed(&self, value: T) -> bool {
        {
            let mut slot = self.inner.value.write().unwrap_or_else(PoisonError::into_inner);
            if *slot == value {
                return false;
            }
            *slot = value;
        }
        self.notify();
        true
    }

    /// Like [`Signal::map`], but the derived cell only notifies when the
    /// projected value changes.
    #[must_use]
    pub fn map_distinct<U, F>(&self, f: F) -> Signal<U>
    where
        U: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&T) -> U + Send + Sync + 'static,
    {
        let derived = Signal::new(self.with(&f));
        let target = derived.clone();
        let subscription = self.subscribe(move |value| {
            target.set_if_changed(f(value));
        });
        derived
            .inner
            .sources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscription);
        derived
    }
}

impl<T> fmt::Debug for Signal<T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.inner.value.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("Signal")
            .field("value", &*value)
            .field("observers", &self.inner.observers().len())
            .finish()
    }
}

/// RAII handle for an observer registration.
///
/// Dropping the subscription (or calling [`Subscription::unsubscribe`])
/// removes the observer; it is never invoked afterwards.
#[must_use = "dropping a Subscription immediately unsubscribes it"]
pub struct Subscription {
    active: Arc<AtomicBool>,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    fn new(active: Arc<AtomicBool>, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            active,
            release: Some(Box::new(release)),
        }
    }

    /// Whether the observer is still registered.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Remove the observer now.
    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        self.active.store(false, Ordering::Release);
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn set_notifies_observers_synchronously() {
        let signal = Signal::new(1);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = Arc::clone(&seen);
        let _sub = signal.subscribe(move |v| seen_clone.lock().unwrap().push(*v));

        signal.set(2);
        signal.update(|v| *v += 10);

        assert_eq!(*seen.lock().unwrap(), vec![2, 12]);
        assert_eq!(signal.get(), 12);
    }

    #[test]
    fn dropping_subscription_stops_notifications() {
        let signal = Signal::new(0);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let sub = signal.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        assert!(sub.is_active());
        drop(sub);
        signal.set(2);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.observer_count(), 0);
    }

    #[test]
    fn observer_removed_mid_pass_is_skipped() {
        let signal = Signal::new(0);
        let second_calls = Arc::new(AtomicUsize::new(0));

        let target = signal.clone();
        let _first = signal.subscribe(move |_| target.clear_observers());

        let counter = Arc::clone(&second_calls);
        let _second = signal.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(1);
        assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn map_tracks_source() {
        let source = Signal::new(String::from("ab"));
        let len = source.map(String::len);
        assert_eq!(len.get(), 2);

        source.set(String::from("abcd"));
        assert_eq!(len.get(), 4);
    }

    #[test]
    fn map_distinct_skips_unchanged_projections() {
        let source = Signal::new((1, "a"));
        let first = source.map_distinct(|pair| pair.0);
        let emitted = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&emitted);
        let _sub = first.subscribe(move |v| sink.lock().unwrap().push(*v));

        source.set((1, "b"));
        source.set((2, "b"));
        source.set((2, "c"));

        assert_eq!(*emitted.lock().unwrap(), vec![2]);
        assert!(!first.set_if_changed(2));
    }

    #[test]
    fn clear_observers_deactivates_subscriptions() {
        let signal = Signal::new(0);
        let sub = signal.subscribe(|_| {});
        signal.clear_observers();
        assert!(!sub.is_active());
    }
}
