//! Navigation lifecycle events.
//!
//! A store created with a navigation source pauses its TTL while the active
//! route differs from the route it was created on, and resumes it when the
//! user navigates back.

use std::sync::{PoisonError, RwLock};
use tokio::sync::broadcast;

/// Route transition notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// A transition towards `url` started
    TransitionStart {
        /// Target URL
        url: String,
    },
    /// A transition finished; `url` is now active
    TransitionEnd {
        /// Active URL
        url: String,
    },
}

/// Source of navigation events.
pub trait NavigationSource: Send + Sync {
    /// URL active right now.
    fn current_url(&self) -> String;

    /// Subscribe to future events.
    fn subscribe(&self) -> broadcast::Receiver<NavigationEvent>;
}

/// In-process navigation source.
///
/// # Example
///
/// ```
/// use signal_store_core::navigation::{NavigationHub, NavigationSource};
///
/// let hub = NavigationHub::new("/orders");
/// let mut events = hub.subscribe();
/// hub.navigate("/settings");
///
/// assert_eq!(hub.current_url(), "/settings");
/// assert!(events.try_recv().is_ok());
/// ```
#[derive(Debug)]
pub struct NavigationHub {
    current: RwLock<String>,
    events: broadcast::Sender<NavigationEvent>,
}

impl NavigationHub {
    /// Create a hub with `initial_url` active.
    #[must_use]
    pub fn new(initial_url: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            current: RwLock::new(initial_url.into()),
            events,
        }
    }

    /// Announce the start of a transition.
    pub fn start(&self, url: impl Into<String>) {
        let _ = self.events.send(NavigationEvent::TransitionStart { url: url.into() });
    }

    /// Announce the end of a transition; `url` becomes active.
    pub fn end(&self, url: impl Into<String>) {
        let url = url.into();
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = url.clone();
        let _ = self.events.send(NavigationEvent::TransitionEnd { url });
    }

    /// Start and end a transition to `url`.
    pub fn navigate(&self, url: impl Into<String>) {
        let url = url.into();
        self.start(url.clone());
        self.end(url);
    }
}

impl NavigationSource for NavigationHub {
    fn current_url(&self) -> String {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<NavigationEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn navigate_emits_start_then_end() {
        let hub = NavigationHub::new("/a");
        let mut rx = hub.subscribe();

        hub.navigate("/b");

        assert_eq!(
            rx.try_recv().unwrap(),
            NavigationEvent::TransitionStart { url: "/b".into() }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            NavigationEvent::TransitionEnd { url: "/b".into() }
        );
        assert_eq!(hub.current_url(), "/b");
    }

    #[test]
    fn sending_without_subscribers_is_fine() {
        let hub = NavigationHub::new("/a");
        hub.end("/c");
        assert_eq!(hub.current_url(), "/c");
    }
}
