//! # Signal Store Testing
//!
//! Testing utilities and helpers for Signal Store.
//!
//! This crate provides:
//! - Mock implementations of environment traits
//! - A scripted loader with simulated latency
//! - A recorder capturing every value a signal emits
//! - Tracing setup for tests
//!
//! ## Example
//!
//! ```ignore
//! use signal_store_testing::{ScriptedLoader, SignalRecorder};
//! use std::time::Duration;
//!
//! #[tokio::test(start_paused = true)]
//! async fn loads_once() {
//!     let loader = ScriptedLoader::new().resolve_after(Duration::from_millis(10), json!({ "count": 5 }));
//!     let store = StoreBuilder::from_state(json!({ "count": 0 }))
//!         .with_loader(loader.loader())
//!         .build()?
//!         .create(())?;
//!     let statuses = SignalRecorder::new(&store.status_signal());
//!
//!     tokio::time::sleep(Duration::from_millis(20)).await;
//!     assert_eq!(statuses.values(), vec![Status::Idle, Status::Loading, Status::Resolved]);
//! }
//! ```

use chrono::{DateTime, Utc};
use signal_store_core::environment::Clock;

pub mod loader;
pub mod recorder;

/// Mock implementations for testing.
///
/// - `FixedClock`: Deterministic time for history timestamps
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making history timestamps reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use signal_store_testing::mocks::FixedClock;
    /// use signal_store_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default())
    }
}

/// Install a `tracing` subscriber writing to the test harness output.
///
/// The filter comes from `RUST_LOG`. Safe to call from every test; only the
/// first call installs anything.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// Re-export commonly used items
pub use loader::ScriptedLoader;
pub use mocks::{FixedClock, test_clock};
pub use recorder::SignalRecorder;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }
}
