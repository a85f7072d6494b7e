//! Metric names emitted by stores.
//!
//! Every metric carries a `store` label with the store scope; action metrics
//! also carry an `action` label. Nothing is exported by this crate: install
//! whichever `metrics` recorder the application uses, then optionally call
//! [`describe_metrics`] to register descriptions.
//!
//! - Loads: started, failed, skipped by a plugin, superseded by a newer load
//! - Load latency histogram
//! - TTL timer firings
//! - Tracked actions: started, failed

use metrics::{describe_counter, describe_histogram};

/// Loads started.
pub const RELOAD_TOTAL: &str = "store_reloads_total";
/// Loads whose loader failed.
pub const RELOAD_FAILED: &str = "store_reload_failures_total";
/// Reloads skipped by the cache window.
pub const RELOAD_SKIPPED: &str = "store_reloads_skipped_total";
/// Loads discarded because a newer load started.
pub const RELOAD_SUPERSEDED: &str = "store_reloads_superseded_total";
/// Loader latency.
pub const LOAD_DURATION: &str = "store_load_duration_seconds";
/// TTL timers that fired.
pub const TTL_FIRED: &str = "store_ttl_fired_total";
/// Tracked actions started.
pub const ACTION_TOTAL: &str = "store_actions_total";
/// Tracked actions that failed.
pub const ACTION_FAILED: &str = "store_action_failures_total";

/// Register descriptions for every store metric with the installed recorder.
pub fn describe_metrics() {
    describe_counter!(RELOAD_TOTAL, "Total number of store loads started");
    describe_counter!(RELOAD_FAILED, "Total number of store loads that failed");
    describe_counter!(
        RELOAD_SKIPPED,
        "Total number of reloads skipped because cached data was fresh"
    );
    describe_counter!(
        RELOAD_SUPERSEDED,
        "Total number of load results discarded because a newer load started"
    );
    describe_histogram!(LOAD_DURATION, "Time taken by store loaders");
    describe_counter!(TTL_FIRED, "Total number of TTL expiries that triggered a reload");
    describe_counter!(ACTION_TOTAL, "Total number of tracked actions started");
    describe_counter!(ACTION_FAILED, "Total number of tracked actions that failed");
}
