//! Integration tests for the shipped plugins

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use serde_json::{Value, json};
use signal_store_core::{MemoryStorage, StorageBackend};
use signal_store_runtime::plugin::{AutoRefresh, CacheWindow, ErrorHook, Persistence};
use signal_store_runtime::{LoadOutcome, Plugin, ReloadFn, ReloadMode, Store, StoreBuilder, StoreConfig};
use signal_store_testing::{ScriptedLoader, init_test_tracing};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

fn catalog_loader() -> ScriptedLoader<Value> {
    init_test_tracing();
    ScriptedLoader::new().resolve_after(ms(10), json!({ "items": ["lamp", "desk"] }))
}

// ============================================================================
// Cache window
// ============================================================================

#[tokio::test(start_paused = true)]
async fn cache_window_skips_reloads_while_fresh() {
    let script = catalog_loader();
    let store = StoreBuilder::from_state(json!({ "items": [] }))
        .with_loader(script.loader::<()>())
        .with_plugin(CacheWindow::new(Duration::from_secs(300)))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    sleep(ms(20)).await;
    assert_eq!(script.calls(), 1);

    assert_eq!(store.reload().await, LoadOutcome::Skipped);
    assert_eq!(store.reload().await, LoadOutcome::Skipped);
    assert_eq!(script.calls(), 1);

    store.force_reload().await.expect("forced reload");
    assert_eq!(script.calls(), 2);

    sleep(Duration::from_secs(301)).await;
    assert_eq!(store.reload().await, LoadOutcome::Loaded);
    assert_eq!(script.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn cache_window_does_not_hide_a_failed_store() {
    init_test_tracing();
    let script = ScriptedLoader::new()
        .reject_after(ms(10), "offline")
        .resolve_after(ms(10), json!({ "items": [] }));
    let store = StoreBuilder::from_state(json!({}))
        .with_loader(script.loader::<()>())
        .with_plugin(CacheWindow::new(Duration::from_secs(300)))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    sleep(ms(20)).await;
    assert!(store.is_error());

    assert_eq!(store.reload().await, LoadOutcome::Loaded);
    assert_eq!(script.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn ttl_expiry_is_not_swallowed_by_a_longer_cache_window() {
    let script = catalog_loader();
    let store = StoreBuilder::from_state(json!({ "items": [] }))
        .with_loader(script.loader::<()>())
        .with_ttl(ms(100))
        .with_plugin(CacheWindow::new(ms(300)))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    // Loads start at 0, 110 and 220ms
    sleep(ms(250)).await;
    assert_eq!(script.calls(), 3);
    assert!(store.ttl_deadline().is_some());

    // Regular reloads are still served from cache
    assert_eq!(store.reload().await, LoadOutcome::Skipped);
    assert_eq!(script.calls(), 3);
}

// ============================================================================
// Auto refresh
// ============================================================================

#[tokio::test(start_paused = true)]
async fn auto_refresh_reloads_on_interval_until_destroyed() {
    init_test_tracing();
    let script = ScriptedLoader::new().resolve_after(Duration::ZERO, json!({ "tick": true }));
    let store = StoreBuilder::from_state(json!({}))
        .with_loader(script.loader::<()>())
        .with_plugin(AutoRefresh::new(Duration::from_secs(1)))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    sleep(ms(3500)).await;
    assert_eq!(script.calls(), 4);

    store.destroy();
    sleep(Duration::from_secs(5)).await;
    assert_eq!(script.calls(), 4);
}

// ============================================================================
// Persistence
// ============================================================================

#[tokio::test(start_paused = true)]
async fn persistence_hydrates_then_writes_back() {
    let script = catalog_loader();
    let storage = Arc::new(MemoryStorage::new());
    storage.set("catalog", json!({ "items": ["cached"] }).to_string());

    let store = StoreBuilder::from_state(json!({ "items": [] }))
        .with_scope("catalog")
        .with_loader(script.loader::<()>())
        .with_plugin(Persistence::new(Arc::clone(&storage) as Arc<dyn StorageBackend>))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    assert_eq!(*store.state(), json!({ "items": ["cached"] }));
    assert!(store.is_idle());

    sleep(ms(20)).await;

    let persisted: Value = serde_json::from_str(&storage.get("catalog").expect("persisted")).expect("json");
    assert_eq!(persisted, json!({ "items": ["lamp", "desk"] }));
}

#[tokio::test(start_paused = true)]
async fn persistence_ignores_unreadable_blobs_and_failed_loads() {
    init_test_tracing();
    let script = ScriptedLoader::new().reject_after(ms(10), "offline");
    let storage = Arc::new(MemoryStorage::new());
    storage.set("drafts", "{not json".to_string());

    let store = StoreBuilder::from_state(json!({ "drafts": 0 }))
        .with_loader(script.loader::<()>())
        .with_plugin(Persistence::new(Arc::clone(&storage) as Arc<dyn StorageBackend>).with_key("drafts"))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    assert_eq!(*store.state(), json!({ "drafts": 0 }));
    sleep(ms(20)).await;

    assert!(store.is_error());
    assert_eq!(storage.get("drafts").as_deref(), Some("{not json"));
}

// ============================================================================
// Error hook
// ============================================================================

#[tokio::test(start_paused = true)]
async fn error_hook_sees_every_failed_load() {
    init_test_tracing();
    let script = ScriptedLoader::new().reject_after(ms(10), "boom");
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let store = StoreBuilder::from_state(json!({}))
        .with_scope("orders")
        .with_loader(script.loader::<()>())
        .with_plugin(ErrorHook::new(move |scope, error| {
            sink.lock().unwrap().push(format!("{scope}: {error}"));
        }))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    sleep(ms(20)).await;
    assert!(store.force_reload().await.is_err());

    assert_eq!(
        *seen.lock().unwrap(),
        vec!["orders: boom".to_string(), "orders: boom".to_string()]
    );
    let status = store.action_status("forceReload");
    assert!(status.is_error());
    assert_eq!(status.error().map(|e| e.message()), Some("boom".to_string()));
}

// ============================================================================
// Composition
// ============================================================================

struct Audit {
    log: Arc<Mutex<Vec<String>>>,
}

impl Plugin<Value> for Audit {
    fn name(&self) -> &'static str {
        "audit"
    }

    fn install(&self, store: &Store<Value>) {
        self.log.lock().unwrap().push(format!("install {}", store.scope()));
    }

    fn wrap_reload(&self, next: ReloadFn<Value>) -> ReloadFn<Value> {
        let log = Arc::clone(&self.log);
        Arc::new(move |store: Store<Value>, mode: ReloadMode| {
            log.lock().unwrap().push(format!("{mode:?}"));
            next(store, mode)
        })
    }
}

#[tokio::test(start_paused = true)]
async fn outer_plugin_sees_skipped_reloads() {
    let script = catalog_loader();
    let log = Arc::new(Mutex::new(Vec::new()));
    let store = StoreBuilder::from_state(json!({}))
        .with_scope("catalog")
        .with_loader(script.loader::<()>())
        .with_plugin(Audit { log: Arc::clone(&log) })
        .with_plugin(CacheWindow::new(Duration::from_secs(60)))
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    sleep(ms(20)).await;
    assert_eq!(store.reload().await, LoadOutcome::Skipped);

    assert_eq!(
        *log.lock().unwrap(),
        vec!["install catalog", "Normal", "Normal"]
    );
}

#[tokio::test(start_paused = true)]
async fn config_plugins_are_applied() {
    let script = catalog_loader();
    let config = StoreConfig::from_toml_str(
        r#"
        scope = "catalog"
        cache_window_ms = 60000
        refresh_interval_ms = 1000
        "#,
    )
    .expect("config");
    let store = StoreBuilder::from_state(json!({}))
        .with_loader(script.loader::<()>())
        .with_config(&config)
        .build()
        .expect("factory")
        .create(())
        .expect("store");

    // Refresh ticks go through the cache window, which keeps skipping them
    sleep(ms(3500)).await;
    assert_eq!(store.scope(), "catalog");
    assert_eq!(script.calls(), 1);
}
