//! Catalog example binary
//!
//! Drives a product catalog store through its lifecycle: initial load,
//! cache hits, forced reloads, tracked actions, navigation-driven TTL
//! pausing, and persistence across store instances.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use signal_store_core::{Freeze, HistoryRecorder, MemoryStorage, Merge, NavigationHub, StorageBackend};
use signal_store_runtime::plugin::{CacheWindow, ErrorHook, Persistence};
use signal_store_runtime::{StoreBuilder, StoreFactory};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// A product listed in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Product {
    sku: String,
    name: String,
    price_cents: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Catalog {
    products: Vec<Product>,
    revision: u32,
}

/// Partial update: absent fields keep their current value.
#[derive(Debug, Default)]
struct CatalogPatch {
    products: Option<Vec<Product>>,
    revision: Option<u32>,
}

impl Merge for Catalog {
    type Patch = CatalogPatch;

    fn merge(&self, patch: CatalogPatch) -> Self {
        Self {
            products: patch.products.unwrap_or_else(|| self.products.clone()),
            revision: patch.revision.unwrap_or(self.revision),
        }
    }
}

impl Freeze for Catalog {}

/// Fake backend; every fetch bumps the revision.
#[derive(Clone, Default)]
struct CatalogApi {
    revision: Arc<AtomicU32>,
}

impl CatalogApi {
    async fn fetch(&self) -> anyhow::Result<CatalogPatch> {
        tokio::time::sleep(Duration::from_millis(25)).await;
        let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(CatalogPatch {
            products: Some(vec![
                Product { sku: "LMP-1".into(), name: "Desk lamp".into(), price_cents: 3_900 },
                Product { sku: "CHR-2".into(), name: "Task chair".into(), price_cents: 14_900 },
            ]),
            revision: Some(revision),
        })
    }
}

fn catalog_factory(
    storage: Arc<dyn StorageBackend>,
    history: Arc<HistoryRecorder>,
) -> anyhow::Result<StoreFactory<Catalog, CatalogApi>> {
    let factory = StoreBuilder::<Catalog>::new()
        .with_scope("catalog")
        .with_loader(|api: CatalogApi| async move { api.fetch().await })
        .with_ttl(Duration::from_millis(400))
        .with_plugin(Persistence::new(storage))
        .with_plugin(CacheWindow::new(Duration::from_millis(200)))
        .with_plugin(ErrorHook::new(|scope, error| {
            tracing::error!(store = scope, %error, "catalog load failed");
        }))
        .with_action("discount", |ctx, params: Value| async move {
            let percent = params["percent"].as_u64().unwrap_or(0).min(100);
            let products = ctx
                .store
                .with_state(|catalog| catalog.products.clone())
                .into_iter()
                .map(|product| Product {
                    price_cents: product.price_cents * (100 - percent) / 100,
                    ..product
                })
                .collect::<Vec<_>>();
            let count = products.len();
            ctx.store.update_state(CatalogPatch { products: Some(products), revision: None });
            Ok(json!({ "discounted": count }))
        })
        .with_selector("total_cents", |catalog: &Catalog| {
            json!(catalog.products.iter().map(|p| p.price_cents).sum::<u64>())
        })
        .with_history(history)
        .build()?;
    Ok(factory)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "catalog=debug,signal_store_runtime=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    println!("=== Catalog Example: Signal Store ===\n");

    let storage: Arc<dyn StorageBackend> = Arc::new(MemoryStorage::new());
    let history = Arc::new(HistoryRecorder::new());
    let navigation = NavigationHub::new("/catalog");
    let api = CatalogApi::default();
    let factory = catalog_factory(Arc::clone(&storage), Arc::clone(&history))?;

    let store = factory.create_with_navigation(api.clone(), &navigation)?;
    println!("Created store `{}` with status {}", store.scope(), store.status());

    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "After initial load: status={}, revision={}, products={}",
        store.status(),
        store.with_state(|c| c.revision),
        store.with_state(|c| c.products.len()),
    );
    println!("Total: {:?} cents", store.select("total_cents"));

    // Fresh data is served from cache
    println!("\n>>> reload() inside the cache window: {:?}", store.reload().await);
    println!(">>> force_reload(): {:?}", store.force_reload().await);
    println!("Revision now {}", store.with_state(|c| c.revision));

    // Named action
    println!("\n>>> dispatch(\"discount\", 10%)");
    let result = store.dispatch("discount", json!({ "percent": 10 })).await?;
    println!("Result: {result}, total: {:?} cents", store.select("total_cents"));

    // Ad-hoc tracked action
    let audit = store.tracked("audit", || async { Ok("all prices checked") });
    println!(">>> audit: {:?} ({})", audit.call(()).await, audit.status().status());

    // Leaving the route pauses the TTL timer
    println!("\n>>> navigate to /checkout");
    navigation.navigate("/checkout");
    tokio::time::sleep(Duration::from_millis(600)).await;
    println!(
        "TTL paused: {}, revision still {}",
        store.is_ttl_paused(),
        store.with_state(|c| c.revision)
    );

    println!(">>> navigate back to /catalog");
    navigation.navigate("/catalog");
    tokio::time::sleep(Duration::from_millis(50)).await;
    println!(
        "TTL paused: {}, revision after expired TTL: {}",
        store.is_ttl_paused(),
        store.with_state(|c| c.revision)
    );

    // A second instance hydrates from the persisted snapshot
    store.destroy();
    let restored = factory.create(api)?;
    println!(
        "\nRestored store starts with revision {} (status {})",
        restored.with_state(|c| c.revision),
        restored.status()
    );

    println!("\n=== Action history ===");
    for event in history.events_by_store("catalog") {
        println!(
            "{} {:<12} {:<9} {}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.action,
            event.status,
            event.params
        );
    }

    restored.destroy();
    Ok(())
}
