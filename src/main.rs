//! Mini LRU Cache - demo
//!
//! Reads a handful of records through the cache, loading each from a slow
//! source on a miss, and logs every eviction the cache reports.

use std::any::Any;
use std::env;
use std::time::Duration;

use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mini_lru_cache::{AnyValue, CacheConfig, EvictionNotification, LruCache};

/// Simulated latency of the backing data source
const LOAD_DELAY: Duration = Duration::from_secs(3);
/// Capacity used when `CACHE_CAPACITY_LIMIT` is not set
const DEMO_CAPACITY_LIMIT: usize = 3;

#[derive(Debug, Clone)]
struct Employee {
    name: String,
}

#[derive(Debug, Clone)]
struct Account {
    id: u64,
}

/// Demo entry point.
///
/// # Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Create the cache over an in-memory store
/// 4. Load four records through the cache (one more than it holds)
/// 5. Wait for the TTL to elapse, or Ctrl+C/SIGTERM, then shut down
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mini_lru_cache=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Mini LRU Cache demo");

    let mut config = CacheConfig::from_env();
    if env::var("CACHE_CAPACITY_LIMIT").is_err() {
        config.capacity_limit = DEMO_CAPACITY_LIMIT;
    }
    info!(
        "Configuration loaded: capacity_limit={}, default_entry_size={}, default_ttl={:?}, sweep_interval={:?}",
        config.capacity_limit, config.default_entry_size, config.default_ttl, config.sweep_interval
    );

    let cache: LruCache<AnyValue> = LruCache::with_memory_store(&config)?;
    cache.subscribe(|n: &EvictionNotification| {
        info!(key = %n.key, cause = %n.cause, "Cache entry evicted");
    });

    let role: String = get_or_load(&cache, "role", || "data".to_string()).await?;
    let department: i32 = get_or_load(&cache, "department", || 1024).await?;
    let employee = get_or_load(&cache, "employee", || Employee {
        name: "Ada".to_string(),
    })
    .await?;
    // Fourth key on a three-entry cache: the least recently used one goes
    let account = get_or_load(&cache, "account", || Account { id: 42 }).await?;
    info!(
        role = %role,
        department,
        employee = %employee.name,
        account = account.id,
        "Records loaded"
    );

    // Served from the cache this time
    get_or_load(&cache, "department", || 0_i32).await?;

    info!("Cache statistics: {}", serde_json::to_string(&cache.stats())?);

    let wait = config.default_ttl + config.sweep_interval * 2;
    info!("Waiting {:?} for entries to expire, Ctrl+C to stop early", wait);
    tokio::select! {
        _ = tokio::time::sleep(wait) => {
            info!("Cache statistics: {}", serde_json::to_string(&cache.stats())?);
        }
        _ = shutdown_signal() => {}
    }

    cache.store().shutdown();
    info!("Demo complete");
    Ok(())
}

/// Returns the cached value for `key`, or loads it from the slow source and caches it.
async fn get_or_load<T, F>(cache: &LruCache<AnyValue>, key: &str, load: F) -> anyhow::Result<T>
where
    T: Any + Clone + Send + Sync,
    F: FnOnce() -> T,
{
    if let Some(value) = cache.try_get_as::<T>(key)? {
        info!(key, "Cache hit");
        return Ok(value);
    }

    tokio::time::sleep(LOAD_DELAY).await;
    let value = load();
    cache.put_any(key, value.clone(), None, None)?;
    info!(key, "Loaded from source and cached");
    Ok(value)
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down...");
        }
    }
}
