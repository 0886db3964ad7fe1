//! Mini LRU Cache - A bounded in-memory cache
//!
//! Adds least-recently-used eviction and eviction notifications on top of an
//! expiring key-value store. The cache keeps its recency bookkeeping in sync
//! with both its own capacity evictions and the store's TTL expiry.

pub mod cache;
pub mod config;
pub mod error;
pub mod store;
pub mod tasks;

pub use cache::{
    AnyValue, CacheStats, EvictionCause, EvictionListener, EvictionNotification, LruCache,
    SubscriptionId,
};
pub use config::CacheConfig;
pub use error::{CacheError, Result};
pub use store::{EvictionReason, ExpiringStore, MemoryStore, OnEvicted};
