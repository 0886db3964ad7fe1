//! Cache Module
//!
//! Provides the LRU eviction layer over an expiring store: recency tracking,
//! capacity-triggered eviction and eviction notifications.

mod component;
mod notify;
mod recency;
mod stats;

#[cfg(test)]
mod scripted_store;

// Re-export public types
pub use component::{AnyValue, LruCache};
pub use notify::{EvictionCause, EvictionListener, EvictionNotification, SubscriptionId};
pub use stats::CacheStats;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
