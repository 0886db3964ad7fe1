//! Store Module
//!
//! The expiring key-value store the cache sits on top of. The cache only
//! talks to it through [`ExpiringStore`]; [`MemoryStore`] is the in-process
//! implementation shipped with the crate.

mod entry;
mod memory;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

pub use entry::StoredEntry;
pub use memory::MemoryStore;

// == Eviction Reason ==
/// Why the store dropped an entry, reported through the entry's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum EvictionReason {
    /// Explicitly removed through [`ExpiringStore::remove`]
    Removed,
    /// Overwritten by a `set` on the same key
    Replaced,
    /// TTL elapsed
    Expired,
    /// An external expiration token fired
    TokenExpired,
    /// The store compacted itself to stay under its own limit
    Capacity,
}

impl fmt::Display for EvictionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EvictionReason::Removed => "removed",
            EvictionReason::Replaced => "replaced",
            EvictionReason::Expired => "expired",
            EvictionReason::TokenExpired => "token expired",
            EvictionReason::Capacity => "capacity",
        };
        f.write_str(name)
    }
}

/// Per-entry removal callback, invoked once when that exact entry leaves the store.
pub type OnEvicted = Arc<dyn Fn(&str, EvictionReason) + Send + Sync>;

// == Expiring Store ==
/// Expiring key-value store consumed by the cache.
///
/// Implementations may run `on_evicted` callbacks on any thread, but must not
/// run them while holding their own internal locks: callbacks call back into
/// the store.
pub trait ExpiringStore<V>: Send + Sync {
    /// Inserts or replaces `key`, expiring `ttl` from now.
    fn set(
        &self,
        key: String,
        value: V,
        size: u64,
        ttl: Duration,
        on_evicted: OnEvicted,
    ) -> Result<()>;

    /// Returns the live value for `key`, if any.
    fn get(&self, key: &str) -> Result<Option<V>>;

    /// Removes `key`; absent keys are a no-op.
    fn remove(&self, key: &str) -> Result<()>;

    /// Number of entries currently held.
    fn count(&self) -> Result<usize>;

    /// Whether a live entry exists for `key`.
    fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}
