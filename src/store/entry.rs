//! Stored Entry Module
//!
//! Defines the structure for individual store entries with TTL and size weight.

use std::time::{Duration, Instant};

use super::OnEvicted;

// == Stored Entry ==
/// A single store entry with value and metadata.
#[derive(Clone)]
pub struct StoredEntry<V> {
    /// The stored value
    pub value: V,
    /// Size weight of the entry
    pub size: u64,
    /// Insertion instant
    pub created_at: Instant,
    /// Absolute expiry instant, None = no expiration
    pub expires_at: Option<Instant>,
    pub(crate) on_evicted: OnEvicted,
}

impl<V> StoredEntry<V> {
    // == Constructor ==
    /// Creates a new entry that expires `ttl` from now.
    ///
    /// A `ttl` too large to represent as an instant never expires.
    pub fn new(value: V, size: u64, ttl: Duration, on_evicted: OnEvicted) -> Self {
        let now = Instant::now();
        Self {
            value,
            size,
            created_at: now,
            expires_at: now.checked_add(ttl),
            on_evicted,
        }
    }

    // == Is Expired ==
    /// Checks if the entry has expired.
    ///
    /// An entry is expired once the current time reaches the expiry instant.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    // == Time To Live ==
    /// Returns remaining TTL (zero once expired), or None if no expiration is set.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(Instant::now()))
    }
}

impl<V> std::fmt::Debug for StoredEntry<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoredEntry")
            .field("size", &self.size)
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}
