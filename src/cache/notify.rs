//! Eviction Notification Module
//!
//! Listener registry owned by a cache instance. Listeners are invoked
//! synchronously on the thread that performed the eviction, after every
//! lock has been released, so a listener may call back into the cache.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

// == Eviction Cause ==
/// Which path removed the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictionCause {
    /// Evicted by the cache to make room for an insert
    Capacity,
    /// Dropped by the store once its TTL elapsed
    Expired,
}

impl fmt::Display for EvictionCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionCause::Capacity => f.write_str("capacity"),
            EvictionCause::Expired => f.write_str("expired"),
        }
    }
}

// == Eviction Notification ==
/// Raised once per evicted key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvictionNotification {
    pub key: String,
    pub cause: EvictionCause,
    pub evicted_at: DateTime<Utc>,
}

impl EvictionNotification {
    pub fn new(key: impl Into<String>, cause: EvictionCause) -> Self {
        Self {
            key: key.into(),
            cause,
            evicted_at: Utc::now(),
        }
    }
}

// == Eviction Listener ==
/// Receives eviction notifications from a cache.
pub trait EvictionListener: Send + Sync {
    fn on_evicted(&self, notification: &EvictionNotification);
}

impl<F> EvictionListener for F
where
    F: Fn(&EvictionNotification) + Send + Sync,
{
    fn on_evicted(&self, notification: &EvictionNotification) {
        self(notification)
    }
}

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// == Subscribers ==
#[derive(Default)]
pub(crate) struct Subscribers {
    listeners: RwLock<Vec<(SubscriptionId, Arc<dyn EvictionListener>)>>,
    next_id: AtomicU64,
}

impl Subscribers {
    pub fn subscribe(&self, listener: Arc<dyn EvictionListener>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Delivers to a snapshot of the listeners; the registry lock is not held during delivery.
    pub fn notify(&self, notification: &EvictionNotification) {
        let snapshot: Vec<Arc<dyn EvictionListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in snapshot {
            listener.on_evicted(notification);
        }
    }
}

impl fmt::Debug for Subscribers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.len())
            .finish()
    }
}
