//! Memory Store Module
//!
//! HashMap-backed expiring store. Expired entries are dropped lazily on
//! lookup and periodically by the sweep task; every removal is reported to
//! the entry's callback through the dispatch task, never under the map lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::{EvictionReason, ExpiringStore, OnEvicted, StoredEntry};
use crate::error::{CacheError, Result};
use crate::tasks::{spawn_dispatch_task, spawn_sweep_task, RemovalEvent};

// == Memory Store ==
/// In-process [`ExpiringStore`] with TTL expiry and asynchronous removal callbacks.
pub struct MemoryStore<V> {
    /// Key-value storage
    entries: Mutex<HashMap<String, StoredEntry<V>>>,
    /// Queue feeding the dispatch task
    events: mpsc::UnboundedSender<RemovalEvent>,
    /// Callbacks queued but not yet run
    pending: Arc<AtomicUsize>,
    closed: AtomicBool,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<V> MemoryStore<V>
where
    V: Send + Sync + 'static,
{
    // == Constructor ==
    /// Creates a store and starts its sweep and dispatch tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(sweep_interval: Duration) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let dispatcher = spawn_dispatch_task(rx, pending.clone());

        let store = Arc::new(Self {
            entries: Mutex::new(HashMap::new()),
            events,
            pending,
            closed: AtomicBool::new(false),
            tasks: Mutex::new(vec![dispatcher]),
        });

        let sweeper = spawn_sweep_task(Arc::downgrade(&store), sweep_interval);
        store.tasks.lock().push(sweeper);
        store
    }
}

impl<V> MemoryStore<V> {
    // == Sweep Expired ==
    /// Removes all expired entries and queues their `Expired` callbacks.
    ///
    /// Returns the number of entries removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<(String, StoredEntry<V>)> = {
            let mut entries = self.entries.lock();
            let keys: Vec<String> = entries
                .iter()
                .filter(|(_, entry)| entry.is_expired_at(now))
                .map(|(key, _)| key.clone())
                .collect();
            keys.iter()
                .filter_map(|key| entries.remove_entry(key))
                .collect()
        };

        let count = expired.len();
        for (key, entry) in expired {
            self.queue(key, EvictionReason::Expired, entry.on_evicted);
        }
        count
    }

    // == Weighted Size ==
    /// Sum of the size weights of all held entries.
    pub fn weighted_size(&self) -> u64 {
        self.entries.lock().values().map(|entry| entry.size).sum()
    }

    /// Number of removal callbacks queued but not yet run.
    pub fn pending_callbacks(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    // == Shutdown ==
    /// Stops the background tasks; every later operation fails.
    pub fn shutdown(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        info!("Memory store shut down");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(CacheError::Store("store is shut down".to_string()));
        }
        Ok(())
    }

    fn queue(&self, key: String, reason: EvictionReason, callback: OnEvicted) {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self
            .events
            .send(RemovalEvent {
                key,
                reason,
                callback,
            })
            .is_err()
        {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            debug!(%reason, "Dispatcher gone, dropping removal callback");
        }
    }

    /// Runs `read` against the live entry for `key`, dropping it first if it expired.
    fn lookup<R>(&self, key: &str, read: impl FnOnce(&StoredEntry<V>) -> R) -> Option<R> {
        let mut entries = self.entries.lock();
        let live = entries
            .get(key)
            .map(|entry| (!entry.is_expired()).then(|| read(entry)));

        match live {
            Some(Some(found)) => Some(found),
            Some(None) => {
                let expired = entries.remove(key);
                drop(entries);
                if let Some(entry) = expired {
                    self.queue(key.to_string(), EvictionReason::Expired, entry.on_evicted);
                }
                None
            }
            None => None,
        }
    }
}

impl<V> ExpiringStore<V> for MemoryStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn set(
        &self,
        key: String,
        value: V,
        size: u64,
        ttl: Duration,
        on_evicted: OnEvicted,
    ) -> Result<()> {
        self.ensure_open()?;

        let entry = StoredEntry::new(value, size, ttl, on_evicted);
        let replaced = self.entries.lock().insert(key.clone(), entry);

        // The old entry is reported even if it had already expired: its key is live again.
        if let Some(old) = replaced {
            self.queue(key, EvictionReason::Replaced, old.on_evicted);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        self.ensure_open()?;
        Ok(self.lookup(key, |entry| entry.value.clone()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.ensure_open()?;

        let removed = self.entries.lock().remove(key);
        if let Some(entry) = removed {
            self.queue(key.to_string(), EvictionReason::Removed, entry.on_evicted);
        }
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        self.ensure_open()?;
        Ok(self.entries.lock().len())
    }

    fn contains(&self, key: &str) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.lookup(key, |_| ()).is_some())
    }
}

impl<V> std::fmt::Debug for MemoryStore<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("entries", &self.entries.lock().len())
            .field("pending_callbacks", &self.pending_callbacks())
            .field("closed", &self.is_closed())
            .finish()
    }
}
