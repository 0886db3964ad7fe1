//! Deterministic store for tests: removal callbacks are queued and only run
//! when the test calls `fire_pending`, so races can be scripted.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{CacheError, Result};
use crate::store::{EvictionReason, ExpiringStore, OnEvicted};

struct Slot<V> {
    value: V,
    size: u64,
    ttl: Duration,
    on_evicted: Option<OnEvicted>,
}

pub struct ScriptedStore<V> {
    slots: Mutex<HashMap<String, Slot<V>>>,
    queued: Mutex<Vec<(String, EvictionReason, OnEvicted)>>,
    fail_writes: AtomicBool,
    fail_removes: AtomicBool,
}

impl<V> ScriptedStore<V> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            queued: Mutex::new(Vec::new()),
            fail_writes: AtomicBool::new(false),
            fail_removes: AtomicBool::new(false),
        }
    }

    /// Runs every queued callback, in removal order.
    pub fn fire_pending(&self) {
        let queued = std::mem::take(&mut *self.queued.lock());
        for (key, reason, callback) in queued {
            callback(&key, reason);
        }
    }

    /// Drops `key` as if its TTL elapsed.
    pub fn expire(&self, key: &str) {
        self.drop_slot(key, EvictionReason::Expired);
    }

    /// Inserts without a callback, behind the cache's back.
    pub fn insert_untracked(&self, key: &str, value: V) {
        self.slots.lock().insert(
            key.to_string(),
            Slot {
                value,
                size: 1,
                ttl: Duration::from_secs(60),
                on_evicted: None,
            },
        );
    }

    pub fn callback_for(&self, key: &str) -> Option<OnEvicted> {
        self.slots
            .lock()
            .get(key)
            .and_then(|slot| slot.on_evicted.clone())
    }

    pub fn slot_meta(&self, key: &str) -> Option<(u64, Duration)> {
        self.slots.lock().get(key).map(|slot| (slot.size, slot.ttl))
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.slots.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.fail_removes.store(fail, Ordering::SeqCst);
    }

    fn drop_slot(&self, key: &str, reason: EvictionReason) {
        let removed = self.slots.lock().remove(key);
        if let Some(callback) = removed.and_then(|slot| slot.on_evicted) {
            self.queued.lock().push((key.to_string(), reason, callback));
        }
    }
}

impl<V> ExpiringStore<V> for ScriptedStore<V>
where
    V: Clone + Send + Sync,
{
    fn set(
        &self,
        key: String,
        value: V,
        size: u64,
        ttl: Duration,
        on_evicted: OnEvicted,
    ) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CacheError::Store("write rejected".to_string()));
        }
        let slot = Slot {
            value,
            size,
            ttl,
            on_evicted: Some(on_evicted),
        };
        let replaced = self.slots.lock().insert(key.clone(), slot);
        if let Some(callback) = replaced.and_then(|slot| slot.on_evicted) {
            self.queued
                .lock()
                .push((key, EvictionReason::Replaced, callback));
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<V>> {
        Ok(self.slots.lock().get(key).map(|slot| slot.value.clone()))
    }

    fn remove(&self, key: &str) -> Result<()> {
        if self.fail_removes.load(Ordering::SeqCst) {
            return Err(CacheError::Store("remove rejected".to_string()));
        }
        self.drop_slot(key, EvictionReason::Removed);
        Ok(())
    }

    fn count(&self) -> Result<usize> {
        Ok(self.slots.lock().len())
    }
}
