//! TTL Sweep Task
//!
//! Background task that periodically drops expired store entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::store::MemoryStore;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task sleeps for `interval` between sweeps and holds only a weak
/// reference to the store, so it stops on its own once the store is dropped.
/// The returned handle can be aborted for an earlier stop.
///
/// # Example
/// ```ignore
/// let store = MemoryStore::<String>::spawn(Duration::from_secs(1));
/// // MemoryStore::spawn already starts a sweeper; this one just runs alongside
/// let handle = spawn_sweep_task(Arc::downgrade(&store), Duration::from_millis(250));
/// handle.abort();
/// ```
pub fn spawn_sweep_task<V>(store: Weak<MemoryStore<V>>, interval: Duration) -> JoinHandle<()>
where
    V: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!("Starting TTL sweep task with interval of {:?}", interval);

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("Store dropped, stopping TTL sweep task");
                break;
            };
            let removed = store.sweep_expired();
            drop(store);

            if removed > 0 {
                info!("TTL sweep: removed {} expired entries", removed);
            } else {
                debug!("TTL sweep: no expired entries found");
            }
        }
    })
}
