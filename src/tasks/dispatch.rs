//! Removal Callback Dispatch Task
//!
//! Runs store removal callbacks off the caller's thread, in the order the
//! removals happened.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{EvictionReason, OnEvicted};

/// A removal waiting for its callback to run.
pub struct RemovalEvent {
    pub key: String,
    pub reason: EvictionReason,
    pub callback: OnEvicted,
}

/// Spawns the task draining `events`; it ends when every sender is dropped.
///
/// `pending` is decremented after each callback returns. A panicking
/// callback is logged and does not stop the dispatcher.
pub fn spawn_dispatch_task(
    mut events: UnboundedReceiver<RemovalEvent>,
    pending: Arc<AtomicUsize>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!("Starting removal callback dispatcher");

        while let Some(event) = events.recv().await {
            let RemovalEvent {
                key,
                reason,
                callback,
            } = event;

            if catch_unwind(AssertUnwindSafe(|| callback(&key, reason))).is_err() {
                warn!(key = %key, %reason, "Removal callback panicked");
            }
            pending.fetch_sub(1, Ordering::AcqRel);
        }

        debug!("Removal callback dispatcher stopped");
    })
}
