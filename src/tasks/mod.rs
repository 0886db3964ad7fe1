//! Background Tasks Module
//!
//! Background tasks the in-memory store runs while it is alive.
//!
//! # Tasks
//! - TTL Sweep: drops expired entries at the configured interval
//! - Dispatch: runs removal callbacks off the caller's thread

mod dispatch;
mod sweep;

pub use dispatch::{spawn_dispatch_task, RemovalEvent};
pub use sweep::spawn_sweep_task;
