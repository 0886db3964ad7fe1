//! Error types for the cache
//!
//! Provides unified error handling using thiserror.

use thiserror::Error;

// == Cache Error Enum ==
/// Unified error type for the cache.
///
/// A missing key is not an error: lookups return `Ok(None)`.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Capacity limit, size weight or TTL out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The underlying store failed; propagated unchanged
    #[error("Store failure: {0}")]
    Store(String),
}

// == Result Type Alias ==
/// Convenience Result type for the cache.
pub type Result<T> = std::result::Result<T, CacheError>;
