//! Durable, per-key expiring cache for API responses.
//!
//! This module provides a fail-open cache that:
//! - Stores any serializable value under an opaque string key
//! - Expires entries lazily on read, or in bulk via `cleanup_expired`
//! - Degrades to empty results instead of erroring when storage is broken

mod entry;
mod layer;
mod storage;

pub use entry::CacheEntry;
pub use layer::OfflineCache;
