//! Read-through response cache with offline fallback.
//!
//! - One slot per (resource, discriminator) pair, raw payloads as stored
//! - TTL staleness is informational: stale entries still serve as fallback
//! - Entries die only by overwrite or explicit clear, never on read
//! - Storage errors degrade to a miss instead of failing the caller

mod keys;
mod layer;
mod storage;

pub use keys::CacheKey;
pub use layer::CacheLayer;
pub use storage::{CacheStorage, CachedEntry, NoopStorage, SqliteStorage};
