//! Error-absorbing wrapper around the cache storage.
//!
//! Storage failures (quota, corruption, poisoned locks) are logged and
//! degrade to a cache miss. The cache must never be the reason a fetch
//! fails.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::keys::CacheKey;
use super::storage::{CacheStorage, CachedEntry};

/// Cache layer over a storage backend.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: S) -> Self {
    Self {
      storage: Arc::new(storage),
    }
  }

  /// Write a payload under the key's slot. Failures are logged and
  /// swallowed; the fetch that produced the payload already succeeded.
  pub fn put(&self, key: &CacheKey, data: &Value, ttl: Duration) {
    if let Err(e) = self.storage.put(&key.slot(), data, ttl) {
      warn!(slot = %key.slot(), "failed to write cache entry: {e}");
    }
  }

  /// Read the entry for a key, stale or not. Returns `None` on a miss or
  /// a storage failure. Staleness is logged, never enforced.
  pub fn lookup(&self, key: &CacheKey) -> Option<CachedEntry> {
    match self.storage.get(&key.slot()) {
      Ok(Some(entry)) => {
        if entry.is_stale() {
          debug!(slot = %key.slot(), cached_at = %entry.cached_at,
            "serving stale cache entry for {}", key.description());
        }
        Some(entry)
      }
      Ok(None) => None,
      Err(e) => {
        warn!(slot = %key.slot(), "failed to read cache entry: {e}");
        None
      }
    }
  }

  /// Remove one key's entry.
  #[allow(dead_code)]
  pub fn clear(&self, key: &CacheKey) {
    if let Err(e) = self.storage.remove(&key.slot()) {
      warn!(slot = %key.slot(), "failed to remove cache entry: {e}");
    }
  }

  /// Remove every cached entry.
  pub fn clear_all(&self) {
    if let Err(e) = self.storage.clear() {
      warn!("failed to clear cache: {e}");
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::storage::SqliteStorage;
  use color_eyre::eyre::eyre;
  use serde_json::json;

  /// Storage whose every operation fails, for exercising degradation.
  struct BrokenStorage;

  impl CacheStorage for BrokenStorage {
    fn put(&self, _: &str, _: &Value, _: Duration) -> color_eyre::Result<()> {
      Err(eyre!("disk full"))
    }
    fn get(&self, _: &str) -> color_eyre::Result<Option<CachedEntry>> {
      Err(eyre!("corrupt page"))
    }
    fn remove(&self, _: &str) -> color_eyre::Result<()> {
      Err(eyre!("disk full"))
    }
    fn clear(&self) -> color_eyre::Result<()> {
      Err(eyre!("disk full"))
    }
  }

  #[test]
  fn storage_failures_degrade_to_miss() {
    let cache = CacheLayer::new(BrokenStorage);
    cache.put(&CacheKey::Content, &json!({"x": 1}), Duration::from_secs(60));
    assert!(cache.lookup(&CacheKey::Content).is_none());
    cache.clear(&CacheKey::Content);
    cache.clear_all();
  }

  #[test]
  fn lookup_returns_stale_entries() {
    let cache = CacheLayer::new(SqliteStorage::in_memory().unwrap());
    let key = CacheKey::SyncStatus;
    cache.put(&key, &json!({"pending": true}), Duration::ZERO);

    let entry = cache.lookup(&key).expect("stale entry must be served");
    assert_eq!(entry.data, json!({"pending": true}));
  }

  #[test]
  fn clear_all_empties_every_slot() {
    let cache = CacheLayer::new(SqliteStorage::in_memory().unwrap());
    cache.put(&CacheKey::Content, &json!(1), Duration::from_secs(60));
    cache.put(&CacheKey::SyncStatus, &json!(2), Duration::from_secs(60));

    cache.clear_all();
    assert!(cache.lookup(&CacheKey::Content).is_none());
    assert!(cache.lookup(&CacheKey::SyncStatus).is_none());
  }
}
