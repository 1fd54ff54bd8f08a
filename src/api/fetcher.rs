//! Cache-aware fetching: retrying network reads with write-through
//! caching and offline fallback.

use serde_json::Value;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::{CacheKey, CacheLayer, CacheStorage};
use crate::net::{with_retry, NetworkMonitor, RetryPolicy};
use crate::sync::SyncBridge;

use super::error::ApiError;

/// Result of a cache-aware fetch.
///
/// `from_cache` is only ever true on the fallback path; a live network
/// success always reports `from_cache == false` with the response status.
#[derive(Debug, Clone)]
pub struct Fetched {
  pub data: Value,
  pub status: Option<u16>,
  pub from_cache: bool,
}

/// Composes the retry executor, the response cache, and the sync bridge.
pub struct CachedFetcher<S: CacheStorage> {
  cache: CacheLayer<S>,
  monitor: NetworkMonitor,
  retry: RetryPolicy,
  bridge: SyncBridge,
}

impl<S: CacheStorage> CachedFetcher<S> {
  pub fn new(
    cache: CacheLayer<S>,
    monitor: NetworkMonitor,
    retry: RetryPolicy,
    bridge: SyncBridge,
  ) -> Self {
    Self {
      cache,
      monitor,
      retry,
      bridge,
    }
  }

  pub fn monitor(&self) -> &NetworkMonitor {
    &self.monitor
  }

  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  /// Fetch a resource read-through:
  ///
  /// 1. online: run `fetch` under the retry policy
  /// 2. on success: write the raw body through to the cache, hand it to
  ///    the sync bridge in the background, return it live
  /// 3. on failure or offline: serve the cached entry, stale or not
  /// 4. with nothing cached: fail, distinguishing offline from
  ///    request-failed
  pub async fn fetch_with_cache<F, Fut>(
    &self,
    key: &CacheKey,
    ttl: Duration,
    fetch: F,
  ) -> Result<Fetched, ApiError>
  where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<(u16, Value), ApiError>>,
  {
    if self.monitor.status().is_online {
      match with_retry(&self.retry, &self.monitor, fetch).await {
        Ok((status, body)) => {
          self.cache.put(key, &body, ttl);
          self.bridge.mirror(key, body.clone());
          return Ok(Fetched {
            data: body,
            status: Some(status),
            from_cache: false,
          });
        }
        Err(err) => {
          warn!(resource = %key.description(), "fetch failed, trying cache: {err}");
          return self.from_cache(key, &err);
        }
      }
    }

    debug!(resource = %key.description(), "offline, serving from cache");
    self.from_cache(key, &ApiError::Offline)
  }

  /// Cache fallback shared by the offline and request-failed paths.
  fn from_cache(&self, key: &CacheKey, cause: &ApiError) -> Result<Fetched, ApiError> {
    if let Some(entry) = self.cache.lookup(key) {
      return Ok(Fetched {
        data: entry.data,
        status: None,
        from_cache: true,
      });
    }

    Err(match cause {
      ApiError::Offline => ApiError::OfflineNoCache,
      _ => ApiError::FailedNoCache,
    })
  }
}

impl<S: CacheStorage> Clone for CachedFetcher<S> {
  fn clone(&self) -> Self {
    Self {
      cache: self.cache.clone(),
      monitor: self.monitor.clone(),
      retry: self.retry,
      bridge: self.bridge.clone(),
    }
  }
}
