//! Public facade over the screen API.
//!
//! Pairing flow plus the authenticated operations, composed from the raw
//! HTTP client, the cache-aware fetcher, and the credential store. Every
//! authenticated operation guards on stored credentials locally before
//! touching the network.

use chrono::{NaiveDate, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::cache::{CacheKey, CacheStorage};
use crate::credentials::{CredentialStore, Credentials};
use crate::net::{with_retry, RetryPolicy};

use super::client::HttpClient;
use super::envelope::unwrap_envelope;
use super::error::ApiError;
use super::fetcher::CachedFetcher;
use super::types::{
  events_from_value, normalize_paired_credentials, parse_resource, PairedCredentials,
  PairingCode, PairingStatus, PrayerStatus, PrayerTimes, ScreenContent, ScreenEvent, SyncStatus,
};

/// A typed operation result, carrying whether it was served from cache.
#[derive(Debug, Clone)]
pub struct ApiData<T> {
  pub data: T,
  /// True only when the network path failed (or was skipped offline)
  /// and the cached copy was served instead.
  pub from_cache: bool,
  pub status: Option<u16>,
}

/// Per-resource cache TTLs.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
  pub content: Duration,
  pub prayer_times: Duration,
  pub events: Duration,
  pub sync_status: Duration,
}

impl Default for CacheTtls {
  fn default() -> Self {
    Self {
      content: CacheKey::Content.default_ttl(),
      prayer_times: CacheKey::PrayerTimes { date: None }.default_ttl(),
      events: CacheKey::Events { limit: None }.default_ttl(),
      sync_status: CacheKey::SyncStatus.default_ttl(),
    }
  }
}

/// Screen API client: pairing, heartbeat, and cached content reads.
pub struct ScreenClient<S: CacheStorage> {
  http: HttpClient,
  fetcher: CachedFetcher<S>,
  credentials: Arc<dyn CredentialStore>,
  retry: RetryPolicy,
  ttls: CacheTtls,
}

impl<S: CacheStorage> ScreenClient<S> {
  pub fn new(
    http: HttpClient,
    fetcher: CachedFetcher<S>,
    credentials: Arc<dyn CredentialStore>,
    retry: RetryPolicy,
    ttls: CacheTtls,
  ) -> Self {
    Self {
      http,
      fetcher,
      credentials,
      retry,
      ttls,
    }
  }

  // ==========================================================================
  // Pairing flow (unauthenticated)
  // ==========================================================================

  /// Request a short pairing code to show on the screen.
  pub async fn request_pairing_code(&self, orientation: &str) -> Result<PairingCode, ApiError> {
    let body = json!({ "orientation": orientation });
    let (_, response) = with_retry(&self.retry, self.fetcher.monitor(), || {
      self.http.post_unauthenticated("/api/screens/unpaired", &body)
    })
    .await?;

    parse_resource(unwrap_envelope(&response))
  }

  /// Poll whether the operator has entered the code yet.
  pub async fn check_pairing_status(&self, code: &str) -> Result<PairingStatus, ApiError> {
    let body = json!({ "pairingCode": code });
    let (_, response) = with_retry(&self.retry, self.fetcher.monitor(), || {
      self
        .http
        .post_unauthenticated("/api/screens/check-simple", &body)
    })
    .await?;

    parse_resource(unwrap_envelope(&response))
  }

  /// Exchange a confirmed pairing code for screen credentials and
  /// persist them.
  pub async fn get_paired_credentials(
    &self,
    code: &str,
  ) -> Result<PairedCredentials, ApiError> {
    let body = json!({ "pairingCode": code });
    let (_, response) = with_retry(&self.retry, self.fetcher.monitor(), || {
      self
        .http
        .post_unauthenticated("/api/screens/paired-credentials", &body)
    })
    .await?;

    let paired = apply_paired_credentials(self.credentials.as_ref(), &response)?;
    info!(screen_id = %paired.screen_id, "screen paired");
    Ok(paired)
  }

  // ==========================================================================
  // Authenticated operations
  // ==========================================================================

  /// Report liveness to the backend.
  pub async fn send_heartbeat(&self, status: &str) -> Result<(), ApiError> {
    self.ensure_authenticated()?;

    let body = json!({
      "status": status,
      "timestamp": Utc::now().to_rfc3339(),
    });
    with_retry(&self.retry, self.fetcher.monitor(), || {
      self.http.post("/api/screen/heartbeat", &body)
    })
    .await?;

    Ok(())
  }

  /// The aggregate content payload (schedule, prayer times, events).
  pub async fn get_content(&self) -> Result<ApiData<ScreenContent>, ApiError> {
    self.ensure_authenticated()?;

    let key = CacheKey::Content;
    let fetched = self
      .fetcher
      .fetch_with_cache(&key, self.ttls.content, || {
        self.http.get("/api/screen/content", &[])
      })
      .await?;

    Ok(ApiData {
      data: parse_resource(unwrap_envelope(&fetched.data))?,
      from_cache: fetched.from_cache,
      status: fetched.status,
    })
  }

  /// Prayer times for a date; today's when `date` is `None`.
  pub async fn get_prayer_times(
    &self,
    date: Option<NaiveDate>,
  ) -> Result<ApiData<PrayerTimes>, ApiError> {
    self.ensure_authenticated()?;

    let key = CacheKey::PrayerTimes { date };
    let params = [("date", date.map(|d| d.format("%Y-%m-%d").to_string()))];
    let fetched = self
      .fetcher
      .fetch_with_cache(&key, self.ttls.prayer_times, || {
        self.http.get("/api/screen/prayer-times", &params)
      })
      .await?;

    Ok(ApiData {
      data: parse_resource(unwrap_envelope(&fetched.data))?,
      from_cache: fetched.from_cache,
      status: fetched.status,
    })
  }

  /// Live prayer state. Too volatile for a cache slot: served straight
  /// through the retry executor.
  pub async fn get_prayer_status(&self) -> Result<PrayerStatus, ApiError> {
    self.ensure_authenticated()?;

    let (_, response) = with_retry(&self.retry, self.fetcher.monitor(), || {
      self.http.get("/api/screen/prayer-status", &[])
    })
    .await?;

    parse_resource(unwrap_envelope(&response))
  }

  /// Upcoming events, optionally limited.
  pub async fn get_events(
    &self,
    limit: Option<u32>,
  ) -> Result<ApiData<Vec<ScreenEvent>>, ApiError> {
    self.ensure_authenticated()?;

    let key = CacheKey::Events { limit };
    let params = [("limit", limit.map(|n| n.to_string()))];
    let fetched = self
      .fetcher
      .fetch_with_cache(&key, self.ttls.events, || {
        self.http.get("/api/screen/events", &params)
      })
      .await?;

    Ok(ApiData {
      data: events_from_value(unwrap_envelope(&fetched.data))?,
      from_cache: fetched.from_cache,
      status: fetched.status,
    })
  }

  /// Backend sync state for the screen.
  pub async fn get_sync_status(&self) -> Result<ApiData<SyncStatus>, ApiError> {
    self.ensure_authenticated()?;

    let key = CacheKey::SyncStatus;
    let fetched = self
      .fetcher
      .fetch_with_cache(&key, self.ttls.sync_status, || {
        self.http.get("/api/screen/sync", &[])
      })
      .await?;

    Ok(ApiData {
      data: parse_resource(unwrap_envelope(&fetched.data))?,
      from_cache: fetched.from_cache,
      status: fetched.status,
    })
  }

  /// Drop every cached response (does not touch credentials).
  pub fn clear_cache(&self) {
    self.fetcher.cache().clear_all();
  }

  /// Cheap local guard: no credentials means no network call.
  fn ensure_authenticated(&self) -> Result<(), ApiError> {
    if self.credentials.has_credentials() {
      Ok(())
    } else {
      Err(ApiError::NotAuthenticated)
    }
  }
}

/// Validate a paired-credentials response and persist the result.
///
/// Credentials are only written once the response has both required
/// fields; a malformed response leaves the store untouched.
fn apply_paired_credentials(
  store: &dyn CredentialStore,
  response: &Value,
) -> Result<PairedCredentials, ApiError> {
  let paired = normalize_paired_credentials(response)?;

  if paired.masjid_id.is_empty() {
    // The realtime channel needs the masjid id; pairing still succeeds
    // without it.
    warn!("pairing response has no masjidId, realtime updates unavailable");
  }

  let creds = Credentials {
    api_key: paired.api_key.clone(),
    screen_id: paired.screen_id.clone(),
    masjid_id: (!paired.masjid_id.is_empty()).then(|| paired.masjid_id.clone()),
  };
  store
    .save(&creds)
    .map_err(|e| ApiError::Internal(format!("failed to persist credentials: {}", e)))?;

  Ok(paired)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheLayer, SqliteStorage};
  use crate::credentials::MemoryCredentialStore;
  use crate::net::NetworkMonitor;
  use crate::store::ScreenStore;
  use crate::sync::SyncBridge;

  struct NullStore;

  impl ScreenStore for NullStore {
    fn save_screen_content(&self, _: &Value) -> color_eyre::Result<()> {
      Ok(())
    }
    fn save_schedule(&self, _: &Value) -> color_eyre::Result<()> {
      Ok(())
    }
    fn save_prayer_times(&self, _: &Value) -> color_eyre::Result<()> {
      Ok(())
    }
    fn save_events(&self, _: &Value) -> color_eyre::Result<()> {
      Ok(())
    }
  }

  fn client_with(credentials: Arc<dyn CredentialStore>) -> ScreenClient<SqliteStorage> {
    let monitor = NetworkMonitor::new();
    let http = HttpClient::new("https://api.example.com", Arc::clone(&credentials)).unwrap();
    let fetcher = CachedFetcher::new(
      CacheLayer::new(SqliteStorage::in_memory().unwrap()),
      monitor,
      RetryPolicy {
        max_retries: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
      },
      SyncBridge::new(Arc::new(NullStore)),
    );
    ScreenClient::new(
      http,
      fetcher,
      credentials,
      RetryPolicy {
        max_retries: 0,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(1),
      },
      CacheTtls::default(),
    )
  }

  #[tokio::test]
  async fn unauthenticated_operations_short_circuit() {
    let client = client_with(Arc::new(MemoryCredentialStore::new()));

    assert_eq!(
      client.get_content().await.unwrap_err(),
      ApiError::NotAuthenticated
    );
    assert_eq!(
      client.get_prayer_times(None).await.unwrap_err(),
      ApiError::NotAuthenticated
    );
    assert_eq!(
      client.get_prayer_status().await.unwrap_err(),
      ApiError::NotAuthenticated
    );
    assert_eq!(
      client.get_events(Some(10)).await.unwrap_err(),
      ApiError::NotAuthenticated
    );
    assert_eq!(
      client.get_sync_status().await.unwrap_err(),
      ApiError::NotAuthenticated
    );
    assert_eq!(
      client.send_heartbeat("ONLINE").await.unwrap_err(),
      ApiError::NotAuthenticated
    );
  }

  #[test]
  fn malformed_pairing_response_never_saves_credentials() {
    let store = MemoryCredentialStore::new();
    let response = json!({"screenId": "screen-9"});

    let err = apply_paired_credentials(&store, &response).unwrap_err();
    assert_eq!(err.to_string(), "Pairing response missing apiKey");
    assert!(!store.has_credentials());
  }

  #[test]
  fn valid_pairing_response_saves_credentials() {
    let store = MemoryCredentialStore::new();
    let response = json!({
      "data": {
        "apiKey": "key-123",
        "screenId": "screen-9",
        "masjidId": "masjid-1",
      }
    });

    let paired = apply_paired_credentials(&store, &response).unwrap();
    assert_eq!(paired.orientation, "LANDSCAPE");

    let saved = store.credentials().unwrap();
    assert_eq!(saved.api_key, "key-123");
    assert_eq!(saved.screen_id, "screen-9");
    assert_eq!(saved.masjid_id.as_deref(), Some("masjid-1"));
  }

  #[test]
  fn missing_masjid_id_saves_none() {
    let store = MemoryCredentialStore::new();
    let response = json!({"apiKey": "key-123", "screenId": "screen-9"});

    apply_paired_credentials(&store, &response).unwrap();
    assert_eq!(store.credentials().unwrap().masjid_id, None);
  }

  #[test]
  fn default_ttls_match_the_resource_model() {
    let ttls = CacheTtls::default();
    assert_eq!(ttls.content, Duration::from_secs(300));
    assert_eq!(ttls.prayer_times, Duration::from_secs(86400));
    assert_eq!(ttls.events, Duration::from_secs(1800));
    assert_eq!(ttls.sync_status, Duration::from_secs(60));
  }
}
