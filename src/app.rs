//! Daemon wiring and run loop.
//!
//! Builds the service context once (credential store, cache, screen
//! store, network monitor, API client) and drives the screen lifecycle:
//! pair if needed, then heartbeat and refresh on intervals so the
//! persisted store stays warm for whatever renders the display.

use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::{ApiError, CachedFetcher, HttpClient, ScreenClient};
use crate::cache::{CacheLayer, SqliteStorage};
use crate::config::Config;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::net::NetworkMonitor;
use crate::store::{ScreenStore, SqliteScreenStore};
use crate::sync::SyncBridge;

pub struct App {
  config: Config,
  client: ScreenClient<SqliteStorage>,
  credentials: Arc<dyn CredentialStore>,
  monitor: NetworkMonitor,
  http: HttpClient,
}

impl App {
  pub fn new(config: Config) -> Result<Self> {
    let data_dir = config.data_dir()?;

    let credentials: Arc<dyn CredentialStore> =
      Arc::new(FileCredentialStore::new(data_dir.join("credentials.json")));
    let monitor = NetworkMonitor::new();
    let http = HttpClient::new(&config.api.base_url, Arc::clone(&credentials))?;

    let cache = CacheLayer::new(SqliteStorage::open(&data_dir.join("cache.db"))?);
    let store: Arc<dyn ScreenStore> =
      Arc::new(SqliteScreenStore::open(&data_dir.join("store.db"))?);

    let fetcher = CachedFetcher::new(
      cache,
      monitor.clone(),
      config.retry.policy(),
      SyncBridge::new(store),
    );
    let client = ScreenClient::new(
      http.clone(),
      fetcher,
      Arc::clone(&credentials),
      config.retry.policy(),
      config.cache.ttls(),
    );

    Ok(Self {
      config,
      client,
      credentials,
      monitor,
      http,
    })
  }

  /// Drop every cached response, e.g. before handing a device to a
  /// different masjid.
  pub fn clear_cache(&self) {
    self.client.clear_cache();
  }

  pub async fn run(&self) -> Result<()> {
    let http = self.http.clone();
    let _probe = self.monitor.spawn_probe(
      Duration::from_secs(self.config.screen.probe_interval_secs),
      move || {
        let http = http.clone();
        async move { http.probe_health().await }
      },
    );

    self.ensure_paired().await?;

    let mut heartbeat = tokio::time::interval(Duration::from_secs(
      self.config.screen.heartbeat_interval_secs,
    ));
    let mut refresh = tokio::time::interval(Duration::from_secs(
      self.config.screen.refresh_interval_secs,
    ));

    info!("entering heartbeat/refresh loop");
    loop {
      tokio::select! {
        _ = heartbeat.tick() => self.send_heartbeat().await,
        _ = refresh.tick() => self.refresh().await,
        _ = tokio::signal::ctrl_c() => {
          info!("shutting down");
          return Ok(());
        }
      }
    }
  }

  /// Run the pairing flow until the screen has credentials.
  ///
  /// Requests a code, surfaces it for the operator, and polls the
  /// status endpoint. An expired code (404 on the poll) loops back to
  /// requesting a fresh one.
  async fn ensure_paired(&self) -> Result<()> {
    if self.credentials.has_credentials() {
      info!("screen already paired");
      return Ok(());
    }

    let poll = Duration::from_secs(self.config.screen.pairing_poll_secs);

    loop {
      let code = match self
        .client
        .request_pairing_code(&self.config.screen.orientation)
        .await
      {
        Ok(code) => code,
        Err(e) => {
          warn!("failed to request pairing code: {e}");
          tokio::time::sleep(poll).await;
          continue;
        }
      };

      info!(
        code = %code.pairing_code,
        expires = code.expires_at.as_deref().unwrap_or("unknown"),
        "pairing code issued, enter it in the admin panel"
      );

      loop {
        tokio::time::sleep(poll).await;

        match self.client.check_pairing_status(&code.pairing_code).await {
          Ok(status) if status.paired => {
            match self
              .client
              .get_paired_credentials(&code.pairing_code)
              .await
            {
              Ok(_) => return Ok(()),
              Err(e) => {
                error!("pairing confirmed but credential fetch failed: {e}");
                break;
              }
            }
          }
          Ok(_) => {}
          Err(ApiError::Status { status: 404, .. }) => {
            info!("pairing code expired, requesting a new one");
            break;
          }
          Err(e) => warn!("pairing status check failed: {e}"),
        }
      }
    }
  }

  async fn send_heartbeat(&self) {
    if let Err(e) = self.client.send_heartbeat("ONLINE").await {
      warn!("heartbeat failed: {e}");
    }
  }

  /// Pull every synchronizable resource. Each fetch mirrors into the
  /// persisted store on success; cache fallbacks are logged so the
  /// operator can correlate staleness with connectivity.
  async fn refresh(&self) {
    match self.client.get_content().await {
      Ok(content) if content.from_cache => info!("content served from cache"),
      Ok(_) => info!("content refreshed"),
      Err(e) => warn!("content refresh failed: {e}"),
    }

    if let Err(e) = self.client.get_prayer_times(None).await {
      warn!("prayer times refresh failed: {e}");
    }

    if let Err(e) = self.client.get_events(None).await {
      warn!("events refresh failed: {e}");
    }

    match self.client.get_prayer_status().await {
      Ok(status) => {
        if let Some(next) = status.next_prayer {
          info!(%next, "prayer status updated");
        }
      }
      Err(e) => warn!("prayer status refresh failed: {e}"),
    }

    match self.client.get_sync_status().await {
      Ok(status) if status.data.pending => info!("backend reports pending sync"),
      Ok(_) => {}
      Err(e) => warn!("sync status refresh failed: {e}"),
    }
  }
}
