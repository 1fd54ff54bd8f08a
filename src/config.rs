use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::CacheTtls;
use crate::net::RetryPolicy;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub screen: ScreenConfig,
  #[serde(default)]
  pub retry: RetryConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Override for the data directory (cache, store, credentials, logs)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub base_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScreenConfig {
  /// Orientation reported while pairing
  #[serde(default = "default_orientation")]
  pub orientation: String,
  /// Seconds between heartbeats
  #[serde(default = "default_heartbeat")]
  pub heartbeat_interval_secs: u64,
  /// Seconds between content refreshes
  #[serde(default = "default_refresh")]
  pub refresh_interval_secs: u64,
  /// Seconds between API reachability probes
  #[serde(default = "default_probe")]
  pub probe_interval_secs: u64,
  /// Seconds between pairing-status polls while unpaired
  #[serde(default = "default_pairing_poll")]
  pub pairing_poll_secs: u64,
}

fn default_orientation() -> String {
  "LANDSCAPE".to_string()
}
fn default_heartbeat() -> u64 {
  60
}
fn default_refresh() -> u64 {
  300
}
fn default_probe() -> u64 {
  30
}
fn default_pairing_poll() -> u64 {
  5
}

impl Default for ScreenConfig {
  fn default() -> Self {
    Self {
      orientation: default_orientation(),
      heartbeat_interval_secs: default_heartbeat(),
      refresh_interval_secs: default_refresh(),
      probe_interval_secs: default_probe(),
      pairing_poll_secs: default_pairing_poll(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  #[serde(default = "default_initial_backoff")]
  pub initial_backoff_ms: u64,
  #[serde(default = "default_max_backoff")]
  pub max_backoff_ms: u64,
}

fn default_max_retries() -> u32 {
  3
}
fn default_initial_backoff() -> u64 {
  1_000
}
fn default_max_backoff() -> u64 {
  30_000
}

impl Default for RetryConfig {
  fn default() -> Self {
    Self {
      max_retries: default_max_retries(),
      initial_backoff_ms: default_initial_backoff(),
      max_backoff_ms: default_max_backoff(),
    }
  }
}

impl RetryConfig {
  pub fn policy(&self) -> RetryPolicy {
    RetryPolicy {
      max_retries: self.max_retries,
      initial_delay: Duration::from_millis(self.initial_backoff_ms),
      max_delay: Duration::from_millis(self.max_backoff_ms),
    }
  }
}

/// Per-resource TTL overrides, in seconds. Unset fields keep the
/// resource model's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  pub content_ttl_secs: Option<u64>,
  pub prayer_times_ttl_secs: Option<u64>,
  pub events_ttl_secs: Option<u64>,
  pub sync_status_ttl_secs: Option<u64>,
}

impl CacheConfig {
  pub fn ttls(&self) -> CacheTtls {
    let defaults = CacheTtls::default();
    CacheTtls {
      content: self
        .content_ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(defaults.content),
      prayer_times: self
        .prayer_times_ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(defaults.prayer_times),
      events: self
        .events_ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(defaults.events),
      sync_status: self
        .sync_status_ttl_secs
        .map(Duration::from_secs)
        .unwrap_or(defaults.sync_status),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./minbar.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/minbar/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/minbar/config.yaml\n\
                 with at least:\n  api:\n    base_url: https://your-backend.example"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("minbar.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("minbar").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// The directory holding cache, store, credentials, and logs.
  pub fn data_dir(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("minbar"))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn minimal_config_gets_defaults() {
    let config: Config = serde_yaml::from_str(
      "api:\n  base_url: https://api.example.com\n",
    )
    .unwrap();

    assert_eq!(config.api.base_url, "https://api.example.com");
    assert_eq!(config.screen.orientation, "LANDSCAPE");
    assert_eq!(config.screen.heartbeat_interval_secs, 60);
    assert_eq!(config.retry.max_retries, 3);

    let policy = config.retry.policy();
    assert_eq!(policy.initial_delay, Duration::from_secs(1));
    assert_eq!(policy.max_delay, Duration::from_secs(30));

    let ttls = config.cache.ttls();
    assert_eq!(ttls.content, Duration::from_secs(300));
    assert_eq!(ttls.prayer_times, Duration::from_secs(86400));
  }

  #[test]
  fn ttl_overrides_apply() {
    let config: Config = serde_yaml::from_str(
      "api:\n  base_url: https://api.example.com\ncache:\n  content_ttl_secs: 30\n",
    )
    .unwrap();

    let ttls = config.cache.ttls();
    assert_eq!(ttls.content, Duration::from_secs(30));
    // Untouched resources keep their defaults.
    assert_eq!(ttls.sync_status, Duration::from_secs(60));
  }
}
