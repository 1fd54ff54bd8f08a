//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

/// A cached API response.
///
/// `cached_at` is stamped by the storage layer at write time, never by the
/// caller. Staleness is advisory: readers get the entry either way.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// The raw response payload as it came off the wire
  pub data: Value,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
  /// Time-to-live recorded at write time
  pub ttl: Duration,
}

impl CachedEntry {
  /// Whether the entry has outlived its TTL.
  pub fn is_stale(&self) -> bool {
    self.is_stale_at(Utc::now())
  }

  pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
    let age = now - self.cached_at;
    age > chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX)
  }
}

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Store a payload under a slot. Overwrite semantics: last write wins.
  fn put(&self, slot: &str, data: &Value, ttl: Duration) -> Result<()>;

  /// Get the entry for a slot, stale or not.
  fn get(&self, slot: &str) -> Result<Option<CachedEntry>>;

  /// Remove a single slot.
  fn remove(&self, slot: &str) -> Result<()>;

  /// Remove every entry.
  fn clear(&self) -> Result<()>;
}

/// Storage implementation that doesn't cache anything.
/// Used when caching is disabled - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn put(&self, _slot: &str, _data: &Value, _ttl: Duration) -> Result<()> {
    Ok(()) // Discard
  }

  fn get(&self, _slot: &str) -> Result<Option<CachedEntry>> {
    Ok(None) // Always miss
  }

  fn remove(&self, _slot: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Schema for the response cache.
///
/// One row per slot; `cached_at` defaults to the write time so callers
/// can never fabricate a timestamp.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    slot TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    ttl_ms INTEGER NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
);
"#;

impl SqliteStorage {
  /// Open or create the cache database at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// In-memory cache, used in tests and for `--no-cache` runs.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

impl CacheStorage for SqliteStorage {
  fn put(&self, slot: &str, data: &Value, ttl: Duration) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let blob =
      serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;
    let ttl_ms = ttl.as_millis() as i64;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (slot, data, ttl_ms, cached_at)
         VALUES (?, ?, ?, strftime('%Y-%m-%d %H:%M:%f', 'now'))",
        params![slot, blob, ttl_ms],
      )
      .map_err(|e| eyre!("Failed to store cache entry: {}", e))?;

    Ok(())
  }

  fn get(&self, slot: &str) -> Result<Option<CachedEntry>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT data, ttl_ms, cached_at FROM response_cache WHERE slot = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let row: Option<(Vec<u8>, i64, String)> = stmt
      .query_row(params![slot], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
      })
      .ok();

    match row {
      Some((blob, ttl_ms, cached_at_str)) => {
        let data: Value = serde_json::from_slice(&blob)
          .map_err(|e| eyre!("Failed to deserialize cache entry: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          data,
          cached_at,
          ttl: Duration::from_millis(ttl_ms.max(0) as u64),
        }))
      }
      None => Ok(None),
    }
  }

  fn remove(&self, slot: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM response_cache WHERE slot = ?", params![slot])
      .map_err(|e| eyre!("Failed to remove cache entry: {}", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM response_cache", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // strftime above stores "YYYY-MM-DD HH:MM:SS.SSS"; older rows may lack
  // the fractional part
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
