//! Persisted application store consumed by the rendering side.
//!
//! The sync bridge republishes freshly-fetched resources here so
//! downstream consumers (carousel, prayer panels, countdowns) see new
//! data without depending on the fetch layer. One row per resource,
//! last write wins; no transaction spans resources, so one failed write
//! never corrupts a neighbor.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection};
use serde_json::Value;
use std::path::Path;
use std::sync::Mutex;

/// The persisted-store surface the sync bridge writes through.
pub trait ScreenStore: Send + Sync {
  /// Full content aggregate, as unwrapped from the server response.
  fn save_screen_content(&self, content: &Value) -> Result<()>;

  /// Content schedule sub-resource.
  fn save_schedule(&self, schedule: &Value) -> Result<()>;

  /// Prayer times (sub-resource of content, or a standalone fetch).
  fn save_prayer_times(&self, prayer_times: &Value) -> Result<()>;

  /// Events list (sub-resource of content, or a standalone fetch).
  fn save_events(&self, events: &Value) -> Result<()>;
}

/// SQLite-backed screen store.
pub struct SqliteScreenStore {
  conn: Mutex<Connection>,
}

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS screen_state (
    resource TEXT PRIMARY KEY,
    data BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl SqliteScreenStore {
  /// Open or create the store database at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// In-memory store, used in tests.
  pub fn in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory store database: {}", e))?;
    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  fn save(&self, resource: &str, data: &Value) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let blob =
      serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize {}: {}", resource, e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO screen_state (resource, data, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![resource, blob],
      )
      .map_err(|e| eyre!("Failed to store {}: {}", resource, e))?;

    Ok(())
  }

  /// Read back a resource; used by whatever drives the display.
  pub fn load(&self, resource: &str) -> Result<Option<Value>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT data FROM screen_state WHERE resource = ?")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let blob: Option<Vec<u8>> = stmt.query_row(params![resource], |row| row.get(0)).ok();

    match blob {
      Some(blob) => {
        let value = serde_json::from_slice(&blob)
          .map_err(|e| eyre!("Failed to deserialize {}: {}", resource, e))?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }
}

impl ScreenStore for SqliteScreenStore {
  fn save_screen_content(&self, content: &Value) -> Result<()> {
    self.save("screen_content", content)
  }

  fn save_schedule(&self, schedule: &Value) -> Result<()> {
    self.save("schedule", schedule)
  }

  fn save_prayer_times(&self, prayer_times: &Value) -> Result<()> {
    self.save("prayer_times", prayer_times)
  }

  fn save_events(&self, events: &Value) -> Result<()> {
    self.save("events", events)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn save_and_load_each_resource() {
    let store = SqliteScreenStore::in_memory().unwrap();

    store.save_screen_content(&json!({"theme": "day"})).unwrap();
    store.save_schedule(&json!({"items": [1]})).unwrap();
    store.save_prayer_times(&json!({"fajr": "05:12"})).unwrap();
    store.save_events(&json!([{"id": "1"}])).unwrap();

    assert_eq!(
      store.load("screen_content").unwrap(),
      Some(json!({"theme": "day"}))
    );
    assert_eq!(store.load("schedule").unwrap(), Some(json!({"items": [1]})));
    assert_eq!(
      store.load("prayer_times").unwrap(),
      Some(json!({"fajr": "05:12"}))
    );
    assert_eq!(store.load("events").unwrap(), Some(json!([{"id": "1"}])));
  }

  #[test]
  fn last_write_wins_per_resource() {
    let store = SqliteScreenStore::in_memory().unwrap();
    store.save_prayer_times(&json!({"fajr": "05:12"})).unwrap();
    store.save_prayer_times(&json!({"fajr": "05:13"})).unwrap();

    assert_eq!(
      store.load("prayer_times").unwrap(),
      Some(json!({"fajr": "05:13"}))
    );
  }

  #[test]
  fn unknown_resource_is_none() {
    let store = SqliteScreenStore::in_memory().unwrap();
    assert!(store.load("nope").unwrap().is_none());
  }
}
