//! Screen credentials issued by the pairing flow.
//!
//! The data-access core only ever reads these; the pairing flow is the
//! single writer.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

/// Identity and auth material for a paired screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
  pub api_key: String,
  pub screen_id: String,
  #[serde(default)]
  pub masjid_id: Option<String>,
}

impl Credentials {
  /// Value for the `Authorization` header.
  pub fn auth_header(&self) -> String {
    format!("Bearer {}", self.api_key)
  }
}

/// Storage for screen credentials.
pub trait CredentialStore: Send + Sync {
  /// The stored credentials, if the screen is paired.
  fn credentials(&self) -> Option<Credentials>;

  /// Persist credentials after a successful pairing.
  fn save(&self, creds: &Credentials) -> Result<()>;

  /// Forget the stored credentials (forced re-pairing).
  fn clear(&self) -> Result<()>;

  /// Cheap local guard used before any authenticated request.
  fn has_credentials(&self) -> bool {
    self.credentials().is_some()
  }
}

/// Credentials persisted as a JSON file under the data directory.
pub struct FileCredentialStore {
  path: PathBuf,
}

impl FileCredentialStore {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }
}

impl CredentialStore for FileCredentialStore {
  fn credentials(&self) -> Option<Credentials> {
    let contents = match std::fs::read_to_string(&self.path) {
      Ok(c) => c,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
      Err(e) => {
        warn!(path = %self.path.display(), "failed to read credentials: {e}");
        return None;
      }
    };

    match serde_json::from_str(&contents) {
      Ok(creds) => Some(creds),
      Err(e) => {
        warn!(path = %self.path.display(), "failed to parse credentials: {e}");
        None
      }
    }
  }

  fn save(&self, creds: &Credentials) -> Result<()> {
    if let Some(parent) = self.path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create credentials directory: {}", e))?;
    }

    let contents = serde_json::to_string_pretty(creds)
      .map_err(|e| eyre!("Failed to serialize credentials: {}", e))?;

    std::fs::write(&self.path, contents)
      .map_err(|e| eyre!("Failed to write credentials to {}: {}", self.path.display(), e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    match std::fs::remove_file(&self.path) {
      Ok(()) => Ok(()),
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
      Err(e) => Err(eyre!("Failed to remove credentials: {}", e)),
    }
  }
}

/// In-memory credentials, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCredentialStore {
  inner: Mutex<Option<Credentials>>,
}

impl MemoryCredentialStore {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_credentials(creds: Credentials) -> Self {
    Self {
      inner: Mutex::new(Some(creds)),
    }
  }
}

impl CredentialStore for MemoryCredentialStore {
  fn credentials(&self) -> Option<Credentials> {
    self.inner.lock().ok().and_then(|guard| guard.clone())
  }

  fn save(&self, creds: &Credentials) -> Result<()> {
    let mut guard = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *guard = Some(creds.clone());
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let mut guard = self
      .inner
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *guard = None;
    Ok(())
  }
}
