//! Mirrors freshly-fetched payloads into the persisted screen store.
//!
//! Best-effort by contract: the fetch that produced the payload already
//! succeeded, so nothing here may invalidate it. The mirror runs as a
//! spawned task with its own error boundary; failures are logged and
//! dropped.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::api::envelope::{field, unwrap_envelope};
use crate::cache::CacheKey;
use crate::store::ScreenStore;

/// Republishes synchronizable resources into the screen store.
#[derive(Clone)]
pub struct SyncBridge {
  store: Arc<dyn ScreenStore>,
}

impl SyncBridge {
  pub fn new(store: Arc<dyn ScreenStore>) -> Self {
    Self { store }
  }

  /// Mirror a payload in the background. Returns immediately; the
  /// caller's fetch result does not wait on, or observe, this write.
  pub fn mirror(&self, key: &CacheKey, payload: Value) {
    let store = Arc::clone(&self.store);
    let key = key.clone();

    tokio::spawn(async move {
      if let Err(e) = mirror_payload(store.as_ref(), &key, &payload) {
        warn!(resource = %key.description(), "sync mirror failed: {e}");
      }
    });
  }
}

/// Route one payload into the store.
///
/// Unwraps one envelope level first. The content aggregate additionally
/// fans out its sub-resources, because downstream consumers subscribe to
/// schedule/prayer-times/events independently of the aggregate.
pub(crate) fn mirror_payload(
  store: &dyn ScreenStore,
  key: &CacheKey,
  payload: &Value,
) -> color_eyre::Result<()> {
  let inner = unwrap_envelope(payload);

  match key {
    CacheKey::Content => {
      store.save_screen_content(inner)?;
      if let Some(schedule) = field(inner, "schedule") {
        store.save_schedule(schedule)?;
      }
      if let Some(prayer_times) = field(inner, "prayerTimes") {
        store.save_prayer_times(prayer_times)?;
      }
      if let Some(events) = field(inner, "events") {
        store.save_events(events)?;
      }
      debug!("mirrored content aggregate into screen store");
    }
    CacheKey::PrayerTimes { .. } => {
      store.save_prayer_times(inner)?;
    }
    CacheKey::Events { .. } => {
      store.save_events(inner)?;
    }
    // Nothing downstream subscribes to sync status.
    CacheKey::SyncStatus => {}
  }

  Ok(())
}
