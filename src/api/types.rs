//! Serde-deserializable types matching screen API responses.
//!
//! Deserialization is tolerant on purpose: the backend adds fields
//! between releases and a signage screen must keep rendering, so unknown
//! members land in flattened maps and most fields default.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use super::envelope::unwrap_envelope;
use super::error::ApiError;

/// Deserialize an unwrapped resource, mapping shape mismatches to a
/// domain error instead of a serde panic path.
pub fn parse_resource<T: DeserializeOwned>(value: &Value) -> Result<T, ApiError> {
  serde_json::from_value(value.clone())
    .map_err(|e| ApiError::InvalidResponse(format!("unexpected response shape: {}", e)))
}

// ============================================================================
// Pairing flow
// ============================================================================

/// Response to a pairing-code request.
#[derive(Debug, Clone, Deserialize)]
pub struct PairingCode {
  #[serde(rename = "pairingCode")]
  pub pairing_code: String,
  #[serde(rename = "expiresAt", default)]
  pub expires_at: Option<String>,
}

/// Response to a pairing-status poll.
#[derive(Debug, Clone, Deserialize)]
pub struct PairingStatus {
  #[serde(default)]
  pub paired: bool,
  #[serde(default)]
  pub status: Option<String>,
}

/// Credentials and screen identity issued once pairing completes,
/// normalized: optional fields default to empty string / "LANDSCAPE".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairedCredentials {
  pub api_key: String,
  pub screen_id: String,
  pub masjid_id: String,
  pub screen_name: String,
  pub orientation: String,
}

/// Validate and normalize a paired-credentials response body.
///
/// The body may nest the payload under `data` one more time; unwrap one
/// level before inspecting. Missing `apiKey` or `screenId` is a hard
/// failure with a specific message; everything else normalizes to
/// defaults.
pub fn normalize_paired_credentials(body: &Value) -> Result<PairedCredentials, ApiError> {
  let inner = unwrap_envelope(body);

  let api_key = string_field(inner, "apiKey")
    .ok_or_else(|| ApiError::InvalidResponse("Pairing response missing apiKey".to_string()))?;
  let screen_id = string_field(inner, "screenId")
    .ok_or_else(|| ApiError::InvalidResponse("Pairing response missing screenId".to_string()))?;

  Ok(PairedCredentials {
    api_key,
    screen_id,
    masjid_id: string_field(inner, "masjidId").unwrap_or_default(),
    screen_name: string_field(inner, "screenName").unwrap_or_default(),
    orientation: string_field(inner, "orientation")
      .unwrap_or_else(|| "LANDSCAPE".to_string()),
  })
}

/// A non-empty string member of a JSON object.
fn string_field(value: &Value, name: &str) -> Option<String> {
  value
    .get(name)
    .and_then(|v| v.as_str())
    .filter(|s| !s.is_empty())
    .map(String::from)
}

// ============================================================================
// Screen resources
// ============================================================================

/// Aggregate content payload for the screen.
///
/// The sub-resources stay as raw values: they are mirrored into the
/// persisted store as-is, and their inner shape belongs to the renderer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenContent {
  #[serde(default)]
  pub schedule: Option<Value>,
  #[serde(rename = "prayerTimes", default)]
  pub prayer_times: Option<Value>,
  #[serde(default)]
  pub events: Option<Value>,
  #[serde(flatten)]
  pub extra: HashMap<String, Value>,
}

/// Prayer times for a single day.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrayerTimes {
  #[serde(default)]
  pub date: String,
  #[serde(default)]
  pub fajr: String,
  #[serde(default)]
  pub sunrise: String,
  #[serde(default)]
  pub dhuhr: String,
  #[serde(default)]
  pub asr: String,
  #[serde(default)]
  pub maghrib: String,
  #[serde(default)]
  pub isha: String,
  #[serde(flatten)]
  pub extra: HashMap<String, Value>,
}

/// Live prayer state (current/next prayer and countdown).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PrayerStatus {
  #[serde(rename = "currentPrayer", default)]
  pub current_prayer: Option<String>,
  #[serde(rename = "nextPrayer", default)]
  pub next_prayer: Option<String>,
  #[serde(rename = "timeUntilNext", default)]
  pub time_until_next: Option<String>,
  #[serde(flatten)]
  pub extra: HashMap<String, Value>,
}

/// A single announcement/event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScreenEvent {
  #[serde(default)]
  pub id: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  #[serde(rename = "startTime", default)]
  pub start_time: Option<String>,
  #[serde(flatten)]
  pub extra: HashMap<String, Value>,
}

/// Backend sync state for the screen.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncStatus {
  #[serde(rename = "lastSync", default)]
  pub last_sync: Option<String>,
  #[serde(default)]
  pub pending: bool,
  #[serde(flatten)]
  pub extra: HashMap<String, Value>,
}

/// Extract the event list from an unwrapped events payload.
///
/// The endpoint has returned both a bare array and `{"events": [...]}`
/// over time; accept either.
pub fn events_from_value(value: &Value) -> Result<Vec<ScreenEvent>, ApiError> {
  let list = if value.is_array() {
    value
  } else if let Some(events) = value.get("events").filter(|v| v.is_array()) {
    events
  } else {
    return Err(ApiError::InvalidResponse(
      "events response is neither a list nor an object with events".to_string(),
    ));
  };

  parse_resource(list)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn pairing_normalization_fills_defaults() {
    let body = json!({
      "apiKey": "key-123",
      "screenId": "screen-9",
      "masjidId": "masjid-1",
    });

    let creds = normalize_paired_credentials(&body).unwrap();
    assert_eq!(creds.api_key, "key-123");
    assert_eq!(creds.screen_id, "screen-9");
    assert_eq!(creds.masjid_id, "masjid-1");
    assert_eq!(creds.screen_name, "");
    assert_eq!(creds.orientation, "LANDSCAPE");
  }

  #[test]
  fn pairing_unwraps_a_nested_envelope() {
    let body = json!({
      "data": {
        "apiKey": "key-123",
        "screenId": "screen-9",
        "orientation": "PORTRAIT",
      }
    });

    let creds = normalize_paired_credentials(&body).unwrap();
    assert_eq!(creds.api_key, "key-123");
    assert_eq!(creds.orientation, "PORTRAIT");
  }

  #[test]
  fn missing_api_key_is_a_domain_error() {
    let body = json!({"screenId": "screen-9"});
    let err = normalize_paired_credentials(&body).unwrap_err();
    assert_eq!(err.to_string(), "Pairing response missing apiKey");
  }

  #[test]
  fn missing_screen_id_is_a_domain_error() {
    let body = json!({"apiKey": "key-123"});
    let err = normalize_paired_credentials(&body).unwrap_err();
    assert_eq!(err.to_string(), "Pairing response missing screenId");
  }

  #[test]
  fn empty_strings_count_as_missing() {
    let body = json!({"apiKey": "", "screenId": "screen-9"});
    let err = normalize_paired_credentials(&body).unwrap_err();
    assert_eq!(err.to_string(), "Pairing response missing apiKey");
  }

  #[test]
  fn absent_masjid_id_is_not_fatal() {
    let body = json!({"apiKey": "key-123", "screenId": "screen-9"});
    let creds = normalize_paired_credentials(&body).unwrap();
    assert!(creds.masjid_id.is_empty());
  }

  #[test]
  fn events_accepts_bare_list_and_wrapper_object() {
    let bare = json!([{"id": "1", "title": "Iftar"}]);
    let object = json!({"events": [{"id": "1", "title": "Iftar"}]});

    let a = events_from_value(&bare).unwrap();
    let b = events_from_value(&object).unwrap();
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert_eq!(a[0].title, "Iftar");

    assert!(events_from_value(&json!({"items": []})).is_err());
  }

  #[test]
  fn content_keeps_unknown_fields() {
    let content: ScreenContent = parse_resource(&json!({
      "schedule": {"items": [1, 2]},
      "prayerTimes": {"fajr": "05:12"},
      "theme": "midnight",
    }))
    .unwrap();

    assert!(content.schedule.is_some());
    assert!(content.prayer_times.is_some());
    assert!(content.events.is_none());
    assert_eq!(content.extra.get("theme"), Some(&json!("midnight")));
  }
}
