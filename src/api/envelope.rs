//! Server envelope handling.
//!
//! Endpoints are inconsistent about wrapping: a response body may be the
//! resource itself or `{ "data": <resource>, ... }`. The rule here is
//! explicit rather than duck-typed probing: a JSON object is a wrapper
//! iff it carries a non-null `data` member, and that member wins. One
//! unwrap per boundary, never recursive.

use serde_json::Value;

/// Unwrap one envelope level. Returns the inner resource for a wrapper,
/// or the value itself when it is already the resource.
pub fn unwrap_envelope(value: &Value) -> &Value {
  match value.get("data") {
    Some(inner) if !inner.is_null() => inner,
    _ => value,
  }
}

/// A non-null field of an unwrapped resource object.
pub fn field<'a>(value: &'a Value, name: &str) -> Option<&'a Value> {
  value.get(name).filter(|v| !v.is_null())
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn raw_resource_passes_through() {
    let raw = json!({"schedule": {"items": []}, "prayerTimes": {}});
    assert_eq!(unwrap_envelope(&raw), &raw);
  }

  #[test]
  fn wrapper_unwraps_one_level() {
    let inner = json!({"schedule": {"items": []}});
    let wrapped = json!({"data": inner, "meta": {"requestId": "abc"}});
    assert_eq!(unwrap_envelope(&wrapped), &inner);
  }

  #[test]
  fn unwrap_is_not_recursive() {
    let doubly = json!({"data": {"data": {"x": 1}}});
    assert_eq!(unwrap_envelope(&doubly), &json!({"data": {"x": 1}}));
  }

  #[test]
  fn null_data_is_not_a_wrapper() {
    let value = json!({"data": null, "status": "empty"});
    assert_eq!(unwrap_envelope(&value), &value);
  }

  #[test]
  fn wrapped_and_raw_yield_the_same_resource() {
    let resource = json!({"events": [{"id": 1}]});
    let wrapped = json!({"data": resource});
    assert_eq!(unwrap_envelope(&resource), unwrap_envelope(&wrapped));
  }

  #[test]
  fn field_skips_nulls() {
    let value = json!({"schedule": null, "events": [1]});
    assert!(field(&value, "schedule").is_none());
    assert_eq!(field(&value, "events"), Some(&json!([1])));
    assert!(field(&value, "missing").is_none());
  }
}
