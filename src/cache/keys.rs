//! Cache keys for the screen API resources.

use chrono::NaiveDate;
use std::time::Duration;

/// Logical cache key: one physical slot per (resource, discriminator) pair.
///
/// Resources without query parameters map to a single static slot; a
/// date-parameterized resource gets one slot per date so different dates
/// never clobber each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
  /// Aggregate screen content (schedule, prayer times, events).
  Content,
  /// Prayer times, keyed by date ("today" when unspecified).
  PrayerTimes { date: Option<NaiveDate> },
  /// Upcoming events, keyed by the requested limit.
  Events { limit: Option<u32> },
  /// Backend sync status.
  SyncStatus,
}

impl CacheKey {
  /// The physical storage slot for this key.
  pub fn slot(&self) -> String {
    match self {
      CacheKey::Content => "content".to_string(),
      CacheKey::PrayerTimes { date } => match date {
        Some(d) => format!("prayer_times:{}", d.format("%Y-%m-%d")),
        None => "prayer_times:today".to_string(),
      },
      CacheKey::Events { limit } => match limit {
        Some(n) => format!("events:{}", n),
        None => "events:all".to_string(),
      },
      CacheKey::SyncStatus => "sync_status".to_string(),
    }
  }

  /// Default time-to-live for this resource.
  ///
  /// Staleness is informational only: an expired entry is still served as
  /// an offline fallback and is never deleted on read.
  pub fn default_ttl(&self) -> Duration {
    match self {
      CacheKey::Content => Duration::from_secs(5 * 60),
      CacheKey::PrayerTimes { .. } => Duration::from_secs(24 * 60 * 60),
      CacheKey::Events { .. } => Duration::from_secs(30 * 60),
      CacheKey::SyncStatus => Duration::from_secs(60),
    }
  }

  /// Human-readable label for logs.
  pub fn description(&self) -> String {
    match self {
      CacheKey::Content => "screen content".to_string(),
      CacheKey::PrayerTimes { date } => match date {
        Some(d) => format!("prayer times for {}", d),
        None => "prayer times for today".to_string(),
      },
      CacheKey::Events { limit } => match limit {
        Some(n) => format!("events (limit {})", n),
        None => "events".to_string(),
      },
      CacheKey::SyncStatus => "sync status".to_string(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn dates_get_distinct_slots() {
    let a = CacheKey::PrayerTimes {
      date: NaiveDate::from_ymd_opt(2026, 8, 6),
    };
    let b = CacheKey::PrayerTimes {
      date: NaiveDate::from_ymd_opt(2026, 8, 7),
    };
    assert_ne!(a.slot(), b.slot());
    assert_eq!(a.slot(), "prayer_times:2026-08-06");
  }

  #[test]
  fn unparameterized_keys_are_static() {
    assert_eq!(CacheKey::Content.slot(), "content");
    assert_eq!(CacheKey::SyncStatus.slot(), "sync_status");
    assert_eq!(CacheKey::PrayerTimes { date: None }.slot(), "prayer_times:today");
  }

  #[test]
  fn default_ttls() {
    assert_eq!(CacheKey::Content.default_ttl(), Duration::from_secs(300));
    assert_eq!(
      CacheKey::PrayerTimes { date: None }.default_ttl(),
      Duration::from_secs(86400)
    );
    assert_eq!(
      CacheKey::Events { limit: Some(10) }.default_ttl(),
      Duration::from_secs(1800)
    );
    assert_eq!(CacheKey::SyncStatus.default_ttl(), Duration::from_secs(60));
  }
}
