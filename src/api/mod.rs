//! Screen API access: transport, typed operations, and resilience.

mod client;
pub(crate) mod envelope;
mod error;
mod fetcher;
mod screen_client;
mod types;

pub use client::HttpClient;
pub use envelope::unwrap_envelope;
pub use error::ApiError;
pub use fetcher::{CachedFetcher, Fetched};
pub use screen_client::{ApiData, CacheTtls, ScreenClient};
pub use types::{
  PairedCredentials, PairingCode, PairingStatus, PrayerStatus, PrayerTimes, ScreenContent,
  ScreenEvent, SyncStatus,
};
