//! Raw HTTP client for the screen API.
//!
//! Thin transport wrapper: URL construction, header injection, JSON
//! parsing, status classification. No retries and no caching here; those
//! belong to the layers above.

use color_eyre::{eyre::eyre, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;
use url::Url;

use crate::credentials::CredentialStore;

use super::error::ApiError;

/// Header carrying the screen identity on authenticated requests.
const SCREEN_ID_HEADER: &str = "X-Screen-ID";

/// Per-request timeout for regular API calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Hard cap for reachability probes; a hung probe must never block the
/// next scheduled one.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Screen API transport.
#[derive(Clone)]
pub struct HttpClient {
  http: reqwest::Client,
  base_url: Url,
  credentials: Arc<dyn CredentialStore>,
}

impl HttpClient {
  pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> Result<Self> {
    let base_url =
      Url::parse(base_url).map_err(|e| eyre!("Invalid API base URL {}: {}", base_url, e))?;

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .user_agent(concat!("minbar/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      credentials,
    })
  }

  /// Build an endpoint URL, appending query params and filtering out
  /// absent values before encoding.
  fn endpoint(&self, path: &str, params: &[(&str, Option<String>)]) -> Result<Url, ApiError> {
    let mut url = self
      .base_url
      .join(path)
      .map_err(|e| ApiError::InvalidResponse(format!("invalid endpoint {}: {}", path, e)))?;

    {
      let mut pairs = url.query_pairs_mut();
      for (name, value) in params {
        if let Some(value) = value {
          pairs.append_pair(name, value);
        }
      }
    }
    if url.query() == Some("") {
      url.set_query(None);
    }

    Ok(url)
  }

  /// Headers for authenticated endpoints: bearer key plus screen id.
  fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
    let creds = self
      .credentials
      .credentials()
      .ok_or(ApiError::NotAuthenticated)?;

    let mut headers = HeaderMap::new();
    headers.insert(
      AUTHORIZATION,
      HeaderValue::from_str(&creds.auth_header())
        .map_err(|e| ApiError::Transport(format!("invalid auth header: {}", e)))?,
    );
    headers.insert(
      SCREEN_ID_HEADER,
      HeaderValue::from_str(&creds.screen_id)
        .map_err(|e| ApiError::Transport(format!("invalid screen id: {}", e)))?,
    );
    Ok(headers)
  }

  /// Authenticated GET returning the raw JSON body and status.
  pub async fn get(
    &self,
    path: &str,
    params: &[(&str, Option<String>)],
  ) -> Result<(u16, Value), ApiError> {
    let url = self.endpoint(path, params)?;
    let headers = self.auth_headers()?;
    trace!(%url, "GET");

    let response = self.http.get(url).headers(headers).send().await?;
    Self::read_response(response).await
  }

  /// Authenticated POST with a JSON body.
  pub async fn post(&self, path: &str, body: &Value) -> Result<(u16, Value), ApiError> {
    let url = self.endpoint(path, &[])?;
    let headers = self.auth_headers()?;
    trace!(%url, "POST");

    let response = self
      .http
      .post(url)
      .headers(headers)
      .json(body)
      .send()
      .await?;
    Self::read_response(response).await
  }

  /// Unauthenticated POST for the pairing endpoints, which must never
  /// carry stale credentials.
  pub async fn post_unauthenticated(
    &self,
    path: &str,
    body: &Value,
  ) -> Result<(u16, Value), ApiError> {
    let url = self.endpoint(path, &[])?;
    trace!(%url, "POST (pairing)");

    let response = self.http.post(url).json(body).send().await?;
    Self::read_response(response).await
  }

  /// Lightweight reachability probe against the health endpoint.
  /// Any failure or timeout counts as unreachable.
  pub async fn probe_health(&self) -> bool {
    let url = match self.endpoint("/api/health", &[]) {
      Ok(url) => url,
      Err(_) => return false,
    };

    let request = self.http.head(url).send();
    match tokio::time::timeout(PROBE_TIMEOUT, request).await {
      Ok(Ok(response)) => response.status().is_success(),
      _ => false,
    }
  }

  async fn read_response(response: reqwest::Response) -> Result<(u16, Value), ApiError> {
    let status = response.status();
    let text = response.text().await?;

    let body: Value = if text.trim().is_empty() {
      Value::Null
    } else {
      serde_json::from_str(&text).map_err(|e| {
        ApiError::InvalidResponse(format!("response is not valid JSON: {}", e))
      })?
    };

    if !status.is_success() {
      return Err(ApiError::Status {
        status: status.as_u16(),
        message: error_message(&body, status),
      });
    }

    Ok((status.as_u16(), body))
  }
}

/// Best error message available for a failed response: the server's
/// `error`/`message` field when present, the status reason otherwise.
fn error_message(body: &Value, status: reqwest::StatusCode) -> String {
  body
    .get("error")
    .or_else(|| body.get("message"))
    .and_then(|v| v.as_str())
    .map(String::from)
    .unwrap_or_else(|| {
      status
        .canonical_reason()
        .unwrap_or("request failed")
        .to_string()
    })
}
