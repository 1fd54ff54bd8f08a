//! Error taxonomy for the data-access layer.
//!
//! Every public operation returns `Result<_, ApiError>`; nothing in this
//! layer panics or lets a raw transport/storage error escape its boundary.

use thiserror::Error;

/// Failure modes surfaced by the API client.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
  /// Non-2xx response from the server.
  #[error("HTTP {status}: {message}")]
  Status { status: u16, message: String },

  /// Connection-level failure (DNS, refused, reset).
  #[error("network error: {0}")]
  Transport(String),

  /// The request did not complete within the client timeout.
  #[error("request timed out")]
  Timeout,

  /// The network monitor reports offline; no request was attempted.
  #[error("offline")]
  Offline,

  /// Offline and the cache has nothing for this resource.
  #[error("offline and no cache available")]
  OfflineNoCache,

  /// All attempts failed and the cache has nothing for this resource.
  #[error("request failed and no cache available")]
  FailedNoCache,

  /// No stored credentials; authenticated call short-circuited locally.
  #[error("Not authenticated")]
  NotAuthenticated,

  /// The response parsed but is missing a required field or has the
  /// wrong shape (e.g. a pairing response without an apiKey).
  #[error("{0}")]
  InvalidResponse(String),

  /// Local failure outside the transport (e.g. credentials could not be
  /// persisted after pairing).
  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Whether the retry executor should attempt this request again.
  ///
  /// Auth failures and not-found are final. Offline is final because the
  /// executor must not burn its budget while disconnected. Everything
  /// transport-shaped (5xx, timeouts, connection errors) retries.
  pub fn is_retryable(&self) -> bool {
    match self {
      ApiError::Status { status, .. } => !matches!(status, 401 | 403 | 404),
      ApiError::Transport(_) | ApiError::Timeout => true,
      _ => false,
    }
  }

  /// The HTTP status code, when one was observed.
  pub fn status_code(&self) -> Option<u16> {
    match self {
      ApiError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_timeout() {
      ApiError::Timeout
    } else {
      ApiError::Transport(err.to_string())
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn auth_and_not_found_are_final() {
    for status in [401, 403, 404] {
      let err = ApiError::Status {
        status,
        message: String::new(),
      };
      assert!(!err.is_retryable(), "HTTP {} must not retry", status);
    }
  }

  #[test]
  fn server_errors_and_transport_retry() {
    let server = ApiError::Status {
      status: 503,
      message: "unavailable".into(),
    };
    assert!(server.is_retryable());
    assert!(ApiError::Transport("connection refused".into()).is_retryable());
    assert!(ApiError::Timeout.is_retryable());
  }

  #[test]
  fn local_short_circuits_are_final() {
    assert!(!ApiError::Offline.is_retryable());
    assert!(!ApiError::NotAuthenticated.is_retryable());
    assert!(!ApiError::InvalidResponse("bad".into()).is_retryable());
  }

  #[test]
  fn fallback_errors_have_exact_messages() {
    assert_eq!(
      ApiError::OfflineNoCache.to_string(),
      "offline and no cache available"
    );
    assert_eq!(
      ApiError::FailedNoCache.to_string(),
      "request failed and no cache available"
    );
  }
}
