//! Connectivity tracking: host-reported online state plus periodic API
//! reachability probes.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Current connectivity as seen by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkStatus {
  /// Host-level connectivity (the browser's online/offline analog)
  pub is_online: bool,
  /// Whether the last reachability probe against the API succeeded
  pub is_api_reachable: bool,
  /// When the API was last probed
  pub last_checked: Option<DateTime<Utc>>,
}

impl NetworkStatus {
  fn initial() -> Self {
    // A fresh process assumes connectivity and lets the first probe
    // correct it; starting pessimistic would force a pointless cache
    // round before any network attempt.
    Self {
      is_online: true,
      is_api_reachable: true,
      last_checked: None,
    }
  }
}

/// Tracks network status and notifies subscribers on change.
///
/// Subscribers receive the current status immediately on subscription and
/// are only woken when `is_online` or `is_api_reachable` actually changes
/// value; probe repeats with the same outcome do not notify.
#[derive(Clone)]
pub struct NetworkMonitor {
  tx: watch::Sender<NetworkStatus>,
}

impl NetworkMonitor {
  pub fn new() -> Self {
    let (tx, _rx) = watch::channel(NetworkStatus::initial());
    Self { tx }
  }

  /// Snapshot of the current status.
  pub fn status(&self) -> NetworkStatus {
    *self.tx.borrow()
  }

  /// Subscribe to status changes. The receiver's current value is the
  /// present status; `changed()` resolves on the next transition.
  pub fn subscribe(&self) -> watch::Receiver<NetworkStatus> {
    self.tx.subscribe()
  }

  /// Report a host online/offline transition. Going offline also marks
  /// the API unreachable: a disconnected host cannot reach anything.
  pub fn set_online(&self, online: bool) {
    let changed = self.tx.send_if_modified(|status| {
      let before = (status.is_online, status.is_api_reachable);
      status.is_online = online;
      if !online {
        status.is_api_reachable = false;
      }
      before != (status.is_online, status.is_api_reachable)
    });
    if changed {
      info!(online, "host connectivity changed");
    }
  }

  /// Record the outcome of a reachability probe.
  ///
  /// `last_checked` always advances, but subscribers are only notified
  /// when the reachable flag flips.
  pub fn record_probe(&self, reachable: bool) {
    let changed = self.tx.send_if_modified(|status| {
      status.last_checked = Some(Utc::now());
      if status.is_api_reachable == reachable {
        return false;
      }
      status.is_api_reachable = reachable;
      true
    });
    if changed {
      info!(reachable, "API reachability changed");
    } else {
      debug!(reachable, "probe outcome unchanged");
    }
  }

  /// Spawn the periodic reachability probe.
  ///
  /// While the host is offline the probe short-circuits to unreachable
  /// without a network call. A transition back online triggers an
  /// immediate probe instead of waiting out the interval. The returned
  /// handle aborts the task when dropped.
  pub fn spawn_probe<F, Fut>(&self, interval: Duration, probe: F) -> ProbeHandle
  where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = bool> + Send + 'static,
  {
    let monitor = self.clone();
    let mut rx = self.subscribe();

    let handle = tokio::spawn(async move {
      let mut ticker = tokio::time::interval(interval);
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      let mut was_online = monitor.status().is_online;

      loop {
        tokio::select! {
          _ = ticker.tick() => {
            was_online = monitor.status().is_online;
          }
          changed = rx.changed() => {
            if changed.is_err() {
              break;
            }
            // Only an offline -> online transition warrants an
            // out-of-band probe; reachability flips (our own doing)
            // must not re-trigger us.
            let now_online = rx.borrow_and_update().is_online;
            let came_online = now_online && !was_online;
            was_online = now_online;
            if !came_online {
              continue;
            }
          }
        }

        if !monitor.status().is_online {
          monitor.record_probe(false);
          continue;
        }

        let reachable = probe().await;
        monitor.record_probe(reachable);
      }
    });

    ProbeHandle { handle }
  }
}

impl Default for NetworkMonitor {
  fn default() -> Self {
    Self::new()
  }
}

/// Guard for the probe task; aborts it on drop so no timer outlives the
/// monitor's owner.
pub struct ProbeHandle {
  handle: JoinHandle<()>,
}

impl Drop for ProbeHandle {
  fn drop(&mut self) {
    self.handle.abort();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
  use std::sync::Arc;

  #[tokio::test]
  async fn subscribers_see_current_status_immediately() {
    let monitor = NetworkMonitor::new();
    monitor.set_online(false);

    let rx = monitor.subscribe();
    let status = *rx.borrow();
    assert!(!status.is_online);
    assert!(!status.is_api_reachable);
  }

  #[tokio::test]
  async fn repeated_probe_outcomes_notify_once() {
    let monitor = NetworkMonitor::new();
    let mut rx = monitor.subscribe();
    rx.borrow_and_update();

    // Initial state is reachable; flip down once, then repeat.
    monitor.record_probe(false);
    monitor.record_probe(false);
    monitor.record_probe(false);

    assert!(rx.has_changed().unwrap());
    rx.borrow_and_update();
    // The repeats must not have queued further notifications.
    assert!(!rx.has_changed().unwrap());
  }

  #[tokio::test]
  async fn probe_updates_last_checked_without_notifying() {
    let monitor = NetworkMonitor::new();
    let mut rx = monitor.subscribe();
    rx.borrow_and_update();

    // Same outcome as the initial state: reachable.
    monitor.record_probe(true);
    assert!(monitor.status().last_checked.is_some());
    assert!(!rx.has_changed().unwrap());
  }

  #[tokio::test]
  async fn going_offline_marks_api_unreachable() {
    let monitor = NetworkMonitor::new();
    monitor.set_online(false);

    let status = monitor.status();
    assert!(!status.is_online);
    assert!(!status.is_api_reachable);
  }

  #[tokio::test]
  async fn offline_probe_short_circuits_without_network_call() {
    let monitor = NetworkMonitor::new();
    monitor.set_online(false);

    let called = Arc::new(AtomicBool::new(false));
    let called_probe = called.clone();
    let _probe = monitor.spawn_probe(Duration::from_millis(5), move || {
      let called = called_probe.clone();
      async move {
        called.store(true, Ordering::SeqCst);
        true
      }
    });

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!called.load(Ordering::SeqCst));
    assert!(!monitor.status().is_api_reachable);
  }

  #[tokio::test]
  async fn coming_online_triggers_immediate_probe() {
    let monitor = NetworkMonitor::new();
    monitor.set_online(false);

    let calls = Arc::new(AtomicU32::new(0));
    let calls_probe = calls.clone();
    // Long interval so only the transition can trigger a probe soon.
    let _probe = monitor.spawn_probe(Duration::from_secs(3600), move || {
      let calls = calls_probe.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        true
      }
    });

    // Let the task start and burn the immediate first tick (which
    // short-circuits offline).
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    monitor.set_online(true);
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(calls.load(Ordering::SeqCst) >= 1);
    assert!(monitor.status().is_api_reachable);
  }

  #[tokio::test]
  async fn dropping_the_handle_stops_the_probe() {
    let monitor = NetworkMonitor::new();
    let calls = Arc::new(AtomicU32::new(0));
    let calls_probe = calls.clone();
    let probe = monitor.spawn_probe(Duration::from_millis(5), move || {
      let calls = calls_probe.clone();
      async move {
        calls.fetch_add(1, Ordering::SeqCst);
        true
      }
    });

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(probe);
    let after_drop = calls.load(Ordering::SeqCst);

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(calls.load(Ordering::SeqCst), after_drop);
  }
}
