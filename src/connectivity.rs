// Connectivity tracking.
// A subscribable connected/disconnected signal plus an HTTP probe that drives it.

use std::time::Duration;

use reqwest::Client;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Source of the device's connectivity state.
///
/// `None` means the state has not been determined yet; callers treat it as online.
pub trait Connectivity: Send + Sync {
    /// Current state, read fresh on every call.
    fn is_connected(&self) -> Option<bool>;

    /// Receive every subsequent change. Dropping the receiver unsubscribes.
    fn subscribe(&self) -> watch::Receiver<Option<bool>>;
}

/// Connectivity state that can be set directly and observed by many subscribers.
#[derive(Debug, Clone)]
pub struct SharedConnectivity {
    tx: watch::Sender<Option<bool>>,
}

impl SharedConnectivity {
    pub fn new(initial: Option<bool>) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Publish a new state. Subscribers are only woken when it actually changes.
    pub fn set(&self, connected: bool) {
        self.tx.send_if_modified(|state| {
            if *state == Some(connected) {
                false
            } else {
                *state = Some(connected);
                true
            }
        });
    }
}

impl Default for SharedConnectivity {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Connectivity for SharedConnectivity {
    fn is_connected(&self) -> Option<bool> {
        *self.tx.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.tx.subscribe()
    }
}

/// Periodically probes a URL and publishes reachability.
pub struct NetworkMonitor {
    state: SharedConnectivity,
    task: JoinHandle<()>,
}

impl NetworkMonitor {
    /// Start probing `probe_url` every `interval`. Must be called within a tokio runtime.
    pub fn spawn(probe_url: String, interval: Duration) -> Self {
        let state = SharedConnectivity::default();
        let publisher = state.clone();

        let task = tokio::spawn(async move {
            let client = match Client::builder().timeout(probe_timeout(interval)).build() {
                Ok(client) => client,
                Err(e) => {
                    debug!(error = %e, "Connectivity probe disabled");
                    return;
                }
            };

            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let reachable = probe(&client, &probe_url).await;
                if publisher.is_connected() != Some(reachable) {
                    info!(connected = reachable, "Connectivity changed");
                }
                publisher.set(reachable);
            }
        });

        Self { state, task }
    }

    /// Handle to the published state, suitable for sharing with the coordinator.
    pub fn connectivity(&self) -> SharedConnectivity {
        self.state.clone()
    }
}

impl Drop for NetworkMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Probe requests must finish well inside one interval.
fn probe_timeout(interval: Duration) -> Duration {
    (interval / 2).clamp(Duration::from_secs(1), Duration::from_secs(5))
}

async fn probe(client: &Client, url: &str) -> bool {
    match client.head(url).send().await {
        Ok(response) => !response.status().is_server_error(),
        Err(e) => {
            debug!(error = %e, "Connectivity probe failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_indeterminate() {
        let state = SharedConnectivity::default();
        assert_eq!(state.is_connected(), None);
    }

    #[test]
    fn test_probe_timeout_bounds() {
        assert_eq!(probe_timeout(Duration::from_secs(15)), Duration::from_secs(5));
        assert_eq!(probe_timeout(Duration::from_secs(4)), Duration::from_secs(2));
        assert_eq!(probe_timeout(Duration::from_millis(100)), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_subscribers_see_changes_only() {
        let state = SharedConnectivity::new(Some(true));
        let mut rx = state.subscribe();

        state.set(true);
        assert!(!rx.has_changed().unwrap());

        state.set(false);
        assert!(rx.has_changed().unwrap());
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow_and_update(), Some(false));
        assert_eq!(state.is_connected(), Some(false));
    }

    #[tokio::test]
    async fn test_dropped_subscriber_does_not_block_updates() {
        let state = SharedConnectivity::new(None);
        let rx = state.subscribe();
        drop(rx);

        state.set(true);
        assert_eq!(state.is_connected(), Some(true));
    }
}
