//! Polling update coordinator
//!
//! One coordinator per integration instance owns the cached poll result and
//! fans change notifications out to every entity built on top of it. The
//! actual fetch is behind the [`UpdateSource`] trait; the host only drives
//! the schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Capacity of the listener notification channel
const LISTENER_CHANNEL_CAPACITY: usize = 16;

/// Errors surfaced by a data update
#[derive(Debug, Error, Clone)]
pub enum UpdateError {
    /// The fetch against the backing source failed
    #[error("update failed: {0}")]
    UpdateFailed(String),
}

/// The fetch seam a coordinator polls
///
/// Real implementations talk to the device's local API; tests inject static
/// or failing sources.
#[async_trait]
pub trait UpdateSource<T>: Send + Sync {
    async fn async_update_data(&self) -> Result<T, UpdateError>;
}

/// Periodic-poll cache shared across the entities of one integration instance
///
/// Entities read the current snapshot with [`data`](Self::data) and subscribe
/// to refresh notifications with [`async_add_listener`](Self::async_add_listener).
/// Listeners are notified after every refresh attempt, successful or not.
pub struct DataUpdateCoordinator<T> {
    name: String,
    update_interval: Duration,
    source: Box<dyn UpdateSource<T>>,
    data: RwLock<T>,
    listeners: broadcast::Sender<()>,
    last_update_success: AtomicBool,
}

impl<T: Clone + Send + Sync + 'static> DataUpdateCoordinator<T> {
    pub fn new(
        name: impl Into<String>,
        update_interval: Duration,
        source: Box<dyn UpdateSource<T>>,
        initial: T,
    ) -> Self {
        Self {
            name: name.into(),
            update_interval,
            source,
            data: RwLock::new(initial),
            listeners: broadcast::channel(LISTENER_CHANNEL_CAPACITY).0,
            last_update_success: AtomicBool::new(true),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Current snapshot of the polled data
    pub fn data(&self) -> T {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Whether the most recent refresh succeeded
    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::SeqCst)
    }

    /// Subscribe to refresh notifications
    ///
    /// Dropping the receiver unsubscribes.
    pub fn async_add_listener(&self) -> broadcast::Receiver<()> {
        self.listeners.subscribe()
    }

    /// Fetch once and notify listeners
    pub async fn async_refresh(&self) {
        match self.source.async_update_data().await {
            Ok(data) => {
                if let Ok(mut guard) = self.data.write() {
                    *guard = data;
                }
                self.last_update_success.store(true, Ordering::SeqCst);
                debug!(coordinator = %self.name, "Refresh finished");
            }
            Err(err) => {
                self.last_update_success.store(false, Ordering::SeqCst);
                warn!(coordinator = %self.name, %err, "Refresh failed");
            }
        }
        self.notify_listeners();
    }

    /// Replace the cached data directly and notify listeners
    ///
    /// Used when fresh data arrives outside the polling schedule.
    pub fn async_set_updated_data(&self, data: T) {
        if let Ok(mut guard) = self.data.write() {
            *guard = data;
        }
        self.last_update_success.store(true, Ordering::SeqCst);
        self.notify_listeners();
    }

    fn notify_listeners(&self) {
        // No receivers is fine; entities may not be attached yet.
        let _ = self.listeners.send(());
    }

    /// Start the host-style periodic refresh task
    ///
    /// The first refresh happens after one interval; setup is expected to
    /// seed data or refresh explicitly. Abort the handle to stop polling.
    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let coordinator = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(coordinator.update_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately.
            interval.tick().await;
            loop {
                interval.tick().await;
                coordinator.async_refresh().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticSource(Vec<u32>);

    #[async_trait]
    impl UpdateSource<Vec<u32>> for StaticSource {
        async fn async_update_data(&self) -> Result<Vec<u32>, UpdateError> {
            Ok(self.0.clone())
        }
    }

    struct FailingSource;

    #[async_trait]
    impl UpdateSource<Vec<u32>> for FailingSource {
        async fn async_update_data(&self) -> Result<Vec<u32>, UpdateError> {
            Err(UpdateError::UpdateFailed("boom".to_string()))
        }
    }

    #[tokio::test]
    async fn test_refresh_updates_data_and_notifies() {
        let coordinator = DataUpdateCoordinator::new(
            "test",
            Duration::from_secs(60),
            Box::new(StaticSource(vec![1, 2, 3])),
            Vec::new(),
        );
        let mut rx = coordinator.async_add_listener();

        assert!(coordinator.data().is_empty());
        coordinator.async_refresh().await;

        assert_eq!(coordinator.data(), vec![1, 2, 3]);
        assert!(coordinator.last_update_success());
        rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_data() {
        let coordinator = DataUpdateCoordinator::new(
            "test",
            Duration::from_secs(60),
            Box::new(FailingSource),
            vec![7],
        );
        let mut rx = coordinator.async_add_listener();

        coordinator.async_refresh().await;

        // Stale data stays in place; listeners still hear about the attempt.
        assert_eq!(coordinator.data(), vec![7]);
        assert!(!coordinator.last_update_success());
        rx.recv().await.unwrap();
    }

    #[tokio::test]
    async fn test_set_updated_data() {
        let coordinator = DataUpdateCoordinator::new(
            "test",
            Duration::from_secs(60),
            Box::new(FailingSource),
            Vec::new(),
        );
        coordinator.async_refresh().await;
        assert!(!coordinator.last_update_success());

        coordinator.async_set_updated_data(vec![9]);
        assert_eq!(coordinator.data(), vec![9]);
        assert!(coordinator.last_update_success());
    }

    #[tokio::test]
    async fn test_dropped_listener_unsubscribes() {
        let coordinator = DataUpdateCoordinator::new(
            "test",
            Duration::from_secs(60),
            Box::new(StaticSource(vec![])),
            Vec::new(),
        );
        let rx = coordinator.async_add_listener();
        drop(rx);
        // Refresh with no live listeners must not error or panic.
        coordinator.async_refresh().await;
    }
}
