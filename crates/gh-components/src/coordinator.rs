//! Update coordinators for the Google Home integration
//!
//! One coordinator polls the Google Home devices themselves (alarms, timers,
//! Bluetooth scan results); a second one carries the flattened list of
//! tracked Bluetooth devices for the device_tracker platform and announces
//! newly seen devices over the dispatcher.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::debug;

use gh_core::{BtDeviceDescriptor, GoogleHomeDevice};
use gh_hass::{DataUpdateCoordinator, Dispatcher, UpdateError, UpdateSource};

use crate::config::GoogleHomeOptions;
use crate::consts::SIGNAL_ADD_DEVICE;

/// Coordinator over the full per-device poll result
pub type GoogleHomeUpdater = DataUpdateCoordinator<Vec<GoogleHomeDevice>>;

/// An update source that always returns the same snapshot
///
/// Stands in for the local API client during setup and in tests; the tracked
/// data is pushed in from outside via `async_set_updated_data`.
pub struct InertUpdateSource<T: Clone>(pub T);

#[async_trait]
impl<T: Clone + Send + Sync> UpdateSource<T> for InertUpdateSource<T> {
    async fn async_update_data(&self) -> Result<T, UpdateError> {
        Ok(self.0.clone())
    }
}

/// Flatten the Bluetooth scan results of every device into tracker descriptors
pub fn bt_descriptors(devices: &[GoogleHomeDevice]) -> Vec<BtDeviceDescriptor> {
    devices
        .iter()
        .flat_map(|device| {
            device
                .bt_devices()
                .iter()
                .map(|bt| BtDeviceDescriptor::from_bt(&device.device_id, bt))
        })
        .collect()
}

/// Coordinator for the Bluetooth device_tracker platform
///
/// Wraps the shared polling coordinator and carries the `add_disabled`
/// option the tracker entities consult when they register.
pub struct GoogleHomeBtDeviceUpdater {
    coordinator: Arc<DataUpdateCoordinator<Vec<BtDeviceDescriptor>>>,
    add_disabled: bool,
}

impl GoogleHomeBtDeviceUpdater {
    pub fn new(
        update_interval: Duration,
        source: Box<dyn UpdateSource<Vec<BtDeviceDescriptor>>>,
        add_disabled: bool,
    ) -> Self {
        Self {
            coordinator: Arc::new(DataUpdateCoordinator::new(
                "google_home_bt_devices",
                update_interval,
                source,
                Vec::new(),
            )),
            add_disabled,
        }
    }

    /// Build the coordinator from a configured entry's options
    pub fn from_options(
        options: &GoogleHomeOptions,
        source: Box<dyn UpdateSource<Vec<BtDeviceDescriptor>>>,
    ) -> Self {
        Self::new(options.update_interval(), source, options.add_disabled)
    }

    /// Whether newly discovered trackers register disabled
    pub fn add_disabled(&self) -> bool {
        self.add_disabled
    }

    /// Current flattened list of tracked Bluetooth devices
    pub fn data(&self) -> Vec<BtDeviceDescriptor> {
        self.coordinator.data()
    }

    pub fn async_add_listener(&self) -> broadcast::Receiver<()> {
        self.coordinator.async_add_listener()
    }

    pub async fn async_refresh(&self) {
        self.coordinator.async_refresh().await;
    }

    pub fn async_set_updated_data(&self, data: Vec<BtDeviceDescriptor>) {
        self.coordinator.async_set_updated_data(data);
    }

    pub fn coordinator(&self) -> &Arc<DataUpdateCoordinator<Vec<BtDeviceDescriptor>>> {
        &self.coordinator
    }

    /// Start periodic refreshes; abort the handle to stop
    pub fn spawn_polling(&self) -> tokio::task::JoinHandle<()> {
        self.coordinator.spawn_polling()
    }

    /// Announce every currently known tracked device on the add-device signal
    ///
    /// Returns the number of descriptors dispatched. Platforms that are
    /// already listening create trackers for the ones they do not have yet.
    pub fn announce_devices(&self, dispatcher: &Dispatcher) -> usize {
        let descriptors = self.data();
        debug!(count = descriptors.len(), "Announcing tracked Bluetooth devices");
        for descriptor in &descriptors {
            dispatcher.send_typed(SIGNAL_ADD_DEVICE, descriptor);
        }
        descriptors.len()
    }

    /// Refresh from the source, then announce whatever is known
    pub async fn refresh_and_announce(&self, dispatcher: &Dispatcher) -> usize {
        self.async_refresh().await;
        self.announce_devices(dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gh_core::BtJson;

    fn scanning_device(id: &str, macs: &[&str]) -> GoogleHomeDevice {
        let mut device = GoogleHomeDevice::new(id, format!("{id} speaker"), None);
        device.set_bt_devices(
            macs.iter()
                .map(|mac| BtJson {
                    mac_address: mac.to_string(),
                    device_class: 0,
                    device_type: 1,
                    rssi: -50,
                    expected_profiles: 0,
                    name: None,
                })
                .collect(),
        );
        device
    }

    #[test]
    fn test_bt_descriptors_flatten_all_devices() {
        let devices = vec![
            scanning_device("gh-1", &["AA:AA:AA:AA:AA:01", "AA:AA:AA:AA:AA:02"]),
            scanning_device("gh-2", &["AA:AA:AA:AA:AA:03"]),
        ];

        let descriptors = bt_descriptors(&devices);
        assert_eq!(descriptors.len(), 3);
        assert_eq!(descriptors[0].system_id, "gh-1");
        assert_eq!(descriptors[2].system_id, "gh-2");
        assert_eq!(descriptors[2].device_id, "aaaaaaaaaa03");
    }

    #[tokio::test]
    async fn test_announce_devices_dispatches_each_descriptor() {
        let descriptors = bt_descriptors(&[scanning_device("gh-1", &["AA:AA:AA:AA:AA:01"])]);
        let updater = GoogleHomeBtDeviceUpdater::new(
            Duration::from_secs(60),
            Box::new(InertUpdateSource(descriptors)),
            false,
        );

        let dispatcher = Dispatcher::new();
        let mut rx = dispatcher.connect_typed::<BtDeviceDescriptor>(SIGNAL_ADD_DEVICE);

        assert_eq!(updater.refresh_and_announce(&dispatcher).await, 1);
        let received = rx.recv().await.unwrap();
        assert_eq!(received.device_id, "aaaaaaaaaa01");
        assert_eq!(received.system_id, "gh-1");
    }

    #[test]
    fn test_from_options() {
        let options = GoogleHomeOptions {
            update_interval_secs: 30,
            add_disabled: true,
        };
        let updater = GoogleHomeBtDeviceUpdater::from_options(
            &options,
            Box::new(InertUpdateSource(Vec::new())),
        );
        assert_eq!(updater.coordinator().update_interval(), Duration::from_secs(30));
        assert!(updater.add_disabled());
    }

    #[tokio::test]
    async fn test_announce_without_listeners_is_harmless() {
        let updater = GoogleHomeBtDeviceUpdater::new(
            Duration::from_secs(60),
            Box::new(InertUpdateSource(Vec::new())),
            true,
        );
        assert!(updater.add_disabled());
        assert_eq!(updater.announce_devices(&Dispatcher::new()), 0);
    }
}
