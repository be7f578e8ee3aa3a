//! Bluetooth device_tracker platform
//!
//! One tracker entity per Bluetooth device the Google Home devices have
//! seen. Setup creates trackers for everything the coordinator already
//! knows, then keeps listening on the add-device signal for devices that
//! show up later.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use gh_core::BtDeviceDescriptor;
use gh_hass::{DeviceInfo, DisabledBy, Hass, CONNECTION_NETWORK_MAC};

use crate::consts::{
    ATTR_MAC, DEV_CLIENT_MODEL, DOMAIN, ICON_BT_DEVICES, MANUFACTURER, SIGNAL_ADD_DEVICE,
    SOURCE_TYPE_BLUETOOTH, STATE_HOME, STATE_NOT_HOME,
};
use crate::coordinator::GoogleHomeBtDeviceUpdater;
use crate::entity::{generate_entity_id, BtDeviceEntity};

/// Entity domain of this platform
const PLATFORM_DOMAIN: &str = "device_tracker";

/// A tracker entity for one Bluetooth device
pub struct GoogleHomeDeviceTracker {
    entity: BtDeviceEntity,
    mac_address: Option<String>,
}

impl GoogleHomeDeviceTracker {
    pub fn from_descriptor(
        coordinator: Arc<GoogleHomeBtDeviceUpdater>,
        descriptor: &BtDeviceDescriptor,
    ) -> Self {
        let mut entity = BtDeviceEntity::new(
            coordinator,
            descriptor.device_name.clone(),
            ICON_BT_DEVICES,
            descriptor.system_id.clone(),
            Some(descriptor.device_id.clone()),
        );
        if let Some(mac) = &descriptor.mac_address {
            entity = entity.with_attribute(ATTR_MAC, serde_json::Value::String(mac.clone()));
        }
        Self {
            entity,
            mac_address: descriptor.mac_address.clone(),
        }
    }

    pub fn name(&self) -> &str {
        self.entity.name()
    }

    pub fn icon(&self) -> &str {
        self.entity.icon()
    }

    pub fn unique_id(&self) -> &str {
        self.entity.unique_id()
    }

    pub fn entity_id(&self) -> Option<String> {
        self.entity.entity_id()
    }

    pub fn entity_registry_enabled_default(&self) -> bool {
        self.entity.entity_registry_enabled_default()
    }

    pub fn extra_state_attributes(
        &self,
    ) -> std::collections::HashMap<String, serde_json::Value> {
        self.entity.extra_state_attributes()
    }

    /// Whether the tracked device counts as present
    ///
    /// Presence derived from scan results proved too flaky upstream, so a
    /// tracker reports connected for as long as it exists.
    pub fn is_connected(&self) -> bool {
        true
    }

    pub fn source_type(&self) -> &'static str {
        SOURCE_TYPE_BLUETOOTH
    }

    pub fn state(&self) -> &'static str {
        if self.is_connected() {
            STATE_HOME
        } else {
            STATE_NOT_HOME
        }
    }

    /// Device description for the registry
    ///
    /// Carries the MAC as a connection when one is known, exactly as the
    /// scan reported it.
    pub fn device_info(&self) -> DeviceInfo {
        let connections = match &self.mac_address {
            Some(mac) => HashSet::from([(CONNECTION_NETWORK_MAC.to_string(), mac.clone())]),
            None => HashSet::new(),
        };
        DeviceInfo {
            identifiers: HashSet::from([(DOMAIN.to_string(), self.unique_id().to_string())]),
            name: self.name().to_string(),
            connections,
            manufacturer: Some(MANUFACTURER.to_string()),
            model: Some(DEV_CLIENT_MODEL.to_string()),
            via_device: Some((DOMAIN.to_string(), self.entity.system_id().to_string())),
        }
    }

    /// Write the current state into the state store
    pub fn write_state(&self, hass: &Hass) {
        if let Some(entity_id) = self.entity_id() {
            hass.states
                .set(&entity_id, self.state(), self.extra_state_attributes());
        }
    }

    pub fn handle_device_removal(&self, hass: &Hass, device_id: &str) -> bool {
        self.entity.handle_device_removal(hass, device_id)
    }

    fn set_entity_id(&self, entity_id: &str) {
        self.entity.set_entity_id(entity_id);
    }
}

/// The device_tracker platform for one configured entry
pub struct DeviceTrackerPlatform {
    hass: Arc<Hass>,
    coordinator: Arc<GoogleHomeBtDeviceUpdater>,
    trackers: DashMap<String, Arc<GoogleHomeDeviceTracker>>,
    update_tasks: DashMap<String, JoinHandle<()>>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl DeviceTrackerPlatform {
    pub fn new(hass: Arc<Hass>, coordinator: Arc<GoogleHomeBtDeviceUpdater>) -> Arc<Self> {
        Arc::new(Self {
            hass,
            coordinator,
            trackers: DashMap::new(),
            update_tasks: DashMap::new(),
            listener_task: Mutex::new(None),
        })
    }

    /// Set up the platform for a configured entry
    ///
    /// Creates a tracker for every Bluetooth device the coordinator already
    /// knows and starts listening for later arrivals. Returns the number of
    /// trackers added.
    pub fn async_setup_entry(self: &Arc<Self>) -> usize {
        let mut added = 0;
        for descriptor in self.coordinator.data() {
            if self.add_tracker(&descriptor).is_some() {
                added += 1;
            }
        }
        info!(count = added, "Set up device_tracker platform");
        self.listen_for_new_devices();
        added
    }

    /// Create, register, and start one tracker
    ///
    /// Returns `None` when a tracker with the same unique id already exists.
    pub fn add_tracker(
        self: &Arc<Self>,
        descriptor: &BtDeviceDescriptor,
    ) -> Option<Arc<GoogleHomeDeviceTracker>> {
        let tracker = Arc::new(GoogleHomeDeviceTracker::from_descriptor(
            Arc::clone(&self.coordinator),
            descriptor,
        ));
        let unique_id = tracker.unique_id().to_string();
        if self.trackers.contains_key(&unique_id) {
            debug!(unique_id, "Tracker already exists, skipping");
            return None;
        }

        let device = self.hass.devices.get_or_create(&tracker.device_info());
        let entity_id = generate_entity_id(&self.hass, PLATFORM_DOMAIN, tracker.name());
        let disabled_by = if tracker.entity_registry_enabled_default() {
            None
        } else {
            Some(DisabledBy::Integration)
        };
        self.hass.entities.get_or_create(
            DOMAIN,
            &entity_id,
            Some(&unique_id),
            Some(&device.id),
            disabled_by,
        );

        tracker.set_entity_id(&entity_id);
        tracker.write_state(&self.hass);
        self.start_tracker_updates(&unique_id, Arc::clone(&tracker));

        info!(entity_id, unique_id, "Added Bluetooth device tracker");
        self.trackers.insert(unique_id, Arc::clone(&tracker));
        Some(tracker)
    }

    /// Rewrite the tracker's state on every coordinator refresh
    fn start_tracker_updates(&self, unique_id: &str, tracker: Arc<GoogleHomeDeviceTracker>) {
        let hass = Arc::clone(&self.hass);
        let mut rx = self.coordinator.async_add_listener();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) => tracker.write_state(&hass),
                    Err(RecvError::Lagged(_)) => tracker.write_state(&hass),
                    Err(RecvError::Closed) => break,
                }
            }
        });
        self.update_tasks.insert(unique_id.to_string(), handle);
    }

    /// Subscribe to the add-device signal and create trackers as they arrive
    pub fn listen_for_new_devices(self: &Arc<Self>) {
        // Weak so the listener does not keep the platform alive.
        let platform = Arc::downgrade(self);
        let mut rx = self
            .hass
            .dispatcher
            .connect_typed::<BtDeviceDescriptor>(SIGNAL_ADD_DEVICE);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(descriptor) => match platform.upgrade() {
                        Some(platform) => {
                            platform.add_tracker(&descriptor);
                        }
                        None => break,
                    },
                    // A dispatch burst past channel capacity drops the oldest
                    // announcements; keep listening for the rest.
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });
        if let Ok(mut guard) = self.listener_task.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    /// Handle deletion of a tracked device
    ///
    /// Every tracker gets a look; only the one whose unique id matches acts.
    /// Returns whether any tracker was removed.
    pub fn handle_device_removal(&self, device_id: &str) -> bool {
        let removed: Vec<String> = self
            .trackers
            .iter()
            .filter(|entry| entry.value().handle_device_removal(&self.hass, device_id))
            .map(|entry| entry.key().clone())
            .collect();

        for unique_id in &removed {
            self.trackers.remove(unique_id);
            if let Some((_, task)) = self.update_tasks.remove(unique_id) {
                task.abort();
            }
        }
        !removed.is_empty()
    }

    pub fn tracker(&self, unique_id: &str) -> Option<Arc<GoogleHomeDeviceTracker>> {
        self.trackers
            .get(unique_id)
            .map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.trackers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trackers.is_empty()
    }
}

impl Drop for DeviceTrackerPlatform {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.listener_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
        for entry in self.update_tasks.iter() {
            entry.value().abort();
        }
    }
}
