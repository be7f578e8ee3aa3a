//! Alarm and timer sensors
//!
//! One alarms sensor and one timers sensor per Google Home device. The
//! sensor state is the local ISO time of the next alarm or timer, or
//! `unavailable` when nothing is scheduled.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::info;

use gh_core::GoogleHomeDevice;
use gh_hass::Hass;

use crate::consts::{
    ATTR_ALARMS, ATTR_TIMERS, DEFAULT_NAME, DOMAIN, ICON_ALARMS, ICON_TIMERS, LABEL_ALARMS,
    LABEL_TIMERS, STATE_UNAVAILABLE,
};
use crate::coordinator::GoogleHomeUpdater;
use crate::entity::{generate_entity_id, GoogleHomeBaseEntity};

/// Entity domain of this platform
const PLATFORM_DOMAIN: &str = "sensor";

/// A sensor entity built on the base entity behavior
pub trait GoogleHomeSensor: GoogleHomeBaseEntity {
    fn state(&self) -> String;
    fn extra_state_attributes(&self) -> HashMap<String, serde_json::Value>;
}

/// Identity shared by both sensors of one device
struct SensorIdentity {
    coordinator: Arc<GoogleHomeUpdater>,
    device_id: String,
    device_name: String,
    device_model: String,
}

impl SensorIdentity {
    fn new(coordinator: Arc<GoogleHomeUpdater>, device: &GoogleHomeDevice) -> Self {
        Self {
            coordinator,
            device_id: device.device_id.clone(),
            device_name: device.name.clone(),
            device_model: device
                .hardware
                .clone()
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
        }
    }
}

/// Sensor showing the next alarm of a Google Home device
pub struct GoogleHomeAlarmsSensor {
    identity: SensorIdentity,
}

impl GoogleHomeAlarmsSensor {
    pub fn new(coordinator: Arc<GoogleHomeUpdater>, device: &GoogleHomeDevice) -> Self {
        Self {
            identity: SensorIdentity::new(coordinator, device),
        }
    }
}

impl GoogleHomeBaseEntity for GoogleHomeAlarmsSensor {
    fn coordinator(&self) -> &Arc<GoogleHomeUpdater> {
        &self.identity.coordinator
    }

    fn device_id(&self) -> &str {
        &self.identity.device_id
    }

    fn device_name(&self) -> &str {
        &self.identity.device_name
    }

    fn device_model(&self) -> &str {
        &self.identity.device_model
    }

    fn label(&self) -> &str {
        LABEL_ALARMS
    }

    fn icon(&self) -> &str {
        ICON_ALARMS
    }
}

impl GoogleHomeSensor for GoogleHomeAlarmsSensor {
    fn state(&self) -> String {
        self.get_device()
            .and_then(|device| device.next_alarm().map(|alarm| alarm.local_time_iso.clone()))
            .unwrap_or_else(|| STATE_UNAVAILABLE.to_string())
    }

    fn extra_state_attributes(&self) -> HashMap<String, serde_json::Value> {
        let alarms = self
            .get_device()
            .map(|device| serde_json::to_value(device.sorted_alarms()).unwrap_or_default())
            .unwrap_or_default();
        HashMap::from([(ATTR_ALARMS.to_string(), alarms)])
    }
}

/// Sensor showing the next timer of a Google Home device
pub struct GoogleHomeTimersSensor {
    identity: SensorIdentity,
}

impl GoogleHomeTimersSensor {
    pub fn new(coordinator: Arc<GoogleHomeUpdater>, device: &GoogleHomeDevice) -> Self {
        Self {
            identity: SensorIdentity::new(coordinator, device),
        }
    }
}

impl GoogleHomeBaseEntity for GoogleHomeTimersSensor {
    fn coordinator(&self) -> &Arc<GoogleHomeUpdater> {
        &self.identity.coordinator
    }

    fn device_id(&self) -> &str {
        &self.identity.device_id
    }

    fn device_name(&self) -> &str {
        &self.identity.device_name
    }

    fn device_model(&self) -> &str {
        &self.identity.device_model
    }

    fn label(&self) -> &str {
        LABEL_TIMERS
    }

    fn icon(&self) -> &str {
        ICON_TIMERS
    }
}

impl GoogleHomeSensor for GoogleHomeTimersSensor {
    fn state(&self) -> String {
        self.get_device()
            .and_then(|device| {
                device
                    .next_timer()
                    .and_then(|timer| timer.local_time_iso.clone())
            })
            .unwrap_or_else(|| STATE_UNAVAILABLE.to_string())
    }

    fn extra_state_attributes(&self) -> HashMap<String, serde_json::Value> {
        let timers = self
            .get_device()
            .map(|device| serde_json::to_value(device.sorted_timers()).unwrap_or_default())
            .unwrap_or_default();
        HashMap::from([(ATTR_TIMERS.to_string(), timers)])
    }
}

/// The sensor platform for one configured entry
pub struct SensorPlatform {
    hass: Arc<Hass>,
    coordinator: Arc<GoogleHomeUpdater>,
    sensors: DashMap<String, Arc<dyn GoogleHomeSensor>>,
    update_task: Mutex<Option<JoinHandle<()>>>,
}

impl SensorPlatform {
    pub fn new(hass: Arc<Hass>, coordinator: Arc<GoogleHomeUpdater>) -> Arc<Self> {
        Arc::new(Self {
            hass,
            coordinator,
            sensors: DashMap::new(),
            update_task: Mutex::new(None),
        })
    }

    /// Set up alarm and timer sensors for every known device
    ///
    /// Returns the number of sensors added.
    pub fn async_setup_entry(self: &Arc<Self>) -> usize {
        let mut added = 0;
        for device in self.coordinator.data() {
            let coordinator = Arc::clone(&self.coordinator);
            if self.add_sensor(Arc::new(GoogleHomeAlarmsSensor::new(
                Arc::clone(&coordinator),
                &device,
            ))) {
                added += 1;
            }
            if self.add_sensor(Arc::new(GoogleHomeTimersSensor::new(coordinator, &device))) {
                added += 1;
            }
        }
        info!(count = added, "Set up sensor platform");
        self.start_updates();
        added
    }

    /// Register one sensor and write its initial state
    fn add_sensor(&self, sensor: Arc<dyn GoogleHomeSensor>) -> bool {
        let unique_id = sensor.unique_id();
        let entity_id = match self.hass.entities.get_by_unique_id(&unique_id) {
            Some(existing) => existing.entity_id.clone(),
            None => {
                let entity_id = generate_entity_id(&self.hass, PLATFORM_DOMAIN, &sensor.name());
                let device = self.hass.devices.get_or_create(&sensor.device_info());
                self.hass.entities.get_or_create(
                    DOMAIN,
                    &entity_id,
                    Some(&unique_id),
                    Some(&device.id),
                    None,
                );
                entity_id
            }
        };

        if self.sensors.contains_key(&entity_id) {
            return false;
        }
        self.write_sensor_state(&entity_id, sensor.as_ref());
        self.sensors.insert(entity_id, sensor);
        true
    }

    fn write_sensor_state(&self, entity_id: &str, sensor: &dyn GoogleHomeSensor) {
        self.hass
            .states
            .set(entity_id, sensor.state(), sensor.extra_state_attributes());
    }

    /// Rewrite every sensor's state on coordinator refresh
    fn start_updates(self: &Arc<Self>) {
        let platform = Arc::downgrade(self);
        let mut rx = self.coordinator.async_add_listener();
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => match platform.upgrade() {
                        Some(platform) => platform.write_all_states(),
                        None => break,
                    },
                    Err(RecvError::Closed) => break,
                }
            }
        });
        if let Ok(mut guard) = self.update_task.lock() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    fn write_all_states(&self) {
        for entry in self.sensors.iter() {
            self.write_sensor_state(entry.key(), entry.value().as_ref());
        }
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

impl Drop for SensorPlatform {
    fn drop(&mut self) {
        if let Ok(mut guard) = self.update_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }
}
