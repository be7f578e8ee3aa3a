//! Entity base layer
//!
//! `GoogleHomeBaseEntity` is the base for entities attached to a Google Home
//! device (alarm/timer sensors); `BtDeviceEntity` is the base for entities
//! that represent a Bluetooth device a Google Home saw.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use gh_core::GoogleHomeDevice;
use gh_hass::{DeviceInfo, Hass};

use crate::consts::{ATTR_SYSTEM, DEFAULT_NAME, DOMAIN, MANUFACTURER};
use crate::coordinator::{GoogleHomeBtDeviceUpdater, GoogleHomeUpdater};

/// Base behavior for entities attached to a Google Home device
///
/// Implementors supply identity and the label of the feature they expose;
/// naming, unique ids, and device linking come for free.
pub trait GoogleHomeBaseEntity: Send + Sync {
    fn coordinator(&self) -> &Arc<GoogleHomeUpdater>;

    /// Identifier of the Google Home device this entity belongs to
    fn device_id(&self) -> &str;

    fn device_name(&self) -> &str;

    fn device_model(&self) -> &str;

    /// Feature label, e.g. "alarms"
    fn label(&self) -> &str;

    fn icon(&self) -> &str;

    fn name(&self) -> String {
        format!("{} {}", self.device_name(), self.label())
    }

    fn unique_id(&self) -> String {
        format!("{}/{}", self.device_id(), self.label())
    }

    /// The current snapshot of the owning device, if the poll still sees it
    fn get_device(&self) -> Option<GoogleHomeDevice> {
        self.coordinator()
            .data()
            .into_iter()
            .find(|device| device.device_id == self.device_id())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifiers: HashSet::from([(DOMAIN.to_string(), self.device_id().to_string())]),
            name: format!("{} {}", DEFAULT_NAME, self.device_name()),
            connections: HashSet::new(),
            manufacturer: Some(MANUFACTURER.to_string()),
            model: Some(self.device_model().to_string()),
            via_device: None,
        }
    }
}

/// Base for entities representing a Bluetooth device seen by a Google Home
///
/// The unique id prefers the tracked item's own id and falls back to the id
/// of the Google Home system that saw it.
pub struct BtDeviceEntity {
    coordinator: Arc<GoogleHomeBtDeviceUpdater>,
    name: String,
    icon: String,
    system_id: String,
    unique_id: String,
    attributes: HashMap<String, serde_json::Value>,
    entity_id: Mutex<Option<String>>,
}

impl BtDeviceEntity {
    pub fn new(
        coordinator: Arc<GoogleHomeBtDeviceUpdater>,
        name: impl Into<String>,
        icon: impl Into<String>,
        system_id: impl Into<String>,
        item_id: Option<String>,
    ) -> Self {
        let system_id = system_id.into();
        let unique_id = item_id
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| system_id.clone());
        Self {
            coordinator,
            name: name.into(),
            icon: icon.into(),
            system_id,
            unique_id,
            attributes: HashMap::new(),
            entity_id: Mutex::new(None),
        }
    }

    /// Add an extra state attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn coordinator(&self) -> &Arc<GoogleHomeBtDeviceUpdater> {
        &self.coordinator
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn icon(&self) -> &str {
        &self.icon
    }

    /// Identifier of the Google Home system that saw this device
    pub fn system_id(&self) -> &str {
        &self.system_id
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// The entity id assigned at registration, if any
    pub fn entity_id(&self) -> Option<String> {
        match self.entity_id.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set_entity_id(&self, entity_id: impl Into<String>) {
        if let Ok(mut guard) = self.entity_id.lock() {
            *guard = Some(entity_id.into());
        }
    }

    /// Whether the entity registers enabled
    pub fn entity_registry_enabled_default(&self) -> bool {
        !self.coordinator.add_disabled()
    }

    /// State attributes: the owning system plus whatever was attached
    pub fn extra_state_attributes(&self) -> HashMap<String, serde_json::Value> {
        let mut attributes = self.attributes.clone();
        attributes.insert(
            ATTR_SYSTEM.to_string(),
            serde_json::Value::String(self.system_id.clone()),
        );
        attributes
    }

    /// React to a device being deleted from the integration
    ///
    /// Only acts when the deleted id matches this entity's unique id:
    /// unregisters the entity, drops its state, and prunes the parent device
    /// if nothing else references it. Returns whether the entity was the one
    /// being deleted.
    pub fn handle_device_removal(&self, hass: &Hass, device_id: &str) -> bool {
        if device_id != self.unique_id {
            return false;
        }

        info!(unique_id = %self.unique_id, "Removing deleted tracked device");
        if let Some(entity_id) = self.entity_id() {
            let parent_device = hass
                .entities
                .remove(&entity_id)
                .and_then(|entry| entry.device_id.clone());
            hass.states.remove(&entity_id);
            if let Some(parent_device) = parent_device {
                cleanup_device_registry(hass, &parent_device);
            }
        }
        true
    }
}

/// Remove a device from the registry once no entities reference it
pub fn cleanup_device_registry(hass: &Hass, device_id: &str) {
    if hass.entities.entries_for_device(device_id).is_empty() {
        debug!(device_id, "Pruning device without entities");
        hass.devices.remove(device_id);
    }
}

/// Turn an entity name into an object id: lowercase with underscores
pub(crate) fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// Pick a free entity id in a domain, appending `_2`, `_3`, ... on collision
pub(crate) fn generate_entity_id(hass: &Hass, domain: &str, name: &str) -> String {
    let object_id = slugify(name);
    let candidate = format!("{domain}.{object_id}");
    if !hass.entities.is_registered(&candidate) {
        return candidate;
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{domain}.{object_id}_{suffix}");
        if !hass.entities.is_registered(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::InertUpdateSource;
    use std::time::Duration;

    fn bt_coordinator(add_disabled: bool) -> Arc<GoogleHomeBtDeviceUpdater> {
        Arc::new(GoogleHomeBtDeviceUpdater::new(
            Duration::from_secs(60),
            Box::new(InertUpdateSource(Vec::new())),
            add_disabled,
        ))
    }

    #[test]
    fn test_unique_id_prefers_item_id() {
        let with_item = BtDeviceEntity::new(
            bt_coordinator(false),
            "Phone",
            "mdi:bluetooth",
            "gh-1",
            Some("aabbccddeeff".to_string()),
        );
        assert_eq!(with_item.unique_id(), "aabbccddeeff");

        let without_item =
            BtDeviceEntity::new(bt_coordinator(false), "Phone", "mdi:bluetooth", "gh-1", None);
        assert_eq!(without_item.unique_id(), "gh-1");

        let empty_item = BtDeviceEntity::new(
            bt_coordinator(false),
            "Phone",
            "mdi:bluetooth",
            "gh-1",
            Some(String::new()),
        );
        assert_eq!(empty_item.unique_id(), "gh-1");
    }

    #[test]
    fn test_attributes_always_carry_system() {
        let entity = BtDeviceEntity::new(
            bt_coordinator(false),
            "Phone",
            "mdi:bluetooth",
            "gh-1",
            Some("aabbccddeeff".to_string()),
        )
        .with_attribute("mac", serde_json::json!("AA:BB:CC:DD:EE:FF"));

        let attributes = entity.extra_state_attributes();
        assert_eq!(attributes["system"], "gh-1");
        assert_eq!(attributes["mac"], "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_enabled_default_follows_add_disabled() {
        let enabled =
            BtDeviceEntity::new(bt_coordinator(false), "Phone", "mdi:bluetooth", "gh-1", None);
        assert!(enabled.entity_registry_enabled_default());

        let disabled =
            BtDeviceEntity::new(bt_coordinator(true), "Phone", "mdi:bluetooth", "gh-1", None);
        assert!(!disabled.entity_registry_enabled_default());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Pixel 7 Pro"), "pixel_7_pro");
        assert_eq!(slugify("  Phone!!"), "phone");
        assert_eq!(slugify("AA:BB:CC:DD:EE:FF"), "aa_bb_cc_dd_ee_ff");
    }

    #[test]
    fn test_generate_entity_id_appends_suffix() {
        let hass = Hass::new();
        assert_eq!(
            generate_entity_id(&hass, "device_tracker", "Phone"),
            "device_tracker.phone"
        );
        hass.entities
            .get_or_create("google_home", "device_tracker.phone", None, None, None);
        assert_eq!(
            generate_entity_id(&hass, "device_tracker", "Phone"),
            "device_tracker.phone_2"
        );
    }
}
