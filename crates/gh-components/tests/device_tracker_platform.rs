//! End-to-end tests of the device_tracker platform against the host surface

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use gh_components::consts::{DOMAIN, SIGNAL_ADD_DEVICE};
use gh_components::{
    bt_descriptors, DeviceTrackerPlatform, GoogleHomeBtDeviceUpdater, InertUpdateSource,
};
use gh_core::{BtDeviceDescriptor, BtJson, GoogleHomeDevice};
use gh_hass::Hass;

fn descriptor(device_id: &str, system_id: &str, name: &str, mac: Option<&str>) -> BtDeviceDescriptor {
    BtDeviceDescriptor {
        device_id: device_id.to_string(),
        system_id: system_id.to_string(),
        device_name: name.to_string(),
        mac_address: mac.map(String::from),
        device_class: "Phone (Smartphones)".to_string(),
        device_type: "BLE".to_string(),
        rssi: -55,
        expected_profiles: 0,
    }
}

fn updater(descriptors: Vec<BtDeviceDescriptor>, add_disabled: bool) -> Arc<GoogleHomeBtDeviceUpdater> {
    Arc::new(GoogleHomeBtDeviceUpdater::new(
        Duration::from_secs(60),
        Box::new(InertUpdateSource(descriptors)),
        add_disabled,
    ))
}

async fn wait_for<F: Fn() -> bool>(condition: F) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn setup_creates_one_tracker_per_known_device() {
    let hass = Hass::shared();
    let updater = updater(
        vec![
            descriptor("aabbccddee01", "gh-1", "Phone", Some("AA:BB:CC:DD:EE:01")),
            descriptor("aabbccddee02", "gh-1", "Watch", Some("AA:BB:CC:DD:EE:02")),
        ],
        false,
    );
    updater.async_refresh().await;

    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater);
    assert_eq!(platform.async_setup_entry(), 2);

    let tracker = platform.tracker("aabbccddee01").unwrap();
    assert_eq!(tracker.unique_id(), "aabbccddee01");
    assert_eq!(tracker.entity_id().as_deref(), Some("device_tracker.phone"));
    assert!(hass.entities.is_registered("device_tracker.phone"));
    assert!(hass.entities.is_registered("device_tracker.watch"));
    assert!(hass.states.is_state("device_tracker.phone", "home"));
}

#[tokio::test]
async fn dispatched_descriptor_creates_exactly_one_tracker() {
    let hass = Hass::shared();
    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater(Vec::new(), false));
    assert_eq!(platform.async_setup_entry(), 0);

    let new_device = descriptor("aabbccddee03", "gh-2", "Earbuds", Some("AA:BB:CC:DD:EE:03"));
    assert_eq!(hass.dispatcher.send_typed(SIGNAL_ADD_DEVICE, &new_device), 1);

    wait_for(|| platform.len() == 1).await;
    let tracker = platform.tracker("aabbccddee03").unwrap();
    assert_eq!(tracker.name(), "Earbuds");
    assert_eq!(tracker.unique_id(), "aabbccddee03");
    assert!(hass.states.is_state("device_tracker.earbuds", "home"));

    // The same announcement again must not create a second entity.
    hass.dispatcher.send_typed(SIGNAL_ADD_DEVICE, &new_device);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(platform.len(), 1);
    assert_eq!(hass.entities.len(), 1);
}

#[tokio::test]
async fn listener_survives_dispatch_burst() {
    let hass = Hass::shared();
    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater(Vec::new(), false));
    platform.async_setup_entry();

    // Overflow the signal channel before the listener task gets a chance to
    // drain it; the oldest announcements are dropped as lagged.
    for i in 0..200 {
        let burst = descriptor(
            &format!("aabbccdd{i:04x}"),
            "gh-1",
            &format!("Burst {i}"),
            None,
        );
        hass.dispatcher.send_typed(SIGNAL_ADD_DEVICE, &burst);
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!platform.is_empty());

    // A calm arrival after the burst must still produce a tracker.
    let late = descriptor("aabbccddeeff", "gh-9", "Latecomer", None);
    hass.dispatcher.send_typed(SIGNAL_ADD_DEVICE, &late);
    wait_for(|| platform.tracker("aabbccddeeff").is_some()).await;
}

#[tokio::test]
async fn tracker_is_always_connected() {
    let hass = Hass::shared();
    let updater = updater(
        vec![descriptor("aabbccddee01", "gh-1", "Phone", None)],
        false,
    );
    updater.async_refresh().await;

    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater);
    platform.async_setup_entry();

    let tracker = platform.tracker("aabbccddee01").unwrap();
    assert!(tracker.is_connected());
    assert_eq!(tracker.source_type(), "bluetooth");
    assert_eq!(tracker.state(), "home");
}

#[tokio::test]
async fn device_info_carries_mac_connection_verbatim() {
    let updater = updater(Vec::new(), false);
    let with_mac = gh_components::GoogleHomeDeviceTracker::from_descriptor(
        Arc::clone(&updater),
        &descriptor("aabbccddeeff", "gh-1", "Phone", Some("AA:BB:CC:DD:EE:FF")),
    );

    let info = with_mac.device_info();
    assert_eq!(
        info.connections,
        HashSet::from([("mac".to_string(), "AA:BB:CC:DD:EE:FF".to_string())])
    );
    assert_eq!(
        info.identifiers,
        HashSet::from([(DOMAIN.to_string(), "aabbccddeeff".to_string())])
    );

    let without_mac = gh_components::GoogleHomeDeviceTracker::from_descriptor(
        updater,
        &descriptor("aabbccddeeff", "gh-1", "Phone", None),
    );
    assert!(without_mac.device_info().connections.is_empty());
}

#[tokio::test]
async fn trackers_register_disabled_when_option_set() {
    let hass = Hass::shared();
    let updater = updater(
        vec![descriptor("aabbccddee01", "gh-1", "Phone", None)],
        true,
    );
    updater.async_refresh().await;

    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater);
    platform.async_setup_entry();

    let entry = hass.entities.get("device_tracker.phone").unwrap();
    assert!(entry.is_disabled());
}

#[tokio::test]
async fn removal_deletes_entity_and_prunes_device() {
    let hass = Hass::shared();
    let updater = updater(
        vec![
            descriptor("aabbccddee01", "gh-1", "Phone", Some("AA:BB:CC:DD:EE:01")),
            descriptor("aabbccddee02", "gh-1", "Watch", Some("AA:BB:CC:DD:EE:02")),
        ],
        false,
    );
    updater.async_refresh().await;

    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater);
    platform.async_setup_entry();
    assert_eq!(hass.devices.len(), 2);

    assert!(platform.handle_device_removal("aabbccddee01"));
    assert_eq!(platform.len(), 1);
    assert!(!hass.entities.is_registered("device_tracker.phone"));
    assert!(hass.states.get("device_tracker.phone").is_none());
    // The tracked device's registry entry had no other entities.
    assert_eq!(hass.devices.len(), 1);
    assert!(hass
        .devices
        .get_by_identifier(DOMAIN, "aabbccddee02")
        .is_some());

    // The other tracker is untouched.
    assert!(hass.entities.is_registered("device_tracker.watch"));
}

#[tokio::test]
async fn removal_with_unknown_id_is_a_no_op() {
    let hass = Hass::shared();
    let updater = updater(
        vec![descriptor("aabbccddee01", "gh-1", "Phone", None)],
        false,
    );
    updater.async_refresh().await;

    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), updater);
    platform.async_setup_entry();

    assert!(!platform.handle_device_removal("not-a-known-id"));
    assert_eq!(platform.len(), 1);
    assert!(hass.entities.is_registered("device_tracker.phone"));
}

#[tokio::test]
async fn poll_results_flow_to_the_platform() {
    // Full path: device poll -> descriptors -> coordinator -> announcement.
    let mut device = GoogleHomeDevice::new("gh-kitchen", "Kitchen speaker", None);
    device.set_bt_devices(vec![BtJson {
        mac_address: "AA:BB:CC:DD:EE:FF".to_string(),
        device_class: 0x5a020c,
        device_type: 1,
        rssi: -42,
        expected_profiles: 1,
        name: Some("Pixel".to_string()),
    }]);

    let descriptors = bt_descriptors(&[device]);
    assert_eq!(descriptors.len(), 1);
    assert_eq!(descriptors[0].device_id, "aabbccddeeff");

    let hass = Hass::shared();
    let updater = updater(descriptors, false);
    let platform = DeviceTrackerPlatform::new(Arc::clone(&hass), Arc::clone(&updater));
    platform.async_setup_entry();
    assert!(platform.is_empty());

    updater.refresh_and_announce(&hass.dispatcher).await;
    wait_for(|| platform.len() == 1).await;

    let tracker = platform.tracker("aabbccddeeff").unwrap();
    assert_eq!(tracker.name(), "Pixel");
    let state = hass.states.get("device_tracker.pixel").unwrap();
    assert_eq!(state.attribute::<String>("system").as_deref(), Some("gh-kitchen"));
    assert_eq!(
        state.attribute::<String>("mac").as_deref(),
        Some("AA:BB:CC:DD:EE:FF")
    );
}
