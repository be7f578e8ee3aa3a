//! Google Home integration platforms
//!
//! Exposes Google Home / Google Wifi devices to the host: a device_tracker
//! platform for the Bluetooth devices they see, and alarm/timer sensors for
//! the devices themselves. Entities hang off polling coordinators and learn
//! about late-arriving Bluetooth devices over the dispatcher.

pub mod config;
pub mod consts;
pub mod coordinator;
pub mod device_tracker;
pub mod entity;
pub mod sensor;

pub use config::GoogleHomeOptions;
pub use coordinator::{
    bt_descriptors, GoogleHomeBtDeviceUpdater, GoogleHomeUpdater, InertUpdateSource,
};
pub use device_tracker::{DeviceTrackerPlatform, GoogleHomeDeviceTracker};
pub use entity::{cleanup_device_registry, BtDeviceEntity, GoogleHomeBaseEntity};
pub use sensor::{
    GoogleHomeAlarmsSensor, GoogleHomeSensor, GoogleHomeTimersSensor, SensorPlatform,
};
