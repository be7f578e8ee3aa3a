//! Integration-wide constants

use std::time::Duration;

/// Integration domain
pub const DOMAIN: &str = "google_home";

pub const DEFAULT_NAME: &str = "Google Home";
pub const MANUFACTURER: &str = "Google Inc.";

/// Model string for devices created for tracked Bluetooth clients
pub const DEV_CLIENT_MODEL: &str = "Google Home Bluetooth tracked device";

/// Dispatcher signal announcing a newly seen Bluetooth device
pub const SIGNAL_ADD_DEVICE: &str = "google_home_add_device";

pub const SOURCE_TYPE_BLUETOOTH: &str = "bluetooth";

pub const STATE_HOME: &str = "home";
pub const STATE_NOT_HOME: &str = "not_home";
pub const STATE_UNAVAILABLE: &str = "unavailable";

pub const ICON_BT_DEVICES: &str = "mdi:bluetooth";
pub const ICON_ALARMS: &str = "mdi:alarm-multiple";
pub const ICON_TIMERS: &str = "mdi:timer-sand";

pub const LABEL_ALARMS: &str = "alarms";
pub const LABEL_TIMERS: &str = "timers";

pub const ATTR_SYSTEM: &str = "system";
pub const ATTR_MAC: &str = "mac";
pub const ATTR_ALARMS: &str = "alarms";
pub const ATTR_TIMERS: &str = "timers";

/// Default polling interval
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(180);
