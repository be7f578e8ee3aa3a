//! Data model for Google Home devices
//!
//! This crate provides the local representation of a Google Home device and
//! everything it reports over the local API: alarms, timers, and the
//! Bluetooth devices it can see. The types here are plain data with no host
//! dependency; the integration layer maps them into entities.

mod alarm;
mod bt;
mod device;
mod timer;

pub use alarm::{AlarmJson, GoogleHomeAlarm, GoogleHomeAlarmStatus};
pub use bt::{device_id_from_mac, BtDeviceDescriptor, BtJson, GoogleHomeBtDevice};
pub use device::GoogleHomeDevice;
pub use timer::{GoogleHomeTimer, GoogleHomeTimerStatus, TimerJson};

/// Format used for human-readable local times on alarms and timers
pub const DATETIME_STR_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Default alarm volume reported before the device tells us otherwise
pub const GOOGLE_HOME_ALARM_DEFAULT_VALUE: f64 = 0.0;

/// Convert a millisecond timestamp from the API into whole seconds
pub fn convert_from_ms_to_s(timestamp: i64) -> i64 {
    (timestamp as f64 / 1000.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ms_to_s_rounds() {
        assert_eq!(convert_from_ms_to_s(1_000), 1);
        assert_eq!(convert_from_ms_to_s(1_499), 1);
        assert_eq!(convert_from_ms_to_s(1_500), 2);
        assert_eq!(convert_from_ms_to_s(0), 0);
    }
}
