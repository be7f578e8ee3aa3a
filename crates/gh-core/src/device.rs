//! Local representation of a Google Home device

use tracing::debug;

use crate::{
    AlarmJson, BtJson, GoogleHomeAlarm, GoogleHomeBtDevice, GoogleHomeTimer, TimerJson,
    GOOGLE_HOME_ALARM_DEFAULT_VALUE,
};

/// A Google Home / Google Wifi device known to the integration
///
/// Holds the identity fields from discovery plus whatever the last poll
/// reported. The alarm, timer, and Bluetooth lists are replaced wholesale on
/// each refresh; there is no incremental diffing.
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleHomeDevice {
    pub device_id: String,
    pub name: String,
    pub auth_token: Option<String>,
    pub ip_address: Option<String>,
    pub hardware: Option<String>,
    pub available: bool,
    do_not_disturb: bool,
    alarm_volume: f64,
    alarms: Vec<GoogleHomeAlarm>,
    timers: Vec<GoogleHomeTimer>,
    bt_devices: Vec<GoogleHomeBtDevice>,
}

impl GoogleHomeDevice {
    pub fn new(
        device_id: impl Into<String>,
        name: impl Into<String>,
        auth_token: Option<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            name: name.into(),
            auth_token,
            ip_address: None,
            hardware: None,
            available: true,
            do_not_disturb: false,
            alarm_volume: GOOGLE_HOME_ALARM_DEFAULT_VALUE,
            alarms: Vec::new(),
            timers: Vec::new(),
            bt_devices: Vec::new(),
        }
    }

    /// Set the IP address from discovery
    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    /// Set the hardware model from discovery
    pub fn with_hardware(mut self, hardware: impl Into<String>) -> Self {
        self.hardware = Some(hardware.into());
        self
    }

    /// Replace the alarm list with the latest poll result
    pub fn set_alarms(&mut self, alarms: Vec<AlarmJson>) {
        debug!(device = %self.name, count = alarms.len(), "Storing alarms");
        self.alarms = alarms.into_iter().map(GoogleHomeAlarm::from).collect();
    }

    /// Replace the timer list with the latest poll result
    pub fn set_timers(&mut self, timers: Vec<TimerJson>) {
        debug!(device = %self.name, count = timers.len(), "Storing timers");
        self.timers = timers.into_iter().map(GoogleHomeTimer::from).collect();
    }

    /// Replace the Bluetooth device list with the latest poll result
    pub fn set_bt_devices(&mut self, devices: Vec<BtJson>) {
        debug!(device = %self.name, count = devices.len(), "Storing Bluetooth devices");
        self.bt_devices = devices.into_iter().map(GoogleHomeBtDevice::from).collect();
    }

    /// Alarms sorted by fire time, with inactive and missed alarms last
    pub fn sorted_alarms(&self) -> Vec<&GoogleHomeAlarm> {
        let mut alarms: Vec<&GoogleHomeAlarm> = self.alarms.iter().collect();
        alarms.sort_by_key(|a| (a.status.is_inactive(), a.fire_time));
        alarms
    }

    /// Timers sorted by fire time, with paused (no fire time) timers last
    pub fn sorted_timers(&self) -> Vec<&GoogleHomeTimer> {
        let mut timers: Vec<&GoogleHomeTimer> = self.timers.iter().collect();
        timers.sort_by_key(|t| (t.fire_time.is_none(), t.fire_time));
        timers
    }

    /// Bluetooth devices sorted strongest signal first
    pub fn sorted_bt_devices(&self) -> Vec<&GoogleHomeBtDevice> {
        let mut devices: Vec<&GoogleHomeBtDevice> = self.bt_devices.iter().collect();
        devices.sort_by_key(|d| std::cmp::Reverse(d.rssi));
        devices
    }

    /// The next alarm that will fire, if any
    pub fn next_alarm(&self) -> Option<&GoogleHomeAlarm> {
        self.sorted_alarms().first().copied()
    }

    /// The next timer that will fire, if any
    pub fn next_timer(&self) -> Option<&GoogleHomeTimer> {
        self.sorted_timers().first().copied()
    }

    /// The Bluetooth device with the strongest signal, if any
    pub fn closest_bt_device(&self) -> Option<&GoogleHomeBtDevice> {
        self.sorted_bt_devices().first().copied()
    }

    pub fn bt_devices(&self) -> &[GoogleHomeBtDevice] {
        &self.bt_devices
    }

    pub fn set_do_not_disturb(&mut self, status: bool) {
        self.do_not_disturb = status;
    }

    pub fn get_do_not_disturb(&self) -> bool {
        self.do_not_disturb
    }

    pub fn set_alarm_volume(&mut self, volume: f64) {
        self.alarm_volume = volume;
    }

    pub fn get_alarm_volume(&self) -> f64 {
        self.alarm_volume
    }
}
