//! Per-entry integration options

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_UPDATE_INTERVAL;

/// Options attached to a configured integration entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleHomeOptions {
    /// Polling interval in seconds
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,

    /// Register newly discovered tracked devices in the disabled state
    #[serde(default)]
    pub add_disabled: bool,
}

fn default_update_interval_secs() -> u64 {
    DEFAULT_UPDATE_INTERVAL.as_secs()
}

impl GoogleHomeOptions {
    pub fn update_interval(&self) -> Duration {
        Duration::from_secs(self.update_interval_secs)
    }
}

impl Default for GoogleHomeOptions {
    fn default() -> Self {
        Self {
            update_interval_secs: default_update_interval_secs(),
            add_disabled: false,
        }
    }
}
