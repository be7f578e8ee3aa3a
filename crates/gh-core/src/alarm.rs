//! Alarms reported by a Google Home device

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use crate::{convert_from_ms_to_s, DATETIME_STR_FORMAT};

/// Alarm status codes as sent by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleHomeAlarmStatus {
    None,
    Set,
    Ringing,
    Snoozed,
    Inactive,
    Missed,
}

impl GoogleHomeAlarmStatus {
    /// Map the integer wire value onto a status; unknown codes fold to `None`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Set,
            2 => Self::Ringing,
            3 => Self::Snoozed,
            4 => Self::Inactive,
            5 => Self::Missed,
            _ => Self::None,
        }
    }

    /// Whether this alarm will not fire (and should sort last)
    pub fn is_inactive(&self) -> bool {
        matches!(self, Self::Inactive | Self::Missed)
    }
}

/// Raw alarm payload from the local API
#[derive(Debug, Clone, Deserialize)]
pub struct AlarmJson {
    pub id: String,
    pub fire_time: i64,
    pub status: i64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub recurrence: Option<String>,
}

/// Local representation of a Google Home alarm
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleHomeAlarm {
    pub alarm_id: String,
    /// Fire time as a UTC timestamp in seconds
    pub fire_time: i64,
    pub local_time: String,
    pub local_time_iso: String,
    pub status: GoogleHomeAlarmStatus,
    pub label: Option<String>,
    pub recurrence: Option<String>,
}

impl GoogleHomeAlarm {
    pub fn new(
        alarm_id: impl Into<String>,
        fire_time_ms: i64,
        status: i64,
        label: Option<String>,
        recurrence: Option<String>,
    ) -> Self {
        let fire_time = convert_from_ms_to_s(fire_time_ms);
        let dt_local = local_from_timestamp(fire_time);
        Self {
            alarm_id: alarm_id.into(),
            fire_time,
            local_time: dt_local.format(DATETIME_STR_FORMAT).to_string(),
            local_time_iso: dt_local.to_rfc3339(),
            status: GoogleHomeAlarmStatus::from_code(status),
            label,
            recurrence,
        }
    }
}

impl From<AlarmJson> for GoogleHomeAlarm {
    fn from(alarm: AlarmJson) -> Self {
        Self::new(
            alarm.id,
            alarm.fire_time,
            alarm.status,
            alarm.label,
            alarm.recurrence,
        )
    }
}

/// Convert a seconds timestamp into the local timezone
pub(crate) fn local_from_timestamp(secs: i64) -> DateTime<Local> {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .unwrap_or_default()
        .with_timezone(&Local)
}
