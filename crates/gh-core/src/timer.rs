//! Timers reported by a Google Home device

use serde::{Deserialize, Serialize};

use crate::alarm::local_from_timestamp;
use crate::{convert_from_ms_to_s, DATETIME_STR_FORMAT};

/// Timer status codes as sent by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoogleHomeTimerStatus {
    None,
    Set,
    Paused,
    Ringing,
}

impl GoogleHomeTimerStatus {
    /// Map the integer wire value onto a status; unknown codes fold to `None`
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Set,
            2 => Self::Paused,
            3 => Self::Ringing,
            _ => Self::None,
        }
    }
}

/// Raw timer payload from the local API
#[derive(Debug, Clone, Deserialize)]
pub struct TimerJson {
    pub id: String,
    #[serde(default)]
    pub fire_time: Option<i64>,
    pub original_duration: i64,
    pub status: i64,
    #[serde(default)]
    pub label: Option<String>,
}

/// Local representation of a Google Home timer
///
/// A paused timer has no fire time, so the rendered local times are optional.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoogleHomeTimer {
    pub timer_id: String,
    /// Fire time as a UTC timestamp in seconds, absent while paused
    pub fire_time: Option<i64>,
    pub local_time: Option<String>,
    pub local_time_iso: Option<String>,
    /// Original duration rendered as `H:MM:SS`
    pub duration: String,
    pub status: GoogleHomeTimerStatus,
    pub label: Option<String>,
}

impl GoogleHomeTimer {
    pub fn new(
        timer_id: impl Into<String>,
        fire_time_ms: Option<i64>,
        duration_ms: i64,
        status: i64,
        label: Option<String>,
    ) -> Self {
        let fire_time = fire_time_ms.map(convert_from_ms_to_s);
        let (local_time, local_time_iso) = match fire_time {
            Some(secs) => {
                let dt_local = local_from_timestamp(secs);
                (
                    Some(dt_local.format(DATETIME_STR_FORMAT).to_string()),
                    Some(dt_local.to_rfc3339()),
                )
            }
            None => (None, None),
        };
        Self {
            timer_id: timer_id.into(),
            fire_time,
            local_time,
            local_time_iso,
            duration: format_duration(convert_from_ms_to_s(duration_ms)),
            status: GoogleHomeTimerStatus::from_code(status),
            label,
        }
    }
}

impl From<TimerJson> for GoogleHomeTimer {
    fn from(timer: TimerJson) -> Self {
        Self::new(
            timer.id,
            timer.fire_time,
            timer.original_duration,
            timer.status,
            timer.label,
        )
    }
}

/// Render a duration in seconds as `H:MM:SS`
fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_rendering() {
        assert_eq!(format_duration(0), "0:00:00");
        assert_eq!(format_duration(90), "0:01:30");
        assert_eq!(format_duration(3_600), "1:00:00");
        assert_eq!(format_duration(5_025), "1:23:45");
    }

    #[test]
    fn test_paused_timer_has_no_local_time() {
        let timer = GoogleHomeTimer::new("timer/1", None, 1_800_000, 2, None);
        assert_eq!(timer.fire_time, None);
        assert_eq!(timer.local_time, None);
        assert_eq!(timer.local_time_iso, None);
        assert_eq!(timer.status, GoogleHomeTimerStatus::Paused);
        assert_eq!(timer.duration, "0:30:00");
    }

    #[test]
    fn test_running_timer() {
        let timer = GoogleHomeTimer::new(
            "timer/2",
            Some(1_700_000_000_000),
            600_000,
            1,
            Some("tea".into()),
        );
        assert_eq!(timer.fire_time, Some(1_700_000_000));
        assert!(timer.local_time_iso.is_some());
        assert_eq!(timer.status, GoogleHomeTimerStatus::Set);
        assert_eq!(timer.duration, "0:10:00");
    }
}
