//! NICOS device status and its mapping to alarm severity.

use forwarder_common::AlarmSeverity;

use crate::cache::CacheValue;

/// Device status as reported in the first element of a status tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Ok,
    Warn,
    Busy,
    NotReached,
    Disabled,
    Error,
    Unknown,
    /// A status code this bridge does not know.
    Other(i64),
}

impl DeviceStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            200 => DeviceStatus::Ok,
            210 => DeviceStatus::Warn,
            220 => DeviceStatus::Busy,
            230 => DeviceStatus::NotReached,
            235 => DeviceStatus::Disabled,
            240 => DeviceStatus::Error,
            999 => DeviceStatus::Unknown,
            other => DeviceStatus::Other(other),
        }
    }

    /// Extract the status from a cache value.
    ///
    /// Accepts `(code, text)` tuples and bare integer codes; anything else
    /// yields `None`.
    pub fn from_value(value: &CacheValue) -> Option<Self> {
        let code = match value {
            CacheValue::Int(code) => *code,
            other => match other.first()? {
                CacheValue::Int(code) => *code,
                _ => return None,
            },
        };
        Some(Self::from_code(code))
    }

    /// Alarm severity forwarded for this status.
    pub fn severity(self) -> AlarmSeverity {
        match self {
            DeviceStatus::Warn => AlarmSeverity::Minor,
            DeviceStatus::Error => AlarmSeverity::Major,
            _ => AlarmSeverity::NoAlarm,
        }
    }
}

/// Map a raw status value to the severity to forward.
///
/// Unparseable status values count as OK.
pub fn severity_of(value: &CacheValue) -> AlarmSeverity {
    DeviceStatus::from_value(value)
        .map(DeviceStatus::severity)
        .unwrap_or(AlarmSeverity::NoAlarm)
}
