//! f142 `LogData` flatbuffer encoding.
//!
//! Every forwarded device update is a single f142 record:
//!
//! ```text
//! table LogData {
//!     source_name: string;        // slot 0
//!     value: Value;               // slots 1 (type) and 2 (table)
//!     timestamp: ulong;           // slot 3, nanoseconds since epoch
//!     status: AlarmStatus;        // slot 4
//!     severity: AlarmSeverity;    // slot 5
//! }
//! ```
//!
//! Only the `Double` member of the `Value` union is produced.

use flatbuffers::FlatBufferBuilder;

use crate::error::{Error, Result};

/// File identifier of the f142 schema.
pub const F142_IDENTIFIER: &str = "f142";

/// Union discriminant of `Double` in the f142 `Value` union.
pub const VALUE_TYPE_DOUBLE: u8 = 10;

const SLOT_SOURCE_NAME: u16 = 4;
const SLOT_VALUE_TYPE: u16 = 6;
const SLOT_VALUE: u16 = 8;
const SLOT_TIMESTAMP: u16 = 10;
const SLOT_STATUS: u16 = 12;
const SLOT_SEVERITY: u16 = 14;
const SLOT_DOUBLE_VALUE: u16 = 4;

/// Alarm severity carried in the `severity` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AlarmSeverity {
    Minor = 0,
    Major = 1,
    NoAlarm = 2,
    Invalid = 3,
    /// The record reports a value update, not an alarm transition.
    NoChange = 4,
}

impl AlarmSeverity {
    /// Wire representation.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Parse a wire value.
    pub fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(Self::Minor),
            1 => Some(Self::Major),
            2 => Some(Self::NoAlarm),
            3 => Some(Self::Invalid),
            4 => Some(Self::NoChange),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::NoAlarm => "NO_ALARM",
            Self::Invalid => "INVALID",
            Self::NoChange => "NO_CHANGE",
        }
    }
}

impl std::fmt::Display for AlarmSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alarm status carried in the `status` field.
///
/// Values follow the f142 `AlarmStatus` enum, which keeps the EPICS alarm
/// status order with `NO_ALARM` first. The forwarder always sends
/// [`AlarmStatus::NoAlarm`]; only the severity is meaningful for NICOS
/// devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum AlarmStatus {
    NoAlarm = 0,
}

impl AlarmStatus {
    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

/// A single device reading as it goes on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct LogData {
    /// Device name.
    pub source_name: String,
    /// Numeric reading.
    pub value: f64,
    /// Nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
    /// Alarm status field.
    pub status: AlarmStatus,
    /// Alarm severity field.
    pub severity: AlarmSeverity,
}

impl LogData {
    /// Create a record with the fixed "no alarm" status.
    pub fn new(
        source_name: impl Into<String>,
        value: f64,
        timestamp_ns: i64,
        severity: AlarmSeverity,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            value,
            timestamp_ns,
            status: AlarmStatus::NoAlarm,
            severity,
        }
    }
}

/// Encode a record as a finished f142 flatbuffer.
pub fn encode_f142(data: &LogData) -> Result<Vec<u8>> {
    if data.source_name.is_empty() {
        return Err(Error::Encode("source name must not be empty".to_string()));
    }
    let timestamp = u64::try_from(data.timestamp_ns).map_err(|_| {
        Error::Encode(format!(
            "timestamp {} is before the Unix epoch",
            data.timestamp_ns
        ))
    })?;

    let mut builder = FlatBufferBuilder::with_capacity(128);

    let source_name = builder.create_string(&data.source_name);

    let double_start = builder.start_table();
    builder.push_slot_always::<f64>(SLOT_DOUBLE_VALUE, data.value);
    let double = builder.end_table(double_start);

    let start = builder.start_table();
    builder.push_slot_always::<u64>(SLOT_TIMESTAMP, timestamp);
    builder.push_slot_always(SLOT_VALUE, double);
    builder.push_slot_always(SLOT_SOURCE_NAME, source_name);
    builder.push_slot_always::<u16>(SLOT_STATUS, data.status.as_u16());
    builder.push_slot_always::<u16>(SLOT_SEVERITY, data.severity.as_u16());
    builder.push_slot_always::<u8>(SLOT_VALUE_TYPE, VALUE_TYPE_DOUBLE);
    let root = builder.end_table(start);

    builder.finish(root, Some(F142_IDENTIFIER));
    Ok(builder.finished_data().to_vec())
}
