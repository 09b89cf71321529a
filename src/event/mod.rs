use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

mod validation;

pub use validation::{validate, ValidationError};

/// DeviceRecord is the normalized output of a converter.
///
/// The record is opaque to the polling pipeline: converters build it and
/// sinks forward it verbatim.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    /// Device the datapoints belong to
    #[serde(rename = "deviceName")]
    pub device_name: String,

    /// Device profile/type
    #[serde(rename = "deviceType")]
    pub device_type: String,

    /// Client-side attributes, one `{key: value}` object per datapoint
    #[serde(default)]
    pub attributes: Vec<Map<String, Value>>,

    /// Time-series values, one `{key: value}` object per datapoint
    #[serde(default)]
    pub telemetry: Vec<Map<String, Value>>,
}

impl DeviceRecord {
    /// Creates an empty record for a device.
    pub fn new(device_name: impl Into<String>, device_type: impl Into<String>) -> Self {
        Self {
            device_name: device_name.into(),
            device_type: device_type.into(),
            attributes: Vec::new(),
            telemetry: Vec::new(),
        }
    }

    /// Appends a single attribute datapoint.
    pub fn push_attribute(&mut self, key: impl Into<String>, value: Value) {
        let mut entry = Map::new();
        entry.insert(key.into(), value);
        self.attributes.push(entry);
    }

    /// Appends a single telemetry datapoint.
    pub fn push_telemetry(&mut self, key: impl Into<String>, value: Value) {
        let mut entry = Map::new();
        entry.insert(key.into(), value);
        self.telemetry.push(entry);
    }

    /// Checks the record before it is handed to a sink.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::validate(self)
    }
}

/// Envelope written by sinks that persist or forward records.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayEvent {
    /// UUIDv7 identifier (time-ordered)
    #[serde(rename = "eventId")]
    pub event_id: String,

    /// Name of the connector that produced the record
    pub connector: String,

    /// Unix epoch milliseconds (gateway time)
    pub timestamp: i64,

    pub record: DeviceRecord,
}

impl GatewayEvent {
    /// Wraps a record with a fresh event id and the current time.
    pub fn new(connector: &str, record: DeviceRecord) -> Self {
        Self {
            event_id: Uuid::now_v7().to_string(),
            connector: connector.to_string(),
            timestamp: Utc::now().timestamp_millis(),
            record,
        }
    }
}
