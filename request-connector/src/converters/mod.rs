pub mod json;
pub mod raw;

use crate::types::Payload;
use anyhow::Result;
use gateway::DeviceRecord;

/// Transforms one response payload into a normalized device record.
///
/// Converters are bound to an endpoint when the schedule is built and are
/// shared by every handoff produced for that endpoint. `convert` runs on
/// the forward stage; a slow converter delays every record behind it.
///
/// # Example
/// ```
/// use request_connector::converters::Converter;
/// use request_connector::Payload;
/// use gateway::DeviceRecord;
///
/// struct StatusCodeConverter;
///
/// impl Converter for StatusCodeConverter {
///     fn convert(&self, source: &str, payload: &Payload) -> anyhow::Result<DeviceRecord> {
///         let mut record = DeviceRecord::new(source, "http");
///         record.push_telemetry("json", serde_json::Value::Bool(payload.as_json().is_some()));
///         Ok(record)
///     }
/// }
/// ```
pub trait Converter: Send + Sync {
    /// Converts `payload`, received from `source` (the request URL).
    fn convert(&self, source: &str, payload: &Payload) -> Result<DeviceRecord>;
}
