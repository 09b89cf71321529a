use super::Converter;
use crate::config::EndpointConfig;
use crate::types::Payload;
use anyhow::Result;
use gateway::DeviceRecord;
use serde_json::Value;
use std::sync::Arc;

/// Passes the whole response body through as a single `raw` datapoint.
///
/// Registered as the `raw` extension. Device name and type are taken
/// literally from the converter configuration, falling back to the request
/// URL when no name is configured. Bodies that are not JSON are decoded as
/// lossy UTF-8 text.
pub struct RawConverter {
    device_name: Option<String>,
    device_type: String,
}

impl RawConverter {
    pub fn new(device_name: &str, device_type: &str) -> Self {
        let device_name = Some(device_name.trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        Self {
            device_name,
            device_type: device_type.to_string(),
        }
    }

    /// Registry factory for the `raw` extension.
    pub fn factory(config: &EndpointConfig) -> Result<Arc<dyn Converter>> {
        Ok(Arc::new(Self::new(
            &config.converter.device_name_json_expression,
            &config.converter.device_type_json_expression,
        )))
    }
}

impl Converter for RawConverter {
    fn convert(&self, source: &str, payload: &Payload) -> Result<DeviceRecord> {
        let device_name = self.device_name.as_deref().unwrap_or(source);
        let mut record = DeviceRecord::new(device_name, self.device_type.as_str());

        let value = match payload {
            Payload::Json(value) => value.clone(),
            Payload::Raw(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        };
        record.push_telemetry("raw", value);

        Ok(record)
    }
}
