pub mod expression;

use super::Converter;
use crate::config::{DatapointConfig, EndpointConfig};
use crate::types::Payload;
use anyhow::{anyhow, Context, Result};
use gateway::DeviceRecord;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use self::expression::{evaluate, value_to_text};

/// Built-in converter driven by `${path}` expressions.
///
/// Device name and type come from `device_name_json_expression` and
/// `device_type_json_expression`; every configured attribute and telemetry
/// datapoint is evaluated against the response body and coerced to its
/// declared type.
pub struct JsonConverter {
    device_name: String,
    device_type: String,
    attributes: Vec<DatapointConfig>,
    telemetry: Vec<DatapointConfig>,
}

impl JsonConverter {
    /// Builds the converter for an endpoint.
    ///
    /// Fails when no device name expression is configured.
    pub fn new(config: &EndpointConfig) -> Result<Self> {
        let converter = &config.converter;
        if converter.device_name_json_expression.trim().is_empty() {
            anyhow::bail!(
                "device_name_json_expression is required for endpoint '{}'",
                config.url
            );
        }
        Ok(Self {
            device_name: converter.device_name_json_expression.clone(),
            device_type: converter.device_type_json_expression.clone(),
            attributes: converter.attributes.clone(),
            telemetry: converter.telemetry.clone(),
        })
    }

    /// Registry factory for the `json` converter.
    pub fn factory(config: &EndpointConfig) -> Result<Arc<dyn Converter>> {
        Ok(Arc::new(Self::new(config)?))
    }

    fn datapoints<'a>(
        &self,
        source: &str,
        mappings: &'a [DatapointConfig],
        data: &Value,
    ) -> Vec<(&'a str, Value)> {
        mappings
            .iter()
            .filter_map(|mapping| {
                let Some(raw) = evaluate(&mapping.value, data) else {
                    debug!(
                        url = %source,
                        key = %mapping.key,
                        expression = %mapping.value,
                        "Expression not found in response, skipping datapoint"
                    );
                    return None;
                };
                match coerce(raw, &mapping.value_type) {
                    Some(value) => Some((mapping.key.as_str(), value)),
                    None => {
                        debug!(
                            url = %source,
                            key = %mapping.key,
                            value_type = %mapping.value_type,
                            "Value cannot be converted to declared type, skipping datapoint"
                        );
                        None
                    }
                }
            })
            .collect()
    }
}

impl Converter for JsonConverter {
    fn convert(&self, source: &str, payload: &Payload) -> Result<DeviceRecord> {
        let data = payload
            .as_json()
            .ok_or_else(|| anyhow!("Response from {} is not JSON", source))?;

        let device_name = resolve_text(&self.device_name, data)
            .with_context(|| format!("Cannot resolve device name for {}", source))?;
        let device_type = resolve_text(&self.device_type, data)
            .with_context(|| format!("Cannot resolve device type for {}", source))?;

        let mut record = DeviceRecord::new(device_name, device_type);
        for (key, value) in self.datapoints(source, &self.attributes, data) {
            record.push_attribute(key, value);
        }
        for (key, value) in self.datapoints(source, &self.telemetry, data) {
            record.push_telemetry(key, value);
        }

        Ok(record)
    }
}

fn resolve_text(expression: &str, data: &Value) -> Result<String> {
    let value = evaluate(expression, data)
        .ok_or_else(|| anyhow!("expression '{}' not found in response", expression))?;
    let text = value_to_text(&value);
    if text.trim().is_empty() {
        anyhow::bail!("expression '{}' resolved to an empty value", expression);
    }
    Ok(text)
}

/// Coerces a resolved value to a declared datapoint type.
fn coerce(value: Value, value_type: &str) -> Option<Value> {
    match value_type.to_ascii_lowercase().as_str() {
        "string" | "str" => Some(Value::String(value_to_text(&value))),
        "int" | "integer" | "long" => match &value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
                .map(Value::from),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .ok()
                .or_else(|| s.trim().parse::<f64>().ok().map(|f| f.trunc() as i64))
                .map(Value::from),
            Value::Bool(b) => Some(Value::from(*b as i64)),
            _ => None,
        },
        "double" | "float" => match &value {
            Value::Number(n) => n.as_f64().map(Value::from),
            Value::String(s) => s.trim().parse::<f64>().ok().map(Value::from),
            _ => None,
        },
        "bool" | "boolean" => match &value {
            Value::Bool(b) => Some(Value::Bool(*b)),
            Value::Number(n) => n.as_f64().map(|f| Value::Bool(f != 0.0)),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => None,
            },
            _ => None,
        },
        _ => Some(value),
    }
}
