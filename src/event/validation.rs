use super::DeviceRecord;
use serde_json::{Map, Value};
use std::fmt;

/// Validation errors for DeviceRecord
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    MissingDeviceName,
    MissingDeviceType,
    EmptyDatapoint,
    EmptyKey,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::MissingDeviceName => write!(f, "deviceName is required"),
            ValidationError::MissingDeviceType => write!(f, "deviceType is required"),
            ValidationError::EmptyDatapoint => {
                write!(f, "datapoint must contain exactly one key")
            }
            ValidationError::EmptyKey => write!(f, "datapoint key must not be empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validates a DeviceRecord.
///
/// Validation rules:
/// - Required fields: deviceName, deviceType (non-blank)
/// - Every attribute/telemetry entry holds exactly one non-empty key
pub fn validate(record: &DeviceRecord) -> Result<(), ValidationError> {
    if record.device_name.trim().is_empty() {
        return Err(ValidationError::MissingDeviceName);
    }
    if record.device_type.trim().is_empty() {
        return Err(ValidationError::MissingDeviceType);
    }

    for entry in record.attributes.iter().chain(record.telemetry.iter()) {
        validate_datapoint(entry)?;
    }

    Ok(())
}

fn validate_datapoint(entry: &Map<String, Value>) -> Result<(), ValidationError> {
    if entry.len() != 1 {
        return Err(ValidationError::EmptyDatapoint);
    }
    if entry.keys().any(|k| k.is_empty()) {
        return Err(ValidationError::EmptyKey);
    }
    Ok(())
}
