use crate::converters::Converter;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;

/// Response body handed from a dispatcher to the forward stage.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    /// Body parsed as JSON
    Json(Value),
    /// Body that could not be parsed as JSON
    Raw(Vec<u8>),
}

impl Payload {
    /// Parses a response body, falling back to the raw bytes.
    pub fn from_body(body: &[u8]) -> Self {
        match serde_json::from_slice(body) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Raw(body.to_vec()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Payload::Json(value) => Some(value),
            Payload::Raw(_) => None,
        }
    }
}

/// One successful response waiting in the hand-off queue.
#[derive(Clone)]
pub struct Handoff {
    /// Resolved request URL, passed to the converter as source identifier
    pub url: String,
    pub converter: Arc<dyn Converter>,
    pub payload: Payload,
}

/// Status information for one polled endpoint.
#[derive(Clone, Debug)]
pub struct EndpointStatus {
    pub url: String,
    /// Requests issued
    pub dispatch_count: u64,
    /// Responses accepted into the hand-off queue
    pub success_count: u64,
    /// Timeouts, connection failures and non-2xx responses
    pub error_count: u64,
    /// Successful responses dropped because the queue was full
    pub dropped_count: u64,
    /// Last time a response was accepted into the queue
    pub last_success: Option<DateTime<Utc>>,
    /// Last error message (if any)
    pub last_error: Option<String>,
}

impl EndpointStatus {
    pub fn new(url: String) -> Self {
        Self {
            url,
            dispatch_count: 0,
            success_count: 0,
            error_count: 0,
            dropped_count: 0,
            last_success: None,
            last_error: None,
        }
    }
}
