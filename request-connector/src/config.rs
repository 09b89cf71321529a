//! Connector configuration.
//!
//! Loaded once at startup from a TOML file. Keys follow snake_case; the
//! camelCase spellings of the gateway's JSON connector files (`scanPeriod`,
//! `httpMethod`, `SSLVerify`, ...) are accepted as aliases.

use anyhow::{Context, Result};
use gateway::SinkConfig;
use rand::Rng;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Top-level connector configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectorConfig {
    /// Connector name used when forwarding records. Random if absent.
    #[serde(default)]
    pub name: Option<String>,

    /// Base host. `http://` is prepended when no scheme is given.
    pub host: String,

    /// Connector-wide TLS certificate verification.
    #[serde(default, alias = "SSLVerify")]
    pub ssl_verify: bool,

    /// Capacity of the hand-off queue between dispatch and forwarding.
    #[serde(default = "default_queue_capacity", alias = "queueCapacity")]
    pub queue_capacity: usize,

    /// Scheduler sleep when no endpoint is due (milliseconds).
    #[serde(default = "default_scan_interval_ms", alias = "scanIntervalMs")]
    pub scan_interval_ms: u64,

    /// Skip a due endpoint while its previous request is still running.
    #[serde(default, alias = "skipWhileInFlight")]
    pub skip_while_in_flight: bool,

    /// Where converted records go.
    #[serde(default)]
    pub sink: SinkConfig,

    /// Polled endpoints.
    #[serde(default)]
    pub mapping: Vec<EndpointConfig>,
}

/// One polled endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct EndpointConfig {
    /// Path relative to the host.
    pub url: String,

    #[serde(default = "default_http_method", alias = "httpMethod")]
    pub http_method: String,

    #[serde(default, alias = "httpHeaders")]
    pub http_headers: BTreeMap<String, String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// Poll interval in seconds.
    #[serde(default = "default_scan_period", alias = "scanPeriod")]
    pub scan_period: f64,

    #[serde(default, alias = "allowRedirects")]
    pub allow_redirects: bool,

    /// Overrides the connector-wide `ssl_verify` for this endpoint.
    #[serde(default, alias = "SSLVerify")]
    pub ssl_verify: Option<bool>,

    #[serde(default)]
    pub converter: ConverterConfig,
}

/// Converter kind bound to an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConverterType {
    /// Built-in JSON expression converter
    #[default]
    Json,
    /// Converter registered under `extension`
    Custom,
}

/// Converter selection and its parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct ConverterConfig {
    #[serde(rename = "type", default)]
    pub converter_type: ConverterType,

    /// Registry name of a custom converter.
    #[serde(default)]
    pub extension: Option<String>,

    #[serde(
        default = "default_device_name_expression",
        alias = "deviceNameJsonExpression"
    )]
    pub device_name_json_expression: String,

    #[serde(
        default = "default_device_type_expression",
        alias = "deviceTypeJsonExpression"
    )]
    pub device_type_json_expression: String,

    #[serde(default)]
    pub attributes: Vec<DatapointConfig>,

    #[serde(default, alias = "timeseries")]
    pub telemetry: Vec<DatapointConfig>,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            converter_type: ConverterType::Json,
            extension: None,
            device_name_json_expression: default_device_name_expression(),
            device_type_json_expression: default_device_type_expression(),
            attributes: Vec::new(),
            telemetry: Vec::new(),
        }
    }
}

/// A single attribute or telemetry mapping.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DatapointConfig {
    pub key: String,

    /// Target type: string, int, double or bool. Anything else keeps the
    /// resolved JSON value as is.
    #[serde(rename = "type", default = "default_datapoint_type")]
    pub value_type: String,

    /// Literal or `${path}` expression.
    pub value: String,
}

fn default_queue_capacity() -> usize {
    1_000_000
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_http_method() -> String {
    "GET".to_string()
}

fn default_timeout() -> f64 {
    1.0
}

fn default_scan_period() -> f64 {
    10.0
}

fn default_device_name_expression() -> String {
    String::new()
}

fn default_device_type_expression() -> String {
    "default".to_string()
}

fn default_datapoint_type() -> String {
    "raw".to_string()
}

impl ConnectorConfig {
    /// Returns the configured name or a random 5-letter lowercase name.
    pub fn resolve_name(&self) -> String {
        match &self.name {
            Some(name) if !name.trim().is_empty() => name.clone(),
            _ => random_name(),
        }
    }

    /// Scheduler sleep when nothing is due, at least one millisecond.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms.max(1))
    }

    /// Base host with a scheme and no trailing separator.
    pub fn normalized_host(&self) -> String {
        normalize_host(&self.host)
    }
}

/// Prepends `http://` when the host carries no scheme.
pub fn normalize_host(host: &str) -> String {
    let host = host.trim();
    let lower = host.to_lowercase();
    let with_scheme = if lower.starts_with("http://") || lower.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    with_scheme.trim_end_matches('/').to_string()
}

/// Normalizes an endpoint path to start with exactly one `/`.
pub fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim().trim_start_matches('/'))
}

fn random_name() -> String {
    let mut rng = rand::thread_rng();
    (0..5).map(|_| rng.gen_range(b'a'..=b'z') as char).collect()
}

/// Load connector configuration from a TOML file.
pub fn load_config(path: &str) -> Result<ConnectorConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read connector config at {}", path))?;
    parse_config(&contents).with_context(|| format!("Invalid connector config at {}", path))
}

/// Parse connector configuration from TOML text.
pub fn parse_config(contents: &str) -> Result<ConnectorConfig> {
    let config: ConnectorConfig = toml::from_str(contents)?;
    Ok(config)
}
