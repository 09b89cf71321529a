//! Endpoint registry - the static set of polled endpoints.
//!
//! Built once at startup from [`ConnectorConfig`]. An endpoint that cannot
//! be built (unknown converter, bad method or header, invalid timing) is
//! logged and left out; the remaining endpoints still register.

use crate::config::{normalize_path, ConnectorConfig, EndpointConfig};
use crate::converters::Converter;
use crate::registry::ConverterRegistry;
use crate::types::EndpointStatus;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::redirect::Policy;
use reqwest::Method;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, info};

/// Redirect hops followed when an endpoint allows redirects.
const MAX_REDIRECTS: usize = 10;

/// Immutable description of one polled endpoint.
pub struct EndpointDescriptor {
    /// Normalized path (single leading `/`)
    pub path: String,
    /// Host joined with path
    pub url: String,
    pub method: Method,
    pub headers: HeaderMap,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub allow_redirects: bool,
    pub ssl_verify: bool,
    pub converter: Arc<dyn Converter>,
    /// Client carrying timeout, redirect and TLS policy
    pub(crate) http_client: reqwest::Client,
    pub(crate) status: Mutex<EndpointStatus>,
}

impl EndpointDescriptor {
    /// Builds a descriptor for `config` against an already normalized host.
    pub fn new(
        host: &str,
        default_ssl_verify: bool,
        config: &EndpointConfig,
        converter: Arc<dyn Converter>,
    ) -> Result<Self> {
        let path = normalize_path(&config.url);
        let url = format!("{}{}", host, path);

        let method = Method::from_bytes(config.http_method.trim().to_uppercase().as_bytes())
            .with_context(|| format!("Invalid HTTP method '{}'", config.http_method))?;

        let mut headers = HeaderMap::new();
        for (key, value) in &config.http_headers {
            let name = HeaderName::try_from(key.as_str())
                .with_context(|| format!("Invalid HTTP header name '{}'", key))?;
            let value = HeaderValue::try_from(value.as_str())
                .with_context(|| format!("Invalid value for HTTP header '{}'", key))?;
            headers.insert(name, value);
        }

        let timeout = seconds(config.timeout, "timeout")?;
        if timeout.is_zero() {
            anyhow::bail!("timeout must be greater than zero");
        }
        let poll_interval = seconds(config.scan_period, "scan_period")?;
        if Instant::now().checked_add(poll_interval).is_none() {
            anyhow::bail!("scan_period {} is too large", config.scan_period);
        }
        let ssl_verify = config.ssl_verify.unwrap_or(default_ssl_verify);

        let redirect = if config.allow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(redirect)
            .danger_accept_invalid_certs(!ssl_verify)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            path,
            status: Mutex::new(EndpointStatus::new(url.clone())),
            url,
            method,
            headers,
            timeout,
            poll_interval,
            allow_redirects: config.allow_redirects,
            ssl_verify,
            converter,
            http_client,
        })
    }

    /// Raises the poll interval to at least `min_interval`.
    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        if self.poll_interval < min_interval {
            debug!(
                url = %self.url,
                configured_secs = self.poll_interval.as_secs_f64(),
                effective_secs = min_interval.as_secs_f64(),
                "Poll interval raised to the scan interval"
            );
            self.poll_interval = min_interval;
        }
        self
    }

    /// Snapshot of this endpoint's counters.
    pub async fn status(&self) -> EndpointStatus {
        self.status.lock().await.clone()
    }
}

fn seconds(value: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(value)
        .with_context(|| format!("{} must be a non-negative number of seconds, got {}", field, value))
}

/// Mutable scheduling state for one endpoint.
pub struct ScheduleEntry {
    pub descriptor: Arc<EndpointDescriptor>,
    /// `None` once the next due time is past what `Instant` can represent
    next_due: Option<Instant>,
    in_flight: Arc<AtomicBool>,
}

impl ScheduleEntry {
    /// Creates an entry that is due immediately.
    pub fn new(descriptor: Arc<EndpointDescriptor>) -> Self {
        Self::due_at(descriptor, Instant::now())
    }

    pub fn due_at(descriptor: Arc<EndpointDescriptor>, next_due: Instant) -> Self {
        Self {
            descriptor,
            next_due: Some(next_due),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Returns true and advances `next_due` to `now + poll_interval` when
    /// the entry is due at `now`. An entry whose next due time overflows is
    /// never due again.
    pub fn poll_due(&mut self, now: Instant) -> bool {
        match self.next_due {
            Some(due) if due <= now => {
                self.next_due = now.checked_add(self.descriptor.poll_interval);
                true
            }
            _ => false,
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Marks the entry in flight until the returned guard is dropped.
    pub fn begin_flight(&self) -> InFlightGuard {
        self.in_flight.store(true, Ordering::Release);
        InFlightGuard {
            flag: Arc::clone(&self.in_flight),
        }
    }
}

/// Clears an entry's in-flight flag on drop.
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Builds the active schedule from configuration.
///
/// Endpoints whose converter cannot be resolved, or whose descriptor is
/// invalid, are logged and skipped.
pub fn build_schedule(config: &ConnectorConfig, registry: &ConverterRegistry) -> Vec<ScheduleEntry> {
    let host = config.normalized_host();
    let scan_interval = config.scan_interval();
    let mut entries = Vec::with_capacity(config.mapping.len());

    for endpoint in &config.mapping {
        let converter = match registry.resolve(endpoint) {
            Ok(converter) => converter,
            Err(e) => {
                error!(
                    url = %endpoint.url,
                    error = %format!("{:#}", e),
                    "Cannot resolve converter, please check your configuration"
                );
                continue;
            }
        };

        match EndpointDescriptor::new(&host, config.ssl_verify, endpoint, converter) {
            Ok(descriptor) => {
                let descriptor = descriptor.with_min_interval(scan_interval);
                info!(
                    url = %descriptor.url,
                    path = %descriptor.path,
                    method = %descriptor.method,
                    interval_secs = descriptor.poll_interval.as_secs_f64(),
                    "Endpoint registered"
                );
                entries.push(ScheduleEntry::new(Arc::new(descriptor)));
            }
            Err(e) => error!(
                url = %endpoint.url,
                error = %format!("{:#}", e),
                "Invalid endpoint configuration, skipping"
            ),
        }
    }

    info!(
        configured = config.mapping.len(),
        active = entries.len(),
        "Endpoint schedule built"
    );
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    const CONFIG: &str = r#"
host = "127.0.0.1:5000"

[[mapping]]
url = "data"
scan_period = 1
[mapping.converter]
device_name_json_expression = "meter"

[[mapping]]
url = "custom"
[mapping.converter]
type = "custom"
extension = "missing"

[[mapping]]
url = "//status"
http_method = "post"
http_headers = { Accept = "application/json" }
ssl_verify = true
[mapping.converter]
type = "custom"
extension = "raw"
"#;

    fn descriptor(scan_period: f64) -> Arc<EndpointDescriptor> {
        let mut config = parse_config(CONFIG).unwrap();
        let mut endpoint = config.mapping.remove(0);
        endpoint.scan_period = scan_period;
        let converter = ConverterRegistry::with_builtins().resolve(&endpoint).unwrap();
        Arc::new(EndpointDescriptor::new("http://localhost", false, &endpoint, converter).unwrap())
    }

    #[test]
    fn test_build_schedule_skips_unresolvable_converter() {
        let config = parse_config(CONFIG).unwrap();
        let entries = build_schedule(&config, &ConverterRegistry::with_builtins());

        let urls: Vec<&str> = entries.iter().map(|e| e.descriptor.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["http://127.0.0.1:5000/data", "http://127.0.0.1:5000/status"]
        );
    }

    #[test]
    fn test_descriptor_fields() {
        let config = parse_config(CONFIG).unwrap();
        let entries = build_schedule(&config, &ConverterRegistry::with_builtins());

        let data = &entries[0].descriptor;
        assert_eq!(data.path, "/data");
        assert_eq!(data.method, Method::GET);
        assert_eq!(data.timeout, Duration::from_secs(1));
        assert_eq!(data.poll_interval, Duration::from_secs(1));
        assert!(!data.allow_redirects);
        assert!(!data.ssl_verify);

        let status = &entries[1].descriptor;
        assert_eq!(status.method, Method::POST);
        assert_eq!(status.headers["accept"], "application/json");
        assert_eq!(status.poll_interval, Duration::from_secs(10));
        assert!(status.ssl_verify);
    }

    #[test]
    fn test_invalid_endpoint_is_skipped() {
        let mut config = parse_config(CONFIG).unwrap();
        config.mapping[0].timeout = -1.0;
        config.mapping[2].http_headers.insert("bad header".to_string(), "x".to_string());

        let entries = build_schedule(&config, &ConverterRegistry::with_builtins());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_unrepresentable_scan_period_is_skipped() {
        let mut config = parse_config(CONFIG).unwrap();
        config.mapping[0].scan_period = 1e19;

        let entries = build_schedule(&config, &ConverterRegistry::with_builtins());
        let urls: Vec<&str> = entries.iter().map(|e| e.descriptor.url.as_str()).collect();
        assert_eq!(urls, vec!["http://127.0.0.1:5000/status"]);
    }

    #[tokio::test]
    async fn test_poll_due_overflow_is_never_due_again() {
        let mut config = parse_config(CONFIG).unwrap();
        let mut endpoint = config.mapping.remove(0);
        endpoint.scan_period = 1.0;
        let converter = ConverterRegistry::with_builtins().resolve(&endpoint).unwrap();
        let mut descriptor =
            EndpointDescriptor::new("http://localhost", false, &endpoint, converter).unwrap();
        descriptor.poll_interval = Duration::MAX;

        let now = Instant::now();
        let mut entry = ScheduleEntry::due_at(Arc::new(descriptor), now);
        assert!(entry.poll_due(now));
        assert_eq!(entry.next_due(), None);
        assert!(!entry.poll_due(now + Duration::from_secs(3600)));
    }

    #[test]
    fn test_poll_interval_raised_to_scan_interval() {
        let mut config = parse_config(CONFIG).unwrap();
        config.scan_interval_ms = 250;
        config.mapping[0].scan_period = 0.0;

        let entries = build_schedule(&config, &ConverterRegistry::with_builtins());
        assert_eq!(entries[0].descriptor.poll_interval, Duration::from_millis(250));
        // longer periods are untouched
        assert_eq!(entries[1].descriptor.poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = parse_config(CONFIG).unwrap();
        let mut endpoint = config.mapping.remove(0);
        endpoint.timeout = 0.0;
        let converter = ConverterRegistry::with_builtins().resolve(&endpoint).unwrap();
        assert!(EndpointDescriptor::new("http://localhost", false, &endpoint, converter).is_err());
    }

    #[tokio::test]
    async fn test_new_entry_is_due_immediately() {
        let mut entry = ScheduleEntry::new(descriptor(1.0));
        assert!(entry.poll_due(Instant::now()));
    }

    #[tokio::test]
    async fn test_poll_due_advances_from_dispatch_time() {
        let start = Instant::now();
        let mut entry = ScheduleEntry::due_at(descriptor(1.0), start);

        assert!(entry.poll_due(start));
        assert_eq!(entry.next_due(), Some(start + Duration::from_secs(1)));

        assert!(!entry.poll_due(start + Duration::from_millis(500)));
        assert_eq!(entry.next_due(), Some(start + Duration::from_secs(1)));

        // a late scan re-anchors the cadence at the scan time
        let late = start + Duration::from_millis(1_050);
        assert!(entry.poll_due(late));
        assert_eq!(entry.next_due(), Some(late + Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_dispatch_gaps_converge_to_interval() {
        let interval = Duration::from_millis(1_000);
        let granularity = Duration::from_millis(100);
        let start = Instant::now();
        let mut entry = ScheduleEntry::due_at(descriptor(1.0), start);

        let mut dispatches = Vec::new();
        let mut now = start;
        while now < start + Duration::from_secs(10) {
            if entry.poll_due(now) {
                dispatches.push(now);
            }
            now += granularity;
        }

        for pair in dispatches.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= interval && gap <= interval + granularity, "gap {:?}", gap);
        }
        assert_eq!(dispatches.len(), 10);
    }

    #[tokio::test]
    async fn test_in_flight_guard() {
        let entry = ScheduleEntry::new(descriptor(1.0));
        assert!(!entry.is_in_flight());
        let guard = entry.begin_flight();
        assert!(entry.is_in_flight());
        drop(guard);
        assert!(!entry.is_in_flight());
    }
}
