//! Downstream sinks for normalized device records.
//!
//! A connector hands every converted record to exactly one sink call. The
//! call is fire-and-forget from the connector's point of view: a sink error
//! is logged by the caller and the record is not retried.

mod channel;
mod http;
mod stdout;

pub use channel::ChannelSink;
pub use http::HttpSink;
pub use stdout::StdoutSink;

use crate::event::DeviceRecord;
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

/// Receiver of converted records.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Delivers one record produced by the named connector.
    async fn send(&self, connector_name: &str, record: DeviceRecord) -> Result<()>;
}

/// Sink selection as it appears in configuration files.
///
/// ```toml
/// [sink]
/// type = "http"
/// url = "http://localhost:3000"
/// ```
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// POST every record to `{url}/api/records`
    Http { url: String },
    /// Print every record as a JSON line
    #[default]
    Stdout,
}

/// Builds the sink described by `config`.
pub fn build_sink(config: &SinkConfig) -> Result<Arc<dyn Sink>> {
    let sink: Arc<dyn Sink> = match config {
        SinkConfig::Http { url } => Arc::new(HttpSink::new(url.clone())?),
        SinkConfig::Stdout => Arc::new(StdoutSink),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct Wrapper {
        #[serde(default)]
        sink: SinkConfig,
    }

    #[test]
    fn test_sink_config_http() {
        let parsed: Wrapper = serde_json::from_str(
            r#"{"sink": {"type": "http", "url": "http://localhost:3000"}}"#,
        )
        .unwrap();
        assert_eq!(
            parsed.sink,
            SinkConfig::Http {
                url: "http://localhost:3000".to_string()
            }
        );
    }

    #[test]
    fn test_sink_config_defaults_to_stdout() {
        let parsed: Wrapper = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.sink, SinkConfig::Stdout);
    }

    #[test]
    fn test_build_sink() {
        assert!(build_sink(&SinkConfig::Stdout).is_ok());
        assert!(build_sink(&SinkConfig::Http {
            url: "http://localhost:3000".to_string()
        })
        .is_ok());
    }
}
