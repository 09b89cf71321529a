use super::Sink;
use crate::event::{DeviceRecord, GatewayEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Forwards records to a gateway HTTP API.
///
/// Each record is wrapped in a [`GatewayEvent`] and POSTed as JSON to
/// `{base_url}/api/records`.
pub struct HttpSink {
    /// Gateway API base URL (e.g., "http://localhost:3000")
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpSink {
    pub fn new(base_url: String) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build sink HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client,
        })
    }

    fn records_url(&self) -> String {
        format!("{}/api/records", self.base_url)
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&self, connector_name: &str, record: DeviceRecord) -> Result<()> {
        let event = GatewayEvent::new(connector_name, record);
        let url = self.records_url();

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&event)
            .send()
            .await
            .context("Failed to send HTTP request to gateway API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());

            anyhow::bail!("Gateway API returned error status {}: {}", status, body);
        }

        debug!(
            connector = %connector_name,
            event_id = %event.event_id,
            device = %event.record.device_name,
            "Forwarded record to gateway API"
        );

        Ok(())
    }
}
