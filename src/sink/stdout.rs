use super::Sink;
use crate::event::{DeviceRecord, GatewayEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

/// Prints every record as one JSON line on stdout.
pub struct StdoutSink;

#[async_trait]
impl Sink for StdoutSink {
    async fn send(&self, connector_name: &str, record: DeviceRecord) -> Result<()> {
        let event = GatewayEvent::new(connector_name, record);
        let mut line = serde_json::to_vec(&event).context("Failed to serialize record")?;
        line.push(b'\n');

        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(&line)
            .await
            .context("Failed to write record to stdout")?;
        stdout.flush().await?;
        Ok(())
    }
}
