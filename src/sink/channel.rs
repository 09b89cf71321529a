use super::Sink;
use crate::event::DeviceRecord;
use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Hands records to an in-process receiver.
///
/// Used when the connector is embedded in a larger service that owns
/// storage itself.
#[derive(Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(String, DeviceRecord)>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that observes it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(String, DeviceRecord)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Sink for ChannelSink {
    async fn send(&self, connector_name: &str, record: DeviceRecord) -> Result<()> {
        self.tx
            .send((connector_name.to_string(), record))
            .map_err(|_| anyhow::anyhow!("Record receiver dropped"))
    }
}
