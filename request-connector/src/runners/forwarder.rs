//! Conversion/forward stage - the single consumer of the hand-off queue.
//!
//! Records are converted and forwarded one at a time in queue order. A
//! converter or sink failure drops that one record and the stage moves on.

use crate::queue::HandoffReceiver;
use crate::types::Handoff;
use gateway::Sink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Pause before re-checking an empty queue.
pub const FORWARD_IDLE: Duration = Duration::from_millis(10);

/// Drains the hand-off queue into a sink.
pub struct Forwarder {
    connector_name: String,
    rx: HandoffReceiver,
    sink: Arc<dyn Sink>,
    running: Arc<AtomicBool>,
}

impl Forwarder {
    pub fn new(
        connector_name: String,
        rx: HandoffReceiver,
        sink: Arc<dyn Sink>,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            connector_name,
            rx,
            sink,
            running,
        }
    }

    /// Starts the forward loop (non-blocking).
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(connector = %self.connector_name, "Starting forward stage");

        while self.running.load(Ordering::Acquire) {
            if !self.process_next().await {
                tokio::time::sleep(FORWARD_IDLE).await;
            }
        }

        info!(connector = %self.connector_name, "Forward stage stopped");
    }

    /// Handles at most one queued handoff. Returns false if the queue was
    /// empty.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.try_pop() {
            Some(handoff) => {
                forward(&self.connector_name, handoff, self.sink.as_ref()).await;
                true
            }
            None => false,
        }
    }
}

/// Converts one handoff and sends the record. Returns true if the sink
/// accepted it.
pub async fn forward(connector_name: &str, handoff: Handoff, sink: &dyn Sink) -> bool {
    let record = match handoff.converter.convert(&handoff.url, &handoff.payload) {
        Ok(record) => record,
        Err(e) => {
            error!(
                url = %handoff.url,
                error = %format!("{:#}", e),
                "Conversion failed, dropping record"
            );
            return false;
        }
    };

    if let Err(e) = record.validate() {
        warn!(url = %handoff.url, error = %e, "Converted record is invalid, dropping");
        return false;
    }

    debug!(url = %handoff.url, record = ?record, "Converted record");

    match sink.send(connector_name, record).await {
        Ok(()) => true,
        Err(e) => {
            error!(
                connector = %connector_name,
                url = %handoff.url,
                error = %format!("{:#}", e),
                "Failed to forward record"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converters::raw::RawConverter;
    use crate::converters::Converter;
    use crate::queue::handoff_queue;
    use crate::types::Payload;
    use anyhow::Result;
    use gateway::sink::ChannelSink;
    use gateway::DeviceRecord;
    use serde_json::json;

    struct FailingConverter;

    impl Converter for FailingConverter {
        fn convert(&self, source: &str, _: &Payload) -> Result<DeviceRecord> {
            anyhow::bail!("cannot convert {}", source)
        }
    }

    struct BlankNameConverter;

    impl Converter for BlankNameConverter {
        fn convert(&self, _: &str, _: &Payload) -> Result<DeviceRecord> {
            Ok(DeviceRecord::new("", "default"))
        }
    }

    fn handoff(url: &str, converter: Arc<dyn Converter>) -> Handoff {
        Handoff {
            url: url.to_string(),
            converter,
            payload: Payload::Json(json!({"url": url})),
        }
    }

    #[tokio::test]
    async fn test_forwards_in_fifo_order() {
        let (queue, rx) = handoff_queue(10);
        let (sink, mut records) = ChannelSink::new();
        let mut forwarder = Forwarder::new(
            "conn".to_string(),
            rx,
            Arc::new(sink),
            Arc::new(AtomicBool::new(true)),
        );

        let converter: Arc<dyn Converter> = Arc::new(RawConverter::new("dev", "t"));
        for url in ["u1", "u2", "u3"] {
            queue.try_push(handoff(url, Arc::clone(&converter))).unwrap();
        }

        while forwarder.process_next().await {}

        for url in ["u1", "u2", "u3"] {
            let (name, record) = records.recv().await.unwrap();
            assert_eq!(name, "conn");
            assert_eq!(record.telemetry[0]["raw"], json!({"url": url}));
        }
    }

    #[tokio::test]
    async fn test_conversion_failure_drops_only_that_record() {
        let (queue, rx) = handoff_queue(10);
        let (sink, mut records) = ChannelSink::new();
        let mut forwarder = Forwarder::new(
            "conn".to_string(),
            rx,
            Arc::new(sink),
            Arc::new(AtomicBool::new(true)),
        );

        queue.try_push(handoff("bad", Arc::new(FailingConverter))).unwrap();
        queue.try_push(handoff("blank", Arc::new(BlankNameConverter))).unwrap();
        queue
            .try_push(handoff("good", Arc::new(RawConverter::new("dev", "t"))))
            .unwrap();

        assert!(forwarder.process_next().await);
        assert!(forwarder.process_next().await);
        assert!(forwarder.process_next().await);
        assert!(!forwarder.process_next().await);

        let (_, record) = records.recv().await.unwrap();
        assert_eq!(record.device_name, "dev");
        assert!(records.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_sink_failure_is_not_fatal() {
        let (sink, records) = ChannelSink::new();
        drop(records);

        let delivered = forward(
            "conn",
            handoff("u", Arc::new(RawConverter::new("dev", "t"))),
            &sink,
        )
        .await;
        assert!(!delivered);
    }

    #[tokio::test]
    async fn test_loop_drains_queue_and_stops() {
        let (queue, rx) = handoff_queue(10);
        let (sink, mut records) = ChannelSink::new();
        let running = Arc::new(AtomicBool::new(true));
        let handle = Forwarder::new("conn".to_string(), rx, Arc::new(sink), Arc::clone(&running))
            .start();

        queue
            .try_push(handoff("u", Arc::new(RawConverter::new("dev", "t"))))
            .unwrap();

        let received = tokio::time::timeout(Duration::from_secs(2), records.recv())
            .await
            .expect("record not forwarded");
        assert!(received.is_some());

        running.store(false, Ordering::Release);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("forwarder did not stop")
            .unwrap();
    }
}
