//! Request connector - Orchestrates the polling pipeline.
//!
//! Builds the endpoint schedule, the hand-off queue and both long-lived
//! loops (scheduler and forward stage), and exposes the connector control
//! surface.

use crate::config::ConnectorConfig;
use crate::endpoint::{build_schedule, EndpointDescriptor};
use crate::queue::{handoff_queue, HandoffQueue, HandoffReceiver};
use crate::registry::ConverterRegistry;
use crate::runners::forwarder::Forwarder;
use crate::runners::scheduler::Scheduler;
use crate::types::EndpointStatus;
use crate::Connector;
use anyhow::{Context, Result};
use gateway::Sink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Polls configured HTTP endpoints and forwards converted records.
///
/// # Responsibilities
/// - Build the endpoint schedule once, at construction
/// - Run the scheduler loop and the forward stage
/// - Track per-endpoint status
/// - Stop both loops on `close()`
pub struct RequestConnector {
    name: String,
    sink: Arc<dyn Sink>,
    /// Cleared by `close()`; both loops check it every iteration
    running: Arc<AtomicBool>,
    endpoints: Vec<Arc<EndpointDescriptor>>,
    queue: HandoffQueue,
    /// Loops built at construction, taken by `open()`
    pending: Option<(Scheduler, HandoffReceiver)>,
    handles: Vec<JoinHandle<()>>,
}

impl RequestConnector {
    /// Creates a connector. Endpoints whose converter cannot be resolved
    /// are left out of the schedule.
    ///
    /// # Arguments
    /// * `config` - Connector configuration
    /// * `registry` - Converters available to `type = "custom"` endpoints
    /// * `sink` - Destination for converted records
    pub fn new(config: ConnectorConfig, registry: &ConverterRegistry, sink: Arc<dyn Sink>) -> Self {
        let name = config.resolve_name();
        let entries = build_schedule(&config, registry);
        let endpoints = entries.iter().map(|e| Arc::clone(&e.descriptor)).collect();

        let (queue, rx) = handoff_queue(config.queue_capacity);
        let running = Arc::new(AtomicBool::new(false));
        let scheduler = Scheduler::new(
            entries,
            queue.clone(),
            Arc::clone(&running),
            config.scan_interval(),
            config.skip_while_in_flight,
        );

        info!(
            connector = %name,
            host = %config.normalized_host(),
            queue_capacity = queue.capacity(),
            "Request connector created"
        );

        Self {
            name,
            sink,
            running,
            endpoints,
            queue,
            pending: Some((scheduler, rx)),
            handles: Vec::new(),
        }
    }

    /// Resolved URLs of the active endpoints, in configuration order.
    pub fn endpoint_urls(&self) -> Vec<&str> {
        self.endpoints.iter().map(|e| e.url.as_str()).collect()
    }

    /// Number of handoffs waiting for the forward stage.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Returns a status snapshot for every active endpoint.
    pub async fn status(&self) -> Vec<EndpointStatus> {
        let mut statuses = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            statuses.push(endpoint.status().await);
        }
        statuses
    }

    /// Stops both loops and waits for them to exit.
    pub async fn shutdown(&mut self) {
        self.close();
        if !self.queue.is_empty() {
            warn!(
                connector = %self.name,
                pending = self.queue.len(),
                "Discarding responses still waiting for conversion"
            );
        }
        for handle in self.handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(connector = %self.name, error = %e, "Connector task ended abnormally");
            }
        }
        info!(connector = %self.name, "Request connector stopped");
    }
}

impl Connector for RequestConnector {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&mut self) -> Result<()> {
        let (scheduler, rx) = self
            .pending
            .take()
            .context("Request connector was already opened")?;

        self.running.store(true, Ordering::Release);
        self.handles.push(scheduler.start());
        self.handles.push(
            Forwarder::new(
                self.name.clone(),
                rx,
                Arc::clone(&self.sink),
                Arc::clone(&self.running),
            )
            .start(),
        );

        info!(
            connector = %self.name,
            endpoints = self.endpoints.len(),
            "Request connector opened"
        );
        Ok(())
    }

    fn close(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!(connector = %self.name, "Stopping request connector");
        }
    }

    fn is_connected(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RequestConnector {
    fn drop(&mut self) {
        // Loops own clones of the flag; clearing it lets them exit.
        self.running.store(false, Ordering::Release);
    }
}
