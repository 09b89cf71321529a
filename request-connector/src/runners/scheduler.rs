//! Scheduler loop - dispatches due endpoints.
//!
//! One long-lived task scans every schedule entry, advances the due ones
//! and spawns a dispatcher task per due entry without waiting for it. The
//! loop sleeps for the scan interval whenever a scan dispatched nothing.

use super::dispatcher::dispatch;
use crate::endpoint::ScheduleEntry;
use crate::queue::HandoffQueue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

/// Polling scheduler for all endpoints of one connector.
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    queue: HandoffQueue,
    running: Arc<AtomicBool>,
    scan_interval: Duration,
    skip_while_in_flight: bool,
}

impl Scheduler {
    pub fn new(
        entries: Vec<ScheduleEntry>,
        queue: HandoffQueue,
        running: Arc<AtomicBool>,
        scan_interval: Duration,
        skip_while_in_flight: bool,
    ) -> Self {
        Self {
            entries,
            queue,
            running,
            scan_interval,
            skip_while_in_flight,
        }
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Runs one scan at `now`. Returns the number of dispatches spawned.
    pub fn scan(&mut self, now: Instant) -> usize {
        let mut dispatched = 0;
        for entry in &mut self.entries {
            if !entry.poll_due(now) {
                continue;
            }

            if self.skip_while_in_flight && entry.is_in_flight() {
                debug!(
                    url = %entry.descriptor.url,
                    "Previous request still in flight, skipping this poll"
                );
                continue;
            }

            let guard = entry.begin_flight();
            let descriptor = Arc::clone(&entry.descriptor);
            let queue = self.queue.clone();
            tokio::spawn(async move {
                let _guard = guard;
                dispatch(&descriptor, &queue).await;
            });
            dispatched += 1;
        }
        dispatched
    }

    /// Starts the scheduler loop (non-blocking).
    ///
    /// The loop exits on the first iteration after `running` is cleared.
    /// Dispatches already spawned run to completion.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        info!(
            endpoints = self.entries.len(),
            scan_interval_ms = self.scan_interval.as_millis() as u64,
            "Starting request scheduler"
        );

        while self.running.load(Ordering::Acquire) {
            if self.scan(Instant::now()) == 0 {
                tokio::time::sleep(self.scan_interval).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        info!("Request scheduler stopped");
    }
}
