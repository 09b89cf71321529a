//! Request dispatcher - one HTTP call for one endpoint.
//!
//! Every failure is terminal to the single request: it is logged, counted
//! in the endpoint status and reported as a [`DispatchOutcome`]. Nothing is
//! propagated to the scheduler and nothing is retried before the next
//! regular poll.

use crate::endpoint::EndpointDescriptor;
use crate::queue::HandoffQueue;
use crate::types::{Handoff, Payload};
use chrono::Utc;
use tracing::{debug, error};

/// Result of a single dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Response accepted into the hand-off queue
    Enqueued,
    /// Successful response dropped because the queue was full
    QueueFull,
    /// Non-2xx response
    HttpStatus(u16),
    /// Request or body read timed out
    Timeout,
    /// Connection could not be established
    Connect,
    /// Any other request failure
    Failed,
}

enum FetchError {
    Status(u16),
    Transport(reqwest::Error),
}

/// Performs one request for `endpoint` and enqueues the response.
pub async fn dispatch(endpoint: &EndpointDescriptor, queue: &HandoffQueue) -> DispatchOutcome {
    let url = endpoint.url.as_str();
    debug!(url = %url, method = %endpoint.method, "Request will be sent");

    let (outcome, error_text) = match fetch(endpoint, queue).await {
        Ok(Some(payload)) => {
            let handoff = Handoff {
                url: endpoint.url.clone(),
                converter: endpoint.converter.clone(),
                payload,
            };
            match queue.try_push(handoff) {
                Ok(()) => (DispatchOutcome::Enqueued, None),
                Err(e) => {
                    debug!(url = %url, reason = %e, "Response dropped");
                    (DispatchOutcome::QueueFull, None)
                }
            }
        }
        Ok(None) => {
            debug!(url = %url, "Hand-off queue full, response dropped");
            (DispatchOutcome::QueueFull, None)
        }
        Err(FetchError::Status(code)) => {
            error!(url = %url, status = code, "Request finished with error status");
            (
                DispatchOutcome::HttpStatus(code),
                Some(format!("HTTP status {}", code)),
            )
        }
        Err(FetchError::Transport(e)) => {
            let outcome = classify(&e);
            match outcome {
                DispatchOutcome::Timeout => error!(url = %url, "Timeout error on request"),
                DispatchOutcome::Connect => {
                    error!(url = %url, "Cannot connect, connection error");
                    debug!(url = %url, error = %e, "Connection error details");
                }
                _ => error!(url = %url, error = %e, "Request failed"),
            }
            (outcome, Some(e.to_string()))
        }
    };

    record(endpoint, outcome, error_text).await;
    outcome
}

/// Sends the request and reads the body of a 2xx response.
///
/// Returns `Ok(None)` without reading the body when the queue is already
/// full.
async fn fetch(
    endpoint: &EndpointDescriptor,
    queue: &HandoffQueue,
) -> Result<Option<Payload>, FetchError> {
    let response = endpoint
        .http_client
        .request(endpoint.method.clone(), &endpoint.url)
        .headers(endpoint.headers.clone())
        .send()
        .await
        .map_err(FetchError::Transport)?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status(status.as_u16()));
    }

    if queue.is_full() {
        return Ok(None);
    }

    let body = response.bytes().await.map_err(FetchError::Transport)?;
    Ok(Some(Payload::from_body(&body)))
}

fn classify(e: &reqwest::Error) -> DispatchOutcome {
    if e.is_timeout() {
        DispatchOutcome::Timeout
    } else if e.is_connect() {
        DispatchOutcome::Connect
    } else {
        DispatchOutcome::Failed
    }
}

async fn record(endpoint: &EndpointDescriptor, outcome: DispatchOutcome, error_text: Option<String>) {
    let mut status = endpoint.status.lock().await;
    status.dispatch_count += 1;
    match outcome {
        DispatchOutcome::Enqueued => {
            status.success_count += 1;
            status.last_success = Some(Utc::now());
            status.last_error = None;
        }
        DispatchOutcome::QueueFull => status.dropped_count += 1,
        _ => {
            status.error_count += 1;
            status.last_error = error_text;
        }
    }
}
