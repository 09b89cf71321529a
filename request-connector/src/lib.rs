//! Request Connector - Polls HTTP endpoints and forwards device records.
//!
//! Each configured endpoint is requested on its own period. Responses are
//! handed to a bounded queue and converted into device records by a single
//! forward stage, which sends them to the gateway sink.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       Scheduler (one loop)               │
//! │  - Scan endpoints every scan interval    │
//! │  - Spawn a dispatch per due endpoint     │
//! └─────────────────────────────────────────┘
//!          ↓ (fire and forget)
//! ┌─────────────────────────────────────────┐
//! │       Dispatch (one task per request)    │
//! │  - HTTP request with endpoint timeout    │
//! │  - 2xx body → handoff                    │
//! └─────────────────────────────────────────┘
//!          ↓ try_push (dropped when full)
//!     Hand-off queue (bounded, FIFO)
//!          ↓
//! ┌─────────────────────────────────────────┐
//! │       Forward stage (one loop)           │
//! │  - Convert payload to DeviceRecord       │
//! │  - Send to sink                          │
//! └─────────────────────────────────────────┘
//!          ↓
//!     Gateway sink (HTTP, stdout)
//! ```
//!
//! # Core Types
//!
//! - [`Connector`] - Control surface (open, close, is_connected)
//! - [`RequestConnector`] - The polling connector
//! - [`ConverterRegistry`] - Named converter factories
//! - [`converters::Converter`] - Payload to record transformation
//! - [`Payload`] - Response body, parsed JSON or raw bytes

mod connector;
mod types;
pub mod config;
pub mod converters;
pub mod endpoint;
pub mod queue;
pub mod registry;
pub mod request;
pub mod runners;

// Re-export public types
pub use connector::Connector;
pub use registry::{ConverterFactory, ConverterRegistry};
pub use request::RequestConnector;
pub use runners::dispatcher::DispatchOutcome;
pub use types::{EndpointStatus, Handoff, Payload};

// Re-export record types from the gateway crate for convenience
pub use gateway::{DeviceRecord, GatewayEvent};
