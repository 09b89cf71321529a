// Normalized device records
pub mod event;

// Downstream sinks
pub mod sink;

pub use event::{DeviceRecord, GatewayEvent};
pub use sink::{build_sink, Sink, SinkConfig};
