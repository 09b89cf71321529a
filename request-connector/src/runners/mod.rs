pub mod dispatcher;
pub mod forwarder;
pub mod scheduler;
