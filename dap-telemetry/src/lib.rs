//! Telemetry for the DAP replicator.
//!
//! Sets up `tracing` with pretty terminal output in development and JSON
//! rolling file output in production-like environments.

mod subscriber;

pub use subscriber::*;
