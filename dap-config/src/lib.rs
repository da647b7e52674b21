//! Configuration management for the DAP replicator.
//!
//! Provides environment detection, configuration loading from YAML files,
//! secret handling, and the shared configuration types consumed by the
//! replication core and the replicator binary.

mod environment;
mod load;
mod secret;
pub mod shared;

pub use environment::*;
pub use load::*;
pub use secret::*;
