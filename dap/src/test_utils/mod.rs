//! Test helpers for exercising table workers without a replication client.
pub mod replicator;
