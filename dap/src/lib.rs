//! Sync-or-init orchestration of DAP table replication.
//!
//! For every requested table a [`workers::table::TableWorker`] runs an
//! incremental synchronization and falls back to a full initialization when the
//! table was never loaded. The [`workers::pool::TableWorkerPool`] runs one worker
//! per table concurrently and collects a [`types::RunReport`] in request order,
//! whatever happens to individual tables.

pub mod concurrency;
pub mod error;
mod macros;
pub mod replicator;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
