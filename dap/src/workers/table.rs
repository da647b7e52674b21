use dap_config::shared::ReplicationMode;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

use crate::dap_error;
use crate::error::{DapResult, ErrorKind};
use crate::replicator::base::Replicator;
use crate::types::{InitOutcome, SyncOutcome, TableName, TableResult};

/// Replicates a single table and turns whatever happens into a [`TableResult`].
///
/// In [`ReplicationMode::SyncOrInit`] the worker synchronizes the table once
/// and, only if the table was never initialized, initializes it once. In
/// [`ReplicationMode::Init`] it initializes the table once. Neither call is
/// retried.
#[derive(Debug)]
pub struct TableWorker<R> {
    table_name: TableName,
    mode: ReplicationMode,
    replicator: R,
}

impl<R> TableWorker<R> {
    pub fn new(table_name: TableName, mode: ReplicationMode, replicator: R) -> Self {
        Self {
            table_name,
            mode,
            replicator,
        }
    }

    pub fn table_name(&self) -> &TableName {
        &self.table_name
    }
}

impl<R> TableWorker<R>
where
    R: Replicator,
{
    /// Runs the replication of the table.
    ///
    /// Errors and panics of the replicator are converted into a failed result,
    /// nothing escapes this method.
    pub async fn resolve(self) -> TableResult {
        match self.mode {
            ReplicationMode::SyncOrInit => self.sync_or_init().await,
            ReplicationMode::Init => self.init().await,
        }
    }

    async fn sync_or_init(self) -> TableResult {
        info!(table_name = %self.table_name, "synchronizing table");

        let result = catch_panic(self.replicator.synchronize(&self.table_name)).await;
        match SyncOutcome::classify(result) {
            SyncOutcome::Completed => {
                info!(table_name = %self.table_name, "table synchronized");

                TableResult::completed(self.table_name)
            }
            SyncOutcome::NoTable => {
                warn!(table_name = %self.table_name, "table does not exist at the source");

                TableResult::no_table(self.table_name)
            }
            SyncOutcome::Failed(detail) => {
                error!(table_name = %self.table_name, detail, "table synchronization failed");

                TableResult::failed(self.table_name, detail)
            }
            SyncOutcome::InitNeeded => {
                info!(
                    table_name = %self.table_name,
                    "table is not initialized, initializing it instead"
                );

                self.init().await
            }
        }
    }

    async fn init(self) -> TableResult {
        info!(table_name = %self.table_name, "initializing table");

        let result = catch_panic(self.replicator.initialize(&self.table_name)).await;
        match InitOutcome::classify(result) {
            InitOutcome::Completed => {
                info!(table_name = %self.table_name, "table initialized");

                TableResult::completed(self.table_name)
            }
            InitOutcome::Failed(detail) => {
                error!(table_name = %self.table_name, detail, "table initialization failed");

                TableResult::failed(self.table_name, detail)
            }
        }
    }
}

/// Converts a panic raised while polling `future` into a [`ErrorKind::TableWorkerPanic`] error.
async fn catch_panic<F>(future: F) -> DapResult<()>
where
    F: Future<Output = DapResult<()>>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(dap_error!(
            ErrorKind::TableWorkerPanic,
            "Replicator panicked",
            panic_message(payload.as_ref())
        )),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}
