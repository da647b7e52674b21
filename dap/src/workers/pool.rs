use dap_config::shared::ReplicationConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{Instrument, debug, error, info, warn};

use crate::concurrency::shutdown::{ShutdownRx, wait_for_shutdown};
use crate::dap_error;
use crate::error::{DapError, ErrorKind};
use crate::replicator::base::Replicator;
use crate::types::{RunReport, TableName, TableResult};
use crate::workers::table::TableWorker;

/// Runs one [`TableWorker`] per table concurrently and collects their results.
///
/// Workers never affect each other: a failing, panicking or cancelled table is
/// reported as failed while every other table keeps running to completion.
#[derive(Debug, Clone)]
pub struct TableWorkerPool<R> {
    replicator: R,
    config: Arc<ReplicationConfig>,
    shutdown_rx: ShutdownRx,
}

impl<R> TableWorkerPool<R>
where
    R: Replicator + Clone + Send + Sync + 'static,
{
    pub fn new(replicator: R, config: Arc<ReplicationConfig>, shutdown_rx: ShutdownRx) -> Self {
        Self {
            replicator,
            config,
            shutdown_rx,
        }
    }

    /// Replicates `tables` and returns one result per table, in the order of `tables`.
    ///
    /// At most `max_concurrent_tables` tables are replicated at the same time
    /// when configured. A shutdown request or an elapsed `run_timeout_ms`
    /// cancels the tables that did not finish, which are reported as failed.
    pub async fn run(&self, tables: Vec<TableName>) -> RunReport {
        if tables.is_empty() {
            info!("no tables requested, nothing to replicate");

            return RunReport::default();
        }

        let started_at = Instant::now();
        let deadline = self
            .config
            .run_timeout_ms
            .map(|timeout_ms| started_at + Duration::from_millis(timeout_ms));
        let run_permits = Arc::new(Semaphore::new(self.max_concurrent_tables()));

        info!(
            mode = %self.config.mode,
            namespace = self.config.namespace,
            tables = tables.len(),
            max_concurrent_tables = self.config.max_concurrent_tables,
            run_timeout_ms = self.config.run_timeout_ms,
            "starting replication run"
        );

        let handles = tables
            .into_iter()
            .map(|table_name| {
                let worker = TableWorker::new(
                    table_name.clone(),
                    self.config.mode,
                    self.replicator.clone(),
                );
                let span = tracing::info_span!("table_worker", table_name = %table_name);
                let handle = tokio::spawn(
                    run_worker(worker, run_permits.clone(), self.shutdown_rx.clone(), deadline)
                        .instrument(span),
                );

                (table_name, handle)
            })
            .collect::<Vec<_>>();

        // Joining in spawn order keeps the report in request order.
        let mut results = Vec::with_capacity(handles.len());
        for (table_name, handle) in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(err) => {
                    let err = DapError::from(err);
                    error!(%table_name, error = %err, "table worker terminated abnormally");

                    TableResult::failed(table_name, err.to_string())
                }
            };

            results.push(result);
        }

        let report = RunReport::new(results);
        let summary = report.summary();
        info!(
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            completed = summary.completed,
            failed = summary.failed,
            no_table = summary.no_table,
            "replication run finished"
        );

        report
    }

    fn max_concurrent_tables(&self) -> usize {
        self.config
            .max_concurrent_tables
            .map(usize::from)
            .unwrap_or(Semaphore::MAX_PERMITS)
    }
}

async fn run_worker<R>(
    worker: TableWorker<R>,
    run_permits: Arc<Semaphore>,
    shutdown_rx: ShutdownRx,
    deadline: Option<Instant>,
) -> TableResult
where
    R: Replicator,
{
    let table_name = worker.table_name().clone();

    let cancelled = cancellation(shutdown_rx, deadline);
    tokio::pin!(cancelled);

    let _permit = tokio::select! {
        biased;

        err = &mut cancelled => {
            warn!(%table_name, reason = %err, "table cancelled while waiting for a run permit");

            return TableResult::failed(table_name, err.to_string());
        }

        permit = run_permits.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => {
                let err = dap_error!(ErrorKind::TableWorkerCancelled, "Run permits were closed");
                error!(%table_name, "run permits were closed before the table started");

                return TableResult::failed(table_name, err.to_string());
            }
        }
    };

    debug!(%table_name, "acquired run permit");

    // Dropping the worker future on cancellation drops the replicator call, which releases its session.
    tokio::select! {
        biased;

        err = &mut cancelled => {
            warn!(%table_name, reason = %err, "table cancelled while replicating");

            TableResult::failed(table_name, err.to_string())
        }

        result = worker.resolve() => result,
    }
}

/// Resolves with the reason once the run is cancelled by shutdown or by its deadline.
async fn cancellation(mut shutdown_rx: ShutdownRx, deadline: Option<Instant>) -> DapError {
    let deadline_reached = async move {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        _ = wait_for_shutdown(&mut shutdown_rx) => dap_error!(
            ErrorKind::TableWorkerCancelled,
            "Table replication cancelled",
            "shutdown requested"
        ),
        _ = deadline_reached => dap_error!(
            ErrorKind::TableWorkerCancelled,
            "Table replication cancelled",
            "run deadline exceeded"
        ),
    }
}
