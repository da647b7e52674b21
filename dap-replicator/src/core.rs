use dap::concurrency::shutdown::{ShutdownRx, ShutdownTx, create_shutdown_channel};
use dap::error::DapResult;
use dap::replicator::base::Replicator;
use dap::replicator::command::CommandReplicator;
use dap::types::{RunReport, TableName};
use dap::workers::pool::TableWorkerPool;
use dap_config::shared::{
    ApiConfig, CommandConfig, ReplicationConfig, ReplicationMode, ReplicatorConfig,
};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Starts the replicator with the provided configuration and returns the run report.
///
/// Builds the command-line replicator, listens for shutdown signals while the
/// run is in progress and replicates the selected tables.
pub async fn start_replicator_with_config(
    replicator_config: ReplicatorConfig,
) -> anyhow::Result<RunReport> {
    info!("starting replicator service");

    log_config(&replicator_config);

    let replicator = CommandReplicator::new(&replicator_config);

    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
    let shutdown_handle = spawn_shutdown_listener(shutdown_tx)?;

    let result = run_replication(replicator, replicator_config.replication, shutdown_rx).await;

    // The listener is still waiting for a signal when the run finished on its own.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    let report = result?;

    info!(summary = %report.summary(), "replicator service completed");

    Ok(report)
}

fn log_config(config: &ReplicatorConfig) {
    log_api_config(&config.api);
    log_replication_config(&config.replication);
    log_command_config(&config.command);
}

fn log_api_config(config: &ApiConfig) {
    debug!(
        base_url = config.base_url,
        client_id = config.client_id,
        "api config"
    );
}

fn log_replication_config(config: &ReplicationConfig) {
    debug!(
        namespace = config.namespace,
        mode = %config.mode,
        tables = ?config.tables,
        skip_tables = ?config.skip_tables,
        max_concurrent_tables = config.max_concurrent_tables,
        run_timeout_ms = config.run_timeout_ms,
        "replication config"
    );
}

fn log_command_config(config: &CommandConfig) {
    debug!(
        program = config.program,
        working_dir = ?config.working_dir,
        "command config"
    );
}

/// Requests shutdown on SIGTERM or SIGINT.
///
/// Tables still running when the signal arrives are reported as failed.
fn spawn_shutdown_listener(shutdown_tx: ShutdownTx) -> anyhow::Result<JoinHandle<()>> {
    // SIGTERM is sent by the scheduler before the process is killed.
    let mut sigterm = signal(SignalKind::terminate())?;

    let handle = tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("SIGINT (Ctrl+C) received, cancelling replication");
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, cancelling replication");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!("failed to send shutdown signal: {:?}", err);
        }
    });

    Ok(handle)
}

/// Selects the tables of the run and replicates them.
async fn run_replication<R>(
    replicator: R,
    replication_config: ReplicationConfig,
    shutdown_rx: ShutdownRx,
) -> DapResult<RunReport>
where
    R: Replicator + Clone + Send + Sync + 'static,
{
    let tables = select_tables(&replicator, &replication_config).await?;

    let pool = TableWorkerPool::new(replicator, Arc::new(replication_config), shutdown_rx);

    Ok(pool.run(tables).await)
}

/// Returns the tables to replicate, in report order.
///
/// In [`ReplicationMode::Init`] an empty `tables` list falls back to every
/// table the source lists, and `skip_tables` are removed from the result.
async fn select_tables<R>(replicator: &R, config: &ReplicationConfig) -> DapResult<Vec<TableName>>
where
    R: Replicator,
{
    let configured = config
        .tables
        .iter()
        .map(|table| TableName::from(table.as_str()))
        .collect::<Vec<_>>();

    if config.mode == ReplicationMode::SyncOrInit {
        return Ok(configured);
    }

    let candidates = if configured.is_empty() {
        let listed = replicator.list_tables().await?;
        info!(
            namespace = config.namespace,
            tables = listed.len(),
            "no tables configured, initializing every listed table"
        );

        listed
    } else {
        configured
    };

    let skipped = config
        .skip_tables
        .iter()
        .map(String::as_str)
        .collect::<HashSet<_>>();

    let mut seen = HashSet::new();
    Ok(candidates
        .into_iter()
        .filter(|table| !skipped.contains(table.as_str()))
        .filter(|table| seen.insert(table.clone()))
        .collect())
}
