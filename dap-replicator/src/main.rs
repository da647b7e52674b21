use crate::config::{Args, load_replicator_config};
use crate::core::start_replicator_with_config;
use clap::Parser;
use dap::types::RunReport;
use dap_config::Environment;
use dap_config::shared::ReplicatorConfig;
use dap_telemetry::init_tracing_with_namespace;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load replicator config
    let replicator_config = load_replicator_config(&args)?;

    // Tag logs with the namespace being replicated
    let namespace = replicator_config.replication.namespace.clone();
    let _log_flusher = init_tracing_with_namespace(env!("CARGO_BIN_NAME"), Some(namespace))?;

    // Initialize Sentry before the async runtime starts
    let _sentry_guard = init_sentry(&replicator_config)?;

    let report = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(replicator_config))?;

    println!("{}", serde_json::to_string(&report)?);

    Ok(())
}

async fn async_main(replicator_config: ReplicatorConfig) -> anyhow::Result<RunReport> {
    match start_replicator_with_config(replicator_config).await {
        Ok(report) => Ok(report),
        Err(err) => {
            sentry::integrations::anyhow::capture_anyhow(&err);
            error!("an error occurred in the replicator: {err:#}");

            Err(err)
        }
    }
}

/// Initializes Sentry when a DSN is configured.
///
/// Errors and panics are tagged with the "replicator" service identifier.
fn init_sentry(config: &ReplicatorConfig) -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = &config.sentry else {
        info!("sentry not configured for replicator, skipping initialization");

        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let environment = Environment::load()?;
    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(sentry_config.dsn.parse()?),
        environment: Some(environment.to_string().into()),
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        ..Default::default()
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("service", "replicator");
        scope.set_tag("namespace", &config.replication.namespace);
    });

    Ok(Some(guard))
}
