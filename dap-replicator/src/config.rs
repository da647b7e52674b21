use clap::{Parser, ValueEnum};
use dap_config::load_config;
use dap_config::shared::{ReplicationMode, ReplicatorConfig};

/// Command-line arguments, each one overriding the matching configuration value.
#[derive(Debug, Parser)]
#[command(name = "dap-replicator", version, about)]
pub struct Args {
    /// Replication mode, overrides `replication.mode`
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,
    /// Comma separated tables to replicate, overrides `replication.tables`
    #[arg(long, value_delimiter = ',')]
    pub tables: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    SyncOrInit,
    Init,
}

impl From<ModeArg> for ReplicationMode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::SyncOrInit => ReplicationMode::SyncOrInit,
            ModeArg::Init => ReplicationMode::Init,
        }
    }
}

/// Loads the [`ReplicatorConfig`], applies the command-line overrides and validates it.
pub fn load_replicator_config(args: &Args) -> anyhow::Result<ReplicatorConfig> {
    let mut config = load_config::<ReplicatorConfig>()?;
    apply_overrides(&mut config, args);
    config.validate()?;

    Ok(config)
}

fn apply_overrides(config: &mut ReplicatorConfig, args: &Args) {
    if let Some(mode) = args.mode {
        config.replication.mode = mode.into();
    }

    if let Some(tables) = &args.tables {
        config.replication.tables = tables
            .iter()
            .map(|table| table.trim().to_owned())
            .filter(|table| !table.is_empty())
            .collect();
    }
}
