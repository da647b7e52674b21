use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    ApiConfig, CommandConfig, DatabaseConfig, ReplicationConfig, SentryConfig, ValidationError,
};

/// Complete configuration of the replicator binary.
///
/// Loaded once at startup and passed by value into the replication core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReplicatorConfig {
    /// Remote data API endpoint and credentials.
    pub api: ApiConfig,
    /// Target database.
    pub database: DatabaseConfig,
    /// Tables and run settings.
    #[serde(default)]
    pub replication: ReplicationConfig,
    /// Replication client invocation.
    #[serde(default)]
    pub command: CommandConfig,
    /// Optional Sentry configuration, errors are only logged when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentry: Option<SentryConfig>,
}

impl ReplicatorConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.api.validate()?;
        self.command.validate()?;
        self.replication.validate()
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] =
        &["replication.tables", "replication.skip_tables"];
}
