use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::shared::ValidationError;

/// Namespace of the Canvas tables, the only one deployments replicate today.
const DEFAULT_NAMESPACE: &str = "canvas";

/// Which replication action a run performs for every table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplicationMode {
    /// Incrementally synchronize each table, initializing the ones that were never loaded.
    #[default]
    SyncOrInit,
    /// Fully initialize each table, discarding whatever the target holds.
    Init,
}

impl fmt::Display for ReplicationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SyncOrInit => f.write_str("sync_or_init"),
            Self::Init => f.write_str("init"),
        }
    }
}

/// Settings of a replication run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Namespace the source tables belong to.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Action performed for every table.
    #[serde(default)]
    pub mode: ReplicationMode,
    /// Tables to replicate, in the order they are reported.
    ///
    /// In [`ReplicationMode::Init`] an empty list means every table the source lists.
    #[serde(default)]
    pub tables: Vec<String>,
    /// Tables removed from the source listing in [`ReplicationMode::Init`].
    #[serde(default)]
    pub skip_tables: Vec<String>,
    /// Maximum number of tables replicated at the same time, unbounded when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrent_tables: Option<u16>,
    /// Deadline for the whole run, after which unfinished tables are reported as failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_timeout_ms: Option<u64>,
}

impl ReplicationConfig {
    /// Validates the run settings.
    ///
    /// Table names must be unique so that every report entry maps to exactly
    /// one requested table.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.namespace.trim().is_empty() {
            return Err(ValidationError::EmptyNamespace);
        }

        if self.mode == ReplicationMode::SyncOrInit && self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        let mut seen = HashSet::with_capacity(self.tables.len());
        for table in &self.tables {
            if table.trim().is_empty() {
                return Err(ValidationError::EmptyTableName);
            }

            if !seen.insert(table.as_str()) {
                return Err(ValidationError::DuplicateTable(table.clone()));
            }
        }

        if self.max_concurrent_tables == Some(0) {
            return Err(ValidationError::MaxConcurrentTablesZero);
        }

        if self.run_timeout_ms == Some(0) {
            return Err(ValidationError::RunTimeoutZero);
        }

        Ok(())
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            mode: ReplicationMode::default(),
            tables: Vec::new(),
            skip_tables: Vec::new(),
            max_concurrent_tables: None,
            run_timeout_ms: None,
        }
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_tables(tables: &[&str]) -> ReplicationConfig {
        ReplicationConfig {
            tables: tables.iter().map(|t| t.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_unique_tables() {
        let config = config_with_tables(&["users", "courses"]);

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_duplicate_tables() {
        let config = config_with_tables(&["users", "courses", "users"]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateTable("users".to_owned()))
        );
    }

    #[test]
    fn rejects_blank_table_names() {
        let config = config_with_tables(&["users", "  "]);

        assert_eq!(config.validate(), Err(ValidationError::EmptyTableName));
    }

    #[test]
    fn sync_or_init_requires_tables() {
        let config = config_with_tables(&[]);

        assert_eq!(config.validate(), Err(ValidationError::NoTables));
    }

    #[test]
    fn init_allows_empty_table_list() {
        let config = ReplicationConfig {
            mode: ReplicationMode::Init,
            ..Default::default()
        };

        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn rejects_zero_limits() {
        let mut config = config_with_tables(&["users"]);
        config.max_concurrent_tables = Some(0);
        assert_eq!(
            config.validate(),
            Err(ValidationError::MaxConcurrentTablesZero)
        );

        config.max_concurrent_tables = Some(4);
        config.run_timeout_ms = Some(0);
        assert_eq!(config.validate(), Err(ValidationError::RunTimeoutZero));
    }

    #[test]
    fn mode_uses_snake_case_names() {
        let mode: ReplicationMode = serde_json::from_str("\"sync_or_init\"").unwrap();
        assert_eq!(mode, ReplicationMode::SyncOrInit);

        let mode: ReplicationMode = serde_json::from_str("\"init\"").unwrap();
        assert_eq!(mode, ReplicationMode::Init);
        assert_eq!(mode.to_string(), "init");
    }
}
