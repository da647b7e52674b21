use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// The namespace the tables belong to is empty.
    #[error("`replication.namespace` cannot be empty")]
    EmptyNamespace,
    /// Sync-or-init runs need an explicit table list.
    #[error("`replication.tables` cannot be empty when `mode` is `sync_or_init`")]
    NoTables,
    /// A configured table name is empty or only whitespace.
    #[error("table names cannot be empty")]
    EmptyTableName,
    /// A table name appears more than once in `replication.tables`.
    #[error("table `{0}` is listed more than once in `replication.tables`")]
    DuplicateTable(String),
    /// Concurrency cap set to zero.
    #[error("`replication.max_concurrent_tables` cannot be zero")]
    MaxConcurrentTablesZero,
    /// Run deadline set to zero.
    #[error("`replication.run_timeout_ms` cannot be zero")]
    RunTimeoutZero,
    /// The API base url is empty.
    #[error("`api.base_url` cannot be empty")]
    EmptyApiBaseUrl,
    /// The replication client program is empty.
    #[error("`command.program` cannot be empty")]
    EmptyCommandProgram,
}
