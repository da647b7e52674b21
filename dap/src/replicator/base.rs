use std::future::Future;

use crate::error::DapResult;
use crate::types::TableName;

/// Replication primitives of the data access platform.
///
/// Every call opens its own session with the remote API and the target
/// database and releases it before returning, so calls for different tables
/// never share a connection. Dropping a returned future must release the
/// session as well.
///
/// Conditions the table worker reacts to are reported through the error kind:
/// [`crate::error::ErrorKind::TableNotFound`] when the table does not exist at
/// the source and [`crate::error::ErrorKind::TableNotInitialized`] when it was
/// never loaded into the target.
pub trait Replicator {
    /// Applies the changes made to `table_name` since its last synchronization.
    fn synchronize(&self, table_name: &TableName) -> impl Future<Output = DapResult<()>> + Send;

    /// Loads the full current state of `table_name`, replacing what the target holds.
    fn initialize(&self, table_name: &TableName) -> impl Future<Output = DapResult<()>> + Send;

    /// Lists the tables available at the source.
    fn list_tables(&self) -> impl Future<Output = DapResult<Vec<TableName>>> + Send;
}
