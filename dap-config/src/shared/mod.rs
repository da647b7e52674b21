mod api;
mod base;
mod command;
mod database;
mod replication;
mod replicator;
mod sentry;

pub use api::*;
pub use base::*;
pub use command::*;
pub use database::*;
pub use replication::*;
pub use replicator::*;
pub use sentry::*;
