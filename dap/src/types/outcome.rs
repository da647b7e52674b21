use crate::error::{DapResult, ErrorKind};

/// Outcome of one synchronization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Changes since the last synchronization were applied.
    Completed,
    /// The table was never initialized in the target database.
    InitNeeded,
    /// The table does not exist at the source.
    NoTable,
    /// Synchronization failed, with a detail for the logs.
    Failed(String),
}

impl SyncOutcome {
    /// Classifies the result of the synchronize primitive.
    ///
    /// A missing table takes precedence over a missing initialization, any
    /// other error is a failure.
    pub fn classify(result: DapResult<()>) -> Self {
        match result {
            Ok(()) => SyncOutcome::Completed,
            Err(err) => match err.kind() {
                ErrorKind::TableNotFound => SyncOutcome::NoTable,
                ErrorKind::TableNotInitialized => SyncOutcome::InitNeeded,
                _ => SyncOutcome::Failed(err.to_string()),
            },
        }
    }
}

/// Outcome of one initialization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitOutcome {
    /// The table was fully loaded.
    Completed,
    /// Initialization failed, with a detail for the logs.
    Failed(String),
}

impl InitOutcome {
    /// Classifies the result of the initialize primitive, any error is a failure.
    pub fn classify(result: DapResult<()>) -> Self {
        match result {
            Ok(()) => InitOutcome::Completed,
            Err(err) => InitOutcome::Failed(err.to_string()),
        }
    }
}
