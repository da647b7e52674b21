use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use crate::dap_error;
use crate::error::{DapResult, ErrorKind};
use crate::replicator::base::Replicator;
use crate::types::TableName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplicatorMethod {
    Synchronize,
    Initialize,
    ListTables,
}

/// Scripted answer of a [`MockReplicator`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    Succeed,
    TableNotInitialized,
    TableNotFound,
    Fail(String),
    Panic,
}

impl MockResponse {
    pub fn fail(detail: impl Into<String>) -> Self {
        Self::Fail(detail.into())
    }

    fn into_result(self, table_name: &TableName) -> DapResult<()> {
        match self {
            MockResponse::Succeed => Ok(()),
            MockResponse::TableNotInitialized => Err(dap_error!(
                ErrorKind::TableNotInitialized,
                "Table is not initialized in the target database",
                table_name
            )),
            MockResponse::TableNotFound => Err(dap_error!(
                ErrorKind::TableNotFound,
                "Table does not exist at the source",
                table_name
            )),
            MockResponse::Fail(detail) => Err(dap_error!(
                ErrorKind::CommandFailed,
                "Replication client failed",
                detail
            )),
            MockResponse::Panic => panic!("mock replicator panicked for table {table_name}"),
        }
    }
}

#[derive(Debug, Default)]
struct Inner {
    sync_responses: HashMap<TableName, MockResponse>,
    init_responses: HashMap<TableName, MockResponse>,
    delays: HashMap<TableName, Duration>,
    source_tables: Vec<TableName>,
    calls: Vec<(ReplicatorMethod, Option<TableName>)>,
}

#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

/// In-memory [`Replicator`] answering with scripted responses and recording every call.
///
/// Tables without a scripted response succeed. A delay configured for a table
/// is applied to each of its calls, which is used to control completion order.
#[derive(Debug, Clone, Default)]
pub struct MockReplicator {
    inner: Arc<Mutex<Inner>>,
    in_flight: Arc<InFlight>,
}

impl MockReplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_sync_response(&self, table_name: &str, response: MockResponse) {
        let mut inner = self.inner.lock().await;
        inner.sync_responses.insert(table_name.into(), response);
    }

    pub async fn set_init_response(&self, table_name: &str, response: MockResponse) {
        let mut inner = self.inner.lock().await;
        inner.init_responses.insert(table_name.into(), response);
    }

    pub async fn set_delay(&self, table_name: &str, delay: Duration) {
        let mut inner = self.inner.lock().await;
        inner.delays.insert(table_name.into(), delay);
    }

    pub async fn set_source_tables(&self, tables: &[&str]) {
        let mut inner = self.inner.lock().await;
        inner.source_tables = tables.iter().map(|t| TableName::from(*t)).collect();
    }

    /// Returns every call made so far, in the order they started.
    pub async fn calls(&self) -> Vec<(ReplicatorMethod, Option<TableName>)> {
        let inner = self.inner.lock().await;
        inner.calls.clone()
    }

    /// Returns how many times `method` was called for `table_name`.
    pub async fn call_count(&self, method: ReplicatorMethod, table_name: &str) -> usize {
        let inner = self.inner.lock().await;
        inner
            .calls
            .iter()
            .filter(|(m, t)| *m == method && t.as_ref().is_some_and(|t| t.as_str() == table_name))
            .count()
    }

    /// Returns the highest number of synchronize and initialize calls that ran at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.in_flight.max.load(Ordering::SeqCst)
    }

    async fn call(&self, method: ReplicatorMethod, table_name: &TableName) -> DapResult<()> {
        let (response, delay) = {
            let mut inner = self.inner.lock().await;
            inner.calls.push((method, Some(table_name.clone())));

            let responses = match method {
                ReplicatorMethod::Synchronize => &inner.sync_responses,
                _ => &inner.init_responses,
            };
            let response = responses
                .get(table_name)
                .cloned()
                .unwrap_or(MockResponse::Succeed);

            (response, inner.delays.get(table_name).copied())
        };

        let _guard = InFlightGuard::enter(self.in_flight.clone());

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        response.into_result(table_name)
    }
}

/// Counts a call as in flight until it finishes, panics or is dropped.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
}

impl InFlightGuard {
    fn enter(in_flight: Arc<InFlight>) -> Self {
        let current = in_flight.current.fetch_add(1, Ordering::SeqCst) + 1;
        in_flight.max.fetch_max(current, Ordering::SeqCst);

        Self { in_flight }
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.current.fetch_sub(1, Ordering::SeqCst);
    }
}

impl Replicator for MockReplicator {
    async fn synchronize(&self, table_name: &TableName) -> DapResult<()> {
        self.call(ReplicatorMethod::Synchronize, table_name).await
    }

    async fn initialize(&self, table_name: &TableName) -> DapResult<()> {
        self.call(ReplicatorMethod::Initialize, table_name).await
    }

    async fn list_tables(&self) -> DapResult<Vec<TableName>> {
        let mut inner = self.inner.lock().await;
        inner.calls.push((ReplicatorMethod::ListTables, None));

        Ok(inner.source_tables.clone())
    }
}
