use serde::Serialize;
use std::fmt;

use crate::types::TableName;

/// Terminal status of a table in a [`RunReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultLabel {
    Completed,
    Failed,
    NoTable,
}

impl ResultLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultLabel::Completed => "completed",
            ResultLabel::Failed => "failed",
            ResultLabel::NoTable => "no_table",
        }
    }
}

impl fmt::Display for ResultLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final result of one table.
///
/// Serializes as `{"table_name": ..., "result": ...}`. The failure detail is
/// kept for logging and inspection but is not part of the serialized shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableResult {
    table_name: TableName,
    result: ResultLabel,
    #[serde(skip)]
    detail: Option<String>,
}

impl TableResult {
    pub fn completed(table_name: TableName) -> Self {
        Self {
            table_name,
            result: ResultLabel::Completed,
            detail: None,
        }
    }

    pub fn no_table(table_name: TableName) -> Self {
        Self {
            table_name,
            result: ResultLabel::NoTable,
            detail: None,
        }
    }

    pub fn failed(table_name: TableName, detail: impl Into<String>) -> Self {
        Self {
            table_name,
            result: ResultLabel::Failed,
            detail: Some(detail.into()),
        }
    }

    pub fn table_name(&self) -> &TableName {
        &self.table_name
    }

    pub fn result(&self) -> ResultLabel {
        self.result
    }

    /// Why the table failed, `None` for completed and missing tables.
    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }
}

/// Results of one run, one entry per requested table in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunReport {
    results: Vec<TableResult>,
}

impl RunReport {
    pub fn new(results: Vec<TableResult>) -> Self {
        Self { results }
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableResult> {
        self.results.iter()
    }

    /// Returns the result of `table_name`, if it was part of the run.
    pub fn get(&self, table_name: &str) -> Option<&TableResult> {
        self.results
            .iter()
            .find(|result| result.table_name.as_str() == table_name)
    }

    /// Counts the results per label.
    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary::default();
        for result in &self.results {
            match result.result {
                ResultLabel::Completed => summary.completed += 1,
                ResultLabel::Failed => summary.failed += 1,
                ResultLabel::NoTable => summary.no_table += 1,
            }
        }

        summary
    }

    pub fn into_inner(self) -> Vec<TableResult> {
        self.results
    }
}

impl IntoIterator for RunReport {
    type Item = TableResult;
    type IntoIter = std::vec::IntoIter<TableResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.into_iter()
    }
}

/// Number of tables per [`ResultLabel`] in a [`RunReport`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub failed: usize,
    pub no_table: usize,
}

impl RunSummary {
    pub fn total(&self) -> usize {
        self.completed + self.failed + self.no_table
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} completed, {} failed, {} no_table",
            self.completed, self.failed, self.no_table
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        RunReport::new(vec![
            TableResult::completed("users".into()),
            TableResult::failed("courses".into(), "connection reset"),
            TableResult::no_table("missing_table".into()),
        ])
    }

    #[test]
    fn serializes_to_stable_shape() {
        let json = serde_json::to_value(report()).unwrap();

        assert_eq!(
            json,
            serde_json::json!([
                {"table_name": "users", "result": "completed"},
                {"table_name": "courses", "result": "failed"},
                {"table_name": "missing_table", "result": "no_table"},
            ])
        );
    }

    #[test]
    fn summary_counts_each_label() {
        let summary = report().summary();

        assert_eq!(
            summary,
            RunSummary {
                completed: 1,
                failed: 1,
                no_table: 1
            }
        );
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.to_string(), "1 completed, 1 failed, 1 no_table");
    }

    #[test]
    fn failed_results_keep_detail() {
        let report = report();

        assert_eq!(
            report.get("courses").unwrap().detail(),
            Some("connection reset")
        );
        assert_eq!(report.get("users").unwrap().detail(), None);
        assert!(report.get("grades").is_none());
    }
}
