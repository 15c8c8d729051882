//! Query-related data models.
//!
//! Result sets returned by providers and the attempt records that make up
//! the audit trail of one repair loop.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Default row limit for query results.
pub const DEFAULT_ROW_LIMIT: u32 = 100;

/// Maximum allowed row limit.
pub const MAX_ROW_LIMIT: u32 = 10000;

/// Default query timeout in seconds.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u32 = 30;

/// Maximum query timeout in seconds.
pub const MAX_QUERY_TIMEOUT_SECS: u32 = 300;

/// Default number of repair rounds after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Rows produced by a successful execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// True when the row limit cut the result short.
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl RowSet {
    /// An empty result, e.g. for a statement that returns no rows.
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            truncated: false,
            execution_time_ms,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Outcome of a single candidate query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Pending,
    Succeeded,
    Failed { error: String },
}

/// One candidate SQL statement and what happened when it ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryAttempt {
    /// Empty when the model produced no usable statement.
    pub sql: String,
    pub attempt_index: u32,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

impl QueryAttempt {
    pub fn pending(sql: impl Into<String>, attempt_index: u32) -> Self {
        Self {
            sql: sql.into(),
            attempt_index,
            outcome: AttemptOutcome::Pending,
        }
    }

    pub fn succeeded(mut self) -> Self {
        self.outcome = AttemptOutcome::Succeeded;
        self
    }

    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.outcome = AttemptOutcome::Failed {
            error: error.into(),
        };
        self
    }

    /// The error message if the attempt failed.
    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Failed { error } => Some(error),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == AttemptOutcome::Succeeded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_set_empty() {
        let result = RowSet::empty(10);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
        assert!(!result.truncated);
    }

    #[test]
    fn test_attempt_transitions() {
        let attempt = QueryAttempt::pending("SELECT 1", 0);
        assert_eq!(attempt.outcome, AttemptOutcome::Pending);
        assert!(attempt.error().is_none());

        let failed = attempt.clone().failed("no such table: t");
        assert_eq!(failed.error(), Some("no such table: t"));
        assert!(!failed.is_success());

        assert!(attempt.succeeded().is_success());
    }

    #[test]
    fn test_attempt_serializes_flat() {
        let attempt = QueryAttempt::pending("SELECT totals FROM sales.orders", 0)
            .failed("column \"totals\" does not exist");
        let json = serde_json::to_value(&attempt).unwrap();
        assert_eq!(json["sql"], "SELECT totals FROM sales.orders");
        assert_eq!(json["attempt_index"], 0);
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"], "column \"totals\" does not exist");
    }
}
