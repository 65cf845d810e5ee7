//! Query execution seam.

use async_trait::async_trait;
use invora_shared::TenantId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// One result row, keyed by column name.
pub type Row = Map<String, Value>;

/// Rows returned by a query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryRows {
    /// Column names, taken from the first row.
    pub columns: Vec<String>,
    /// Rows as JSON objects.
    pub rows: Vec<Row>,
}

impl QueryRows {
    /// Builds a result from row objects.
    #[must_use]
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self { columns, rows }
    }

    /// Parses a JSON array of row objects.
    pub fn from_json_array(value: Value) -> Result<Self, ExecutorError> {
        let Value::Array(items) = value else {
            return Err(ExecutorError::InvalidResult(
                "expected a JSON array of rows".to_string(),
            ));
        };
        let rows = items
            .into_iter()
            .map(|item| match item {
                Value::Object(row) => Ok(row),
                other => Err(ExecutorError::InvalidResult(format!(
                    "expected a row object, got {other}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_rows(rows))
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true when no rows came back.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Errors running a validated query.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The tool reported a failure.
    #[error("query tool error: {0}")]
    Tool(String),

    /// The tool process could not be reached.
    #[error("query transport error: {0}")]
    Transport(String),

    /// The database rejected the query.
    #[error("database error: {0}")]
    Database(String),

    /// The result was not a list of row objects.
    #[error("invalid query result: {0}")]
    InvalidResult(String),
}

/// Runs validated SQL for a tenant.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes a read-only query and returns its rows.
    async fn execute(&self, tenant_id: TenantId, sql: &str) -> Result<QueryRows, ExecutorError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_from_json_array_collects_columns() {
        let rows = QueryRows::from_json_array(json!([
            {"invoice_number": "INV-1", "total": "10.00"},
            {"invoice_number": "INV-2", "total": "12.50"}
        ]))
        .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows.columns, vec!["invoice_number", "total"]);
    }

    #[test]
    fn test_from_json_array_rejects_non_rows() {
        assert!(matches!(
            QueryRows::from_json_array(json!({"rows": []})),
            Err(ExecutorError::InvalidResult(_))
        ));
        assert!(matches!(
            QueryRows::from_json_array(json!([1, 2])),
            Err(ExecutorError::InvalidResult(_))
        ));
    }

    #[test]
    fn test_empty_result_has_no_columns() {
        let rows = QueryRows::from_json_array(json!([])).unwrap();
        assert!(rows.is_empty());
        assert!(rows.columns.is_empty());
    }
}
