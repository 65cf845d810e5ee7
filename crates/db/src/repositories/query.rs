//! Runs assistant-generated SQL against the database.

use std::time::Duration;

use async_trait::async_trait;
use invora_core::assistant::{ExecutorError, QueryExecutor, QueryRows};
use invora_shared::TenantId;
use sea_orm::{ConnectionTrait, DatabaseConnection, DbBackend, DbErr, Statement};
use serde_json::Value;

use crate::rls::RlsExt;

/// Default statement timeout.
pub const DEFAULT_STATEMENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes validated SELECT statements read-only under the tenant's RLS context.
#[derive(Debug, Clone)]
pub struct DbQueryExecutor {
    db: DatabaseConnection,
    statement_timeout: Duration,
}

impl DbQueryExecutor {
    /// Creates an executor with the default statement timeout.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            statement_timeout: DEFAULT_STATEMENT_TIMEOUT,
        }
    }

    /// Overrides the statement timeout.
    #[must_use]
    pub const fn with_statement_timeout(mut self, timeout: Duration) -> Self {
        self.statement_timeout = timeout;
        self
    }

    async fn run(&self, tenant_id: TenantId, sql: &str) -> Result<Vec<Value>, DbErr> {
        let rls = self
            .db
            .with_rls_read_only(tenant_id, self.statement_timeout)
            .await?;

        let rows = rls
            .transaction()
            .query_all(Statement::from_string(DbBackend::Postgres, wrap(sql)))
            .await?;
        let values = rows
            .iter()
            .map(|row| row.try_get::<Value>("", "row"))
            .collect::<Result<Vec<_>, _>>()?;

        rls.rollback().await?;
        Ok(values)
    }
}

/// Wraps a SELECT so each row comes back as one JSON object.
fn wrap(sql: &str) -> String {
    let sql = sql.trim().trim_end_matches(';');
    format!("SELECT row_to_json(q) AS row FROM ({sql}) q")
}

#[async_trait]
impl QueryExecutor for DbQueryExecutor {
    async fn execute(&self, tenant_id: TenantId, sql: &str) -> Result<QueryRows, ExecutorError> {
        tracing::debug!(tenant_id = %tenant_id, sql, "Executing assistant query");

        let values = self
            .run(tenant_id, sql)
            .await
            .map_err(|e| ExecutorError::Database(e.to_string()))?;

        QueryRows::from_json_array(Value::Array(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_strips_trailing_semicolon() {
        assert_eq!(
            wrap("SELECT 1 AS n LIMIT 5;\n"),
            "SELECT row_to_json(q) AS row FROM (SELECT 1 AS n LIMIT 5) q"
        );
    }

    #[test]
    fn test_default_timeout() {
        assert_eq!(DEFAULT_STATEMENT_TIMEOUT.as_secs(), 10);
    }
}
