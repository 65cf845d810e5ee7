//! Schema introspection for the assistant.

use async_trait::async_trait;
use invora_core::assistant::{ColumnSchema, SchemaCatalog, SchemaError, SchemaSource};
use sea_orm::{DatabaseConnection, DbBackend, FromQueryResult, Statement, Value};

/// Reads column metadata from `information_schema`.
#[derive(Debug, Clone)]
pub struct SchemaRepository {
    db: DatabaseConnection,
}

#[derive(Debug, FromQueryResult)]
struct ColumnRow {
    table_name: String,
    column_name: String,
    data_type: String,
    is_nullable: String,
}

impl SchemaRepository {
    /// Creates a new schema repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SchemaSource for SchemaRepository {
    async fn load(&self, tables: &[String]) -> Result<SchemaCatalog, SchemaError> {
        if tables.is_empty() {
            return Err(SchemaError::Empty);
        }

        let rows = ColumnRow::find_by_statement(columns_statement(tables))
            .all(&self.db)
            .await
            .map_err(|e| SchemaError::Source(e.to_string()))?;

        let mut catalog = SchemaCatalog::default();
        for row in rows {
            catalog.add_column(
                row.table_name,
                ColumnSchema {
                    name: row.column_name,
                    data_type: row.data_type,
                    nullable: row.is_nullable == "YES",
                },
            );
        }

        tracing::debug!(tables = catalog.tables.len(), "Schema catalog loaded");
        Ok(catalog)
    }
}

fn columns_statement(tables: &[String]) -> Statement {
    let placeholders = (1..=tables.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT table_name::text AS table_name, column_name::text AS column_name, \
         data_type::text AS data_type, is_nullable::text AS is_nullable \
         FROM information_schema.columns \
         WHERE table_schema = 'public' AND table_name IN ({placeholders}) \
         ORDER BY table_name, ordinal_position"
    );
    let values = tables.iter().map(|t| Value::from(t.as_str())).collect::<Vec<_>>();
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_columns_statement_binds_each_table() {
        let stmt = columns_statement(&["invoices".to_string(), "invoice_items".to_string()]);
        assert!(stmt.sql.contains("IN ($1, $2)"));
        assert_eq!(stmt.values.map(|v| v.0.len()), Some(2));
    }
}
