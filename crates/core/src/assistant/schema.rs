//! Schema catalog shown to the model, and its cache.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

/// One column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    /// Column name.
    pub name: String,
    /// Database type name.
    pub data_type: String,
    /// Whether NULL is allowed.
    pub nullable: bool,
}

/// Columns of one table, in ordinal order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
    /// Columns.
    pub columns: Vec<ColumnSchema>,
}

/// Tables the assistant may query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// Tables by name.
    pub tables: BTreeMap<String, TableSchema>,
}

impl SchemaCatalog {
    /// Appends a column to a table, creating the table on first use.
    pub fn add_column(&mut self, table: impl Into<String>, column: ColumnSchema) {
        self.tables
            .entry(table.into())
            .or_default()
            .columns
            .push(column);
    }

    /// Returns true when no table is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Renders one line per table: `table(col type, col type?)`, `?` marking
    /// nullable columns.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (name, table) in &self.tables {
            let columns: Vec<String> = table
                .columns
                .iter()
                .map(|c| {
                    format!(
                        "{} {}{}",
                        c.name,
                        c.data_type,
                        if c.nullable { "?" } else { "" }
                    )
                })
                .collect();
            let _ = writeln!(out, "{name}({})", columns.join(", "));
        }
        out
    }
}

/// Errors loading the schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// None of the exposed tables exist.
    #[error("No exposed tables were found in the database")]
    Empty,

    /// The backing store failed.
    #[error("Schema introspection failed: {0}")]
    Source(String),
}

/// Where the catalog comes from.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Loads column metadata for the given tables.
    async fn load(&self, tables: &[String]) -> Result<SchemaCatalog, SchemaError>;
}

/// In-memory catalog, loaded at startup and on explicit refresh.
pub struct SchemaCache {
    source: Arc<dyn SchemaSource>,
    tables: Vec<String>,
    catalog: RwLock<Option<Arc<SchemaCatalog>>>,
}

impl SchemaCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new(source: Arc<dyn SchemaSource>, tables: Vec<String>) -> Self {
        Self {
            source,
            tables,
            catalog: RwLock::new(None),
        }
    }

    /// Reloads the catalog from the source, replacing the cached copy.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError::Empty` when nothing was found; the previous
    /// catalog is kept in that case.
    pub async fn refresh(&self) -> Result<Arc<SchemaCatalog>, SchemaError> {
        let loaded = self.source.load(&self.tables).await?;
        if loaded.is_empty() {
            return Err(SchemaError::Empty);
        }
        let loaded = Arc::new(loaded);
        *self.catalog.write().await = Some(Arc::clone(&loaded));
        tracing::info!(tables = loaded.tables.len(), "Schema cache refreshed");
        Ok(loaded)
    }

    /// Returns the cached catalog, loading it if startup population failed.
    pub async fn get_or_load(&self) -> Result<Arc<SchemaCatalog>, SchemaError> {
        if let Some(catalog) = self.current().await {
            return Ok(catalog);
        }
        self.refresh().await
    }

    /// Returns the cached catalog without loading.
    pub async fn current(&self) -> Option<Arc<SchemaCatalog>> {
        self.catalog.read().await.clone()
    }

    /// Tables this cache covers.
    #[must_use]
    pub fn tables(&self) -> &[String] {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(name: &str, data_type: &str, nullable: bool) -> ColumnSchema {
        ColumnSchema {
            name: name.to_string(),
            data_type: data_type.to_string(),
            nullable,
        }
    }

    fn sample_catalog() -> SchemaCatalog {
        let mut catalog = SchemaCatalog::default();
        catalog.add_column("invoices", column("id", "uuid", false));
        catalog.add_column("invoices", column("due_date", "date", true));
        catalog.add_column("invoice_items", column("amount", "numeric", false));
        catalog
    }

    #[test]
    fn test_render_marks_nullable_columns() {
        assert_eq!(
            sample_catalog().render(),
            "invoice_items(amount numeric)\ninvoices(id uuid, due_date date?)\n"
        );
    }

    #[tokio::test]
    async fn test_get_or_load_loads_once() {
        let mut source = MockSchemaSource::new();
        source
            .expect_load()
            .times(1)
            .returning(|_| Ok(sample_catalog()));
        let cache = SchemaCache::new(Arc::new(source), vec!["invoices".to_string()]);

        assert!(cache.current().await.is_none());
        let first = cache.get_or_load().await.unwrap();
        let second = cache.get_or_load().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_refresh_rejects_empty_catalog_and_keeps_previous() {
        let mut source = MockSchemaSource::new();
        let mut calls = 0;
        source.expect_load().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(sample_catalog())
            } else {
                Ok(SchemaCatalog::default())
            }
        });
        let cache = SchemaCache::new(Arc::new(source), vec!["invoices".to_string()]);

        cache.refresh().await.unwrap();
        assert!(matches!(cache.refresh().await, Err(SchemaError::Empty)));
        assert_eq!(cache.current().await.unwrap().tables.len(), 2);
    }

    #[tokio::test]
    async fn test_source_failure_propagates() {
        let mut source = MockSchemaSource::new();
        source
            .expect_load()
            .withf(|tables: &[String]| tables == ["invoices".to_string()])
            .returning(|_| Err(SchemaError::Source("connection refused".to_string())));
        let cache = SchemaCache::new(Arc::new(source), vec!["invoices".to_string()]);

        assert!(matches!(
            cache.get_or_load().await,
            Err(SchemaError::Source(_))
        ));
    }
}
