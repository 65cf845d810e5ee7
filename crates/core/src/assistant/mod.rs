//! Natural-language questions over invoice data.
//!
//! A question is turned into SQL by a language model, checked by
//! [`SqlGuard`], executed through a [`QueryExecutor`] and summarized back
//! into prose. Failed attempts are retried with the failure as feedback.

pub mod error;
pub mod executor;
pub mod model;
pub mod prompt;
pub mod providers;
pub mod schema;
pub mod service;
pub mod sql;


pub use error::{AssistantError, AttemptError};
pub use executor::{ExecutorError, QueryExecutor, QueryRows, Row};
pub use model::{CompletionRequest, LlmClient, LlmError, ModelStrategy, ModelTask};
pub use providers::{AnthropicClient, OpenAiClient};
pub use schema::{ColumnSchema, SchemaCache, SchemaCatalog, SchemaError, SchemaSource, TableSchema};
pub use service::{AssistantAnswer, AssistantService, NO_RECORDS_ANSWER};
pub use sql::{SqlError, SqlGuard, ValidatedSql, extract_sql};
