//! Question answering pipeline.

use std::sync::Arc;

use invora_shared::{AssistantConfig, TenantId};
use serde::Serialize;

use super::error::{AssistantError, AttemptError};
use super::executor::{QueryExecutor, QueryRows, Row};
use super::model::{ModelStrategy, ModelTask};
use super::prompt::{self, Feedback};
use super::schema::{SchemaCache, SchemaCatalog};
use super::sql::{self, SqlGuard};

/// Answer for empty result sets.
pub const NO_RECORDS_ANSWER: &str = "No matching records were found.";

/// Response to a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssistantAnswer {
    /// Whether the data answered the question.
    pub answered: bool,
    /// Plain-language answer, or the fallback message.
    pub answer: String,
    /// SQL that produced the rows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Model's explanation of the SQL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Column names.
    pub columns: Vec<String>,
    /// Result rows.
    pub rows: Vec<Row>,
    /// Number of rows.
    pub row_count: usize,
    /// Generation attempts used.
    pub attempts: u32,
    /// Last failure, when unanswered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<String>,
}

/// Outcome of a successful attempt.
struct Executed {
    sql: String,
    explanation: Option<String>,
    rows: QueryRows,
}

/// Turns questions into tenant-scoped queries and answers.
pub struct AssistantService {
    models: ModelStrategy,
    schema: Arc<SchemaCache>,
    executor: Arc<dyn QueryExecutor>,
    guard: SqlGuard,
    config: AssistantConfig,
}

impl AssistantService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        models: ModelStrategy,
        schema: Arc<SchemaCache>,
        executor: Arc<dyn QueryExecutor>,
        config: AssistantConfig,
    ) -> Self {
        let guard = SqlGuard::new(&config.exposed_tables, config.max_rows);
        Self {
            models,
            schema,
            executor,
            guard,
            config,
        }
    }

    /// Schema cache backing the prompts.
    #[must_use]
    pub fn schema(&self) -> &Arc<SchemaCache> {
        &self.schema
    }

    /// Answers a question about the tenant's invoices.
    ///
    /// Generation, validation and execution are retried up to
    /// `max_attempts` times, each retry seeing the previous failure. When
    /// every attempt fails the fallback message is returned with
    /// `answered = false`.
    ///
    /// # Errors
    ///
    /// Returns an error for blank or overlong questions and when the schema
    /// cannot be loaded.
    pub async fn ask(
        &self,
        tenant_id: TenantId,
        question: &str,
    ) -> Result<AssistantAnswer, AssistantError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AssistantError::EmptyQuestion);
        }
        if question.chars().count() > self.config.max_question_length {
            return Err(AssistantError::QuestionTooLong {
                max: self.config.max_question_length,
            });
        }

        let schema = self.schema.get_or_load().await?;
        let system = prompt::sql_system_prompt(&schema, tenant_id, self.guard.max_rows());

        let mut feedback: Option<Feedback> = None;
        let max_attempts = self.config.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let mut generated_sql = None;
            let result = self
                .attempt(tenant_id, question, &system, feedback.as_ref(), &mut generated_sql)
                .await;

            match result {
                Ok(executed) => {
                    tracing::info!(
                        %tenant_id,
                        attempt,
                        rows = executed.rows.len(),
                        "Assistant query succeeded"
                    );
                    return Ok(self.answer(question, executed, attempt).await);
                }
                Err(e) => {
                    tracing::warn!(
                        %tenant_id,
                        attempt,
                        stage = e.stage(),
                        error = %e,
                        "Assistant attempt failed"
                    );
                    feedback = Some(Feedback {
                        sql: generated_sql,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(AssistantAnswer {
            answered: false,
            answer: self.config.fallback_message.clone(),
            sql: None,
            explanation: None,
            columns: Vec::new(),
            rows: Vec::new(),
            row_count: 0,
            attempts: max_attempts,
            diagnostics: feedback.map(|f| f.error),
        })
    }

    /// Cached catalog, loading it if needed.
    pub async fn catalog(&self) -> Result<Arc<SchemaCatalog>, AssistantError> {
        Ok(self.schema.get_or_load().await?)
    }

    /// Reloads the catalog.
    pub async fn refresh_schema(&self) -> Result<Arc<SchemaCatalog>, AssistantError> {
        Ok(self.schema.refresh().await?)
    }

    async fn attempt(
        &self,
        tenant_id: TenantId,
        question: &str,
        system: &str,
        feedback: Option<&Feedback>,
        generated_sql: &mut Option<String>,
    ) -> Result<Executed, AttemptError> {
        let response = self
            .models
            .complete(
                ModelTask::SqlGeneration,
                system.to_string(),
                prompt::sql_user_prompt(question, feedback),
            )
            .await?;

        let extracted = sql::extract_sql(&response)?;
        *generated_sql = Some(extracted.clone());
        tracing::debug!(sql = %extracted, "Generated SQL");

        let validated = self.guard.validate(&extracted, tenant_id)?;
        let rows = self.executor.execute(tenant_id, &validated.sql).await?;

        Ok(Executed {
            sql: validated.sql,
            explanation: sql::extract_explanation(&response),
            rows,
        })
    }

    async fn answer(&self, question: &str, executed: Executed, attempts: u32) -> AssistantAnswer {
        let Executed {
            sql,
            explanation,
            rows,
        } = executed;
        let row_count = rows.len();

        let answer = if rows.is_empty() {
            NO_RECORDS_ANSWER.to_string()
        } else {
            let user =
                prompt::summary_user_prompt(question, &sql, &rows, self.config.summary_row_limit);
            match self
                .models
                .complete(
                    ModelTask::Summarization,
                    prompt::SUMMARY_SYSTEM_PROMPT.to_string(),
                    user,
                )
                .await
            {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    tracing::warn!(error = %e, "Summarization failed, returning row count");
                    format!("Found {row_count} matching row(s).")
                }
            }
        };

        AssistantAnswer {
            answered: true,
            answer,
            sql: Some(sql),
            explanation,
            columns: rows.columns,
            rows: rows.rows,
            row_count,
            attempts,
            diagnostics: None,
        }
    }
}
