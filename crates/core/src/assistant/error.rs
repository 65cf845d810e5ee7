//! Assistant errors.

use invora_shared::AppError;
use thiserror::Error;

use super::executor::ExecutorError;
use super::model::LlmError;
use super::schema::SchemaError;
use super::sql::SqlError;

/// Errors that stop a question before any generation attempt.
#[derive(Debug, Error)]
pub enum AssistantError {
    /// The question is blank.
    #[error("Question must not be empty")]
    EmptyQuestion,

    /// The question exceeds the configured length.
    #[error("Question is longer than {max} characters")]
    QuestionTooLong {
        /// Maximum length in characters.
        max: usize,
    },

    /// The schema could not be loaded.
    #[error("Schema is unavailable: {0}")]
    SchemaUnavailable(#[from] SchemaError),
}

impl From<AssistantError> for AppError {
    fn from(err: AssistantError) -> Self {
        match err {
            AssistantError::EmptyQuestion | AssistantError::QuestionTooLong { .. } => {
                Self::Validation(err.to_string())
            }
            AssistantError::SchemaUnavailable(_) => Self::ServiceUnavailable(err.to_string()),
        }
    }
}

impl From<SchemaError> for AppError {
    fn from(err: SchemaError) -> Self {
        Self::ServiceUnavailable(err.to_string())
    }
}

/// Why one generation attempt failed. Retried, never returned to callers.
#[derive(Debug, Error)]
pub enum AttemptError {
    /// The model call failed.
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// The SQL could not be extracted or was refused.
    #[error(transparent)]
    Sql(#[from] SqlError),

    /// The query failed to run.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}

impl AttemptError {
    /// Short label for logs.
    #[must_use]
    pub const fn stage(&self) -> &'static str {
        match self {
            Self::Llm(_) => "generate",
            Self::Sql(_) => "validate",
            Self::Executor(_) => "execute",
        }
    }
}
