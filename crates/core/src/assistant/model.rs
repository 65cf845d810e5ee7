//! Language model seam and per-task model selection.

use std::sync::Arc;

use async_trait::async_trait;
use invora_shared::{LlmConfig, LlmProvider};
use thiserror::Error;

use super::providers::{AnthropicClient, OpenAiClient};

/// Longest provider error body kept in an error.
pub const MAX_ERROR_BODY: usize = 500;

/// One completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub user: String,
    /// Ask the provider for a JSON object.
    pub json_mode: bool,
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_tokens: u32,
}

/// Errors from a language model provider.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The provider answered with a non-success status.
    #[error("LLM provider returned {status}: {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body, truncated.
        body: String,
    },

    /// The provider answered without any text.
    #[error("LLM provider returned an empty response")]
    EmptyResponse,

    /// The request could not be sent or the response read.
    #[error("LLM transport error: {0}")]
    Transport(String),

    /// The response body was not the expected shape.
    #[error("Malformed LLM response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl LlmError {
    /// Builds an `Api` error, truncating the body.
    #[must_use]
    pub fn api(status: u16, body: &str) -> Self {
        Self::Api {
            status,
            body: body.chars().take(MAX_ERROR_BODY).collect(),
        }
    }
}

/// A chat-completion capable model.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Runs one completion and returns the raw text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError>;
}

/// What a model is being asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTask {
    /// Turn a question into SQL. Uses JSON mode.
    SqlGeneration,
    /// Turn rows into a plain-language answer.
    Summarization,
}

/// Picks a client and sampling settings for each task.
#[derive(Clone)]
pub struct ModelStrategy {
    sql: Arc<dyn LlmClient>,
    summary: Arc<dyn LlmClient>,
    temperature: f32,
    max_tokens: u32,
}

impl ModelStrategy {
    /// Creates a strategy from explicit clients.
    #[must_use]
    pub fn new(
        sql: Arc<dyn LlmClient>,
        summary: Arc<dyn LlmClient>,
        temperature: f32,
        max_tokens: u32,
    ) -> Self {
        Self {
            sql,
            summary,
            temperature,
            max_tokens,
        }
    }

    /// Builds provider clients from configuration. The summarization model
    /// falls back to the SQL model.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let sql = build_client(config, &config.sql_model)?;
        let summary = if config.summary_model() == config.sql_model {
            Arc::clone(&sql)
        } else {
            build_client(config, config.summary_model())?
        };
        Ok(Self::new(sql, summary, config.temperature, config.max_tokens))
    }

    /// Client for a task.
    #[must_use]
    pub fn client(&self, task: ModelTask) -> &dyn LlmClient {
        match task {
            ModelTask::SqlGeneration => self.sql.as_ref(),
            ModelTask::Summarization => self.summary.as_ref(),
        }
    }

    /// Builds the request for a task.
    #[must_use]
    pub fn request(&self, task: ModelTask, system: String, user: String) -> CompletionRequest {
        CompletionRequest {
            system,
            user,
            json_mode: task == ModelTask::SqlGeneration,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }

    /// Runs a task with the matching client.
    pub async fn complete(
        &self,
        task: ModelTask,
        system: String,
        user: String,
    ) -> Result<String, LlmError> {
        let request = self.request(task, system, user);
        self.client(task).complete(&request).await
    }
}

impl std::fmt::Debug for ModelStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelStrategy")
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish_non_exhaustive()
    }
}

fn build_client(config: &LlmConfig, model: &str) -> Result<Arc<dyn LlmClient>, LlmError> {
    let client: Arc<dyn LlmClient> = match config.provider {
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(config, model)?),
        LlmProvider::Anthropic => Arc::new(AnthropicClient::new(config, model)?),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(summary_model: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: "sk-test".to_string(),
            base_url: None,
            sql_model: "gpt-sql".to_string(),
            summary_model: summary_model.map(str::to_string),
            temperature: 0.0,
            max_tokens: 512,
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_api_error_body_is_truncated() {
        let body = "x".repeat(2_000);
        match LlmError::api(500, &body) {
            LlmError::Api { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body.len(), MAX_ERROR_BODY);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_request_uses_json_mode_for_sql_only() {
        let strategy = ModelStrategy::from_config(&config(None)).unwrap();

        let sql = strategy.request(ModelTask::SqlGeneration, "s".into(), "u".into());
        assert!(sql.json_mode);
        assert_eq!(sql.max_tokens, 512);

        let summary = strategy.request(ModelTask::Summarization, "s".into(), "u".into());
        assert!(!summary.json_mode);
    }

    #[test]
    fn test_summary_client_shared_when_models_match() {
        let strategy = ModelStrategy::from_config(&config(Some("gpt-sql"))).unwrap();
        assert!(Arc::ptr_eq(&strategy.sql, &strategy.summary));

        let strategy = ModelStrategy::from_config(&config(Some("gpt-mini"))).unwrap();
        assert!(!Arc::ptr_eq(&strategy.sql, &strategy.summary));
    }

    #[tokio::test]
    async fn test_complete_routes_to_task_client() {
        let mut sql = MockLlmClient::new();
        sql.expect_complete()
            .withf(|r| r.json_mode)
            .returning(|_| Ok("sql".to_string()));
        let mut summary = MockLlmClient::new();
        summary
            .expect_complete()
            .withf(|r| !r.json_mode)
            .returning(|_| Ok("summary".to_string()));

        let strategy = ModelStrategy::new(Arc::new(sql), Arc::new(summary), 0.0, 256);

        let out = strategy
            .complete(ModelTask::SqlGeneration, "s".into(), "u".into())
            .await
            .unwrap();
        assert_eq!(out, "sql");
        let out = strategy
            .complete(ModelTask::Summarization, "s".into(), "u".into())
            .await
            .unwrap();
        assert_eq!(out, "summary");
    }
}
