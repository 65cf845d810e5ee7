//! HTTP clients for hosted language models.

use std::time::Duration;

use async_trait::async_trait;
use invora_shared::LlmConfig;
use serde::Deserialize;
use serde_json::{Value, json};

use super::model::{CompletionRequest, LlmClient, LlmError};

const OPENAI_BASE_URL: &str = "https://api.openai.com";
const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const JSON_INSTRUCTION: &str =
    "Respond with a single valid JSON object only. No markdown code fences, no prose.";

fn http_client(config: &LlmConfig) -> Result<reqwest::Client, LlmError> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn endpoint(base_url: Option<&str>, default: &str, path: &str) -> String {
    format!("{}{path}", base_url.unwrap_or(default).trim_end_matches('/'))
}

async fn read_success(response: reqwest::Response) -> Result<String, LlmError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(LlmError::api(status.as_u16(), &body));
    }
    Ok(body)
}

// ============================================================================
// OpenAI-compatible chat completions
// ============================================================================

/// Client for OpenAI-compatible `chat/completions` endpoints.
#[derive(Clone)]
pub struct OpenAiClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
}

impl OpenAiClient {
    /// Creates a client for one model.
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            url: endpoint(
                config.base_url.as_deref(),
                OPENAI_BASE_URL,
                "/v1/chat/completions",
            ),
            model: model.to_string(),
        })
    }

    /// Request body for a completion.
    #[must_use]
    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": &self.model,
            "messages": [
                {"role": "system", "content": &request.system},
                {"role": "user", "content": &request.user}
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });
        if request.json_mode {
            body["response_format"] = json!({"type": "json_object"});
        }
        body
    }

    /// Pulls the first choice's text out of a response body.
    pub fn parse_response(body: &str) -> Result<String, LlmError> {
        #[derive(Deserialize)]
        struct Message {
            content: Option<String>,
        }
        #[derive(Deserialize)]
        struct Choice {
            message: Message,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            #[serde(default)]
            choices: Vec<Choice>,
        }

        let parsed: ApiResponse =
            serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, json_mode = request.json_mode, "OpenAI completion");
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(request))
            .send()
            .await?;
        Self::parse_response(&read_success(response).await?)
    }
}

// ============================================================================
// Anthropic messages
// ============================================================================

/// Client for the Anthropic `messages` endpoint.
#[derive(Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    api_key: String,
    url: String,
    model: String,
}

impl AnthropicClient {
    /// Creates a client for one model.
    pub fn new(config: &LlmConfig, model: &str) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client(config)?,
            api_key: config.api_key.clone(),
            url: endpoint(config.base_url.as_deref(), ANTHROPIC_BASE_URL, "/v1/messages"),
            model: model.to_string(),
        })
    }

    /// Request body for a completion. JSON mode is an extra system instruction.
    #[must_use]
    pub fn request_body(&self, request: &CompletionRequest) -> Value {
        let system = if request.json_mode {
            format!("{}\n\n{JSON_INSTRUCTION}", request.system)
        } else {
            request.system.clone()
        };
        json!({
            "model": &self.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "system": system,
            "messages": [{"role": "user", "content": &request.user}]
        })
    }

    /// Joins the text blocks of a response body.
    pub fn parse_response(body: &str) -> Result<String, LlmError> {
        #[derive(Deserialize)]
        struct ContentBlock {
            text: Option<String>,
        }
        #[derive(Deserialize)]
        struct ApiResponse {
            #[serde(default)]
            content: Vec<ContentBlock>,
        }

        let parsed: ApiResponse =
            serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;
        let text: String = parsed
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect();
        if text.trim().is_empty() {
            return Err(LlmError::EmptyResponse);
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for AnthropicClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        tracing::debug!(model = %self.model, json_mode = request.json_mode, "Anthropic completion");
        let response = self
            .client
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(request))
            .send()
            .await?;
        Self::parse_response(&read_success(response).await?)
    }
}

#[cfg(test)]
mod tests {
    use invora_shared::LlmProvider;

    use super::*;

    fn config(provider: LlmProvider, base_url: Option<&str>) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: "key".to_string(),
            base_url: base_url.map(str::to_string),
            sql_model: "model-a".to_string(),
            summary_model: None,
            temperature: 0.0,
            max_tokens: 256,
            timeout_secs: 5,
        }
    }

    fn request(json_mode: bool) -> CompletionRequest {
        CompletionRequest {
            system: "system".to_string(),
            user: "question".to_string(),
            json_mode,
            temperature: 0.0,
            max_tokens: 256,
        }
    }

    #[test]
    fn test_endpoints_respect_base_url() {
        let openai = OpenAiClient::new(&config(LlmProvider::OpenAi, Some("http://llm.local/")), "m")
            .unwrap();
        assert_eq!(openai.url, "http://llm.local/v1/chat/completions");

        let anthropic = AnthropicClient::new(&config(LlmProvider::Anthropic, None), "m").unwrap();
        assert_eq!(anthropic.url, "https://api.anthropic.com/v1/messages");
    }

    #[test]
    fn test_openai_body_sets_response_format_in_json_mode() {
        let client = OpenAiClient::new(&config(LlmProvider::OpenAi, None), "gpt").unwrap();

        let body = client.request_body(&request(true));
        assert_eq!(body["model"], "gpt");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "question");
        assert_eq!(body["response_format"]["type"], "json_object");

        let body = client.request_body(&request(false));
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_anthropic_body_adds_json_instruction() {
        let client = AnthropicClient::new(&config(LlmProvider::Anthropic, None), "claude").unwrap();

        let body = client.request_body(&request(true));
        let system = body["system"].as_str().unwrap();
        assert!(system.starts_with("system"));
        assert!(system.contains("valid JSON object"));
        assert_eq!(body["max_tokens"], 256);

        let body = client.request_body(&request(false));
        assert_eq!(body["system"], "system");
    }

    #[test]
    fn test_openai_parse_response() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"{\"sql\":\"SELECT 1\"}"}}]}"#;
        assert_eq!(
            OpenAiClient::parse_response(body).unwrap(),
            r#"{"sql":"SELECT 1"}"#
        );

        assert!(matches!(
            OpenAiClient::parse_response(r#"{"choices":[]}"#),
            Err(LlmError::EmptyResponse)
        ));
        assert!(matches!(
            OpenAiClient::parse_response("not json"),
            Err(LlmError::Decode(_))
        ));
    }

    #[test]
    fn test_anthropic_parse_response_joins_text_blocks() {
        let body = r#"{"content":[{"type":"text","text":"Hello "},{"type":"text","text":"there"}]}"#;
        assert_eq!(AnthropicClient::parse_response(body).unwrap(), "Hello there");

        assert!(matches!(
            AnthropicClient::parse_response(r#"{"content":[]}"#),
            Err(LlmError::EmptyResponse)
        ));
    }
}
