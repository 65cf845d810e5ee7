//! Application configuration management.

use std::collections::HashMap;

use serde::Deserialize;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// JWT configuration.
    pub jwt: JwtSettings,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// LLM provider settings. The assistant is disabled when absent.
    #[serde(default)]
    pub llm: Option<LlmConfig>,
    /// Tool-calling subprocess settings. Queries run in-process when absent.
    #[serde(default)]
    pub mcp: Option<McpConfig>,
    /// Assistant pipeline tuning.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

/// JWT configuration as read from config files.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtSettings {
    /// Shared secret used to verify identity-provider tokens.
    pub secret: String,
    /// Lifetime of tokens minted locally (seeder, tests) in seconds.
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry_secs: u64,
    /// Required `iss` claim, when the identity provider sets one.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Required `aud` claim, when the identity provider sets one.
    #[serde(default)]
    pub audience: Option<String>,
    /// Clock skew tolerated on expiry, in seconds.
    #[serde(default = "default_leeway")]
    pub leeway_secs: u64,
}

fn default_access_token_expiry() -> u64 {
    900 // 15 minutes
}

fn default_leeway() -> u64 {
    60
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable, multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
    /// Default `EnvFilter` directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "invora=debug,tower_http=debug".to_string()
}

/// Supported LLM vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// Anthropic messages API.
    Anthropic,
}

/// LLM provider configuration.
#[derive(Clone, Deserialize)]
pub struct LlmConfig {
    /// Vendor.
    pub provider: LlmProvider,
    /// API key.
    pub api_key: String,
    /// Base URL override (proxies, self-hosted gateways).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model used to turn questions into SQL.
    pub sql_model: String,
    /// Model used to summarize results. Defaults to `sql_model`.
    #[serde(default)]
    pub summary_model: Option<String>,
    /// Sampling temperature.
    #[serde(default)]
    pub temperature: f32,
    /// Completion token ceiling.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Per-request timeout in seconds.
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &"[hidden]")
            .field("base_url", &self.base_url)
            .field("sql_model", &self.sql_model)
            .field("summary_model", &self.summary_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// Returns the model used for summarization.
    #[must_use]
    pub fn summary_model(&self) -> &str {
        self.summary_model.as_deref().unwrap_or(&self.sql_model)
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_llm_timeout() -> u64 {
    60
}

/// Tool-calling subprocess configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct McpConfig {
    /// Executable to spawn.
    pub command: String,
    /// Arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment for the subprocess.
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Name of the tool that runs read-only SQL.
    #[serde(default = "default_tool_name")]
    pub tool_name: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_mcp_timeout")]
    pub timeout_secs: u64,
}

fn default_tool_name() -> String {
    "query".to_string()
}

fn default_mcp_timeout() -> u64 {
    30
}

/// Assistant pipeline configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AssistantConfig {
    /// Generation attempts before giving up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Row ceiling enforced on generated SQL.
    #[serde(default = "default_max_rows")]
    pub max_rows: u32,
    /// Rows shown to the summarization model.
    #[serde(default = "default_summary_row_limit")]
    pub summary_row_limit: usize,
    /// Longest accepted question, in characters.
    #[serde(default = "default_max_question_length")]
    pub max_question_length: usize,
    /// Tables the model may query.
    #[serde(default = "default_exposed_tables")]
    pub exposed_tables: Vec<String>,
    /// Answer returned when every attempt failed.
    #[serde(default = "default_fallback_message")]
    pub fallback_message: String,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            max_rows: default_max_rows(),
            summary_row_limit: default_summary_row_limit(),
            max_question_length: default_max_question_length(),
            exposed_tables: default_exposed_tables(),
            fallback_message: default_fallback_message(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_max_rows() -> u32 {
    200
}

fn default_summary_row_limit() -> usize {
    50
}

fn default_max_question_length() -> usize {
    500
}

fn default_exposed_tables() -> Vec<String> {
    vec!["invoices".to_string(), "invoice_items".to_string()]
}

fn default_fallback_message() -> String {
    "Sorry, I could not answer that question from your data. Please try rephrasing it."
        .to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(config::Environment::with_prefix("INVORA").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
