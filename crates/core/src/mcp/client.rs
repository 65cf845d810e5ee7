//! Stdio client for a Model Context Protocol server.

use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use invora_shared::McpConfig;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

use super::protocol::{
    InitializeResult, JSONRPC_VERSION, JsonRpcNotification, JsonRpcRequest, JsonRpcResponse,
    PROTOCOL_VERSION, ToolCallResult, ToolDescriptor, ToolsListResult,
};

/// Name sent in `clientInfo`.
pub const CLIENT_NAME: &str = "invora";

/// MCP client errors.
#[derive(Debug, Error)]
pub enum McpError {
    /// The server process could not be started.
    #[error("Failed to start MCP server: {0}")]
    Spawn(std::io::Error),

    /// Reading or writing the pipe failed.
    #[error("MCP I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed its output.
    #[error("MCP server closed the connection")]
    ConnectionClosed,

    /// No response within the configured timeout.
    #[error("MCP request {method} timed out after {secs}s")]
    Timeout {
        /// Method that timed out.
        method: String,
        /// Timeout in seconds.
        secs: u64,
    },

    /// The server returned a JSON-RPC error.
    #[error("MCP error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message.
        message: String,
    },

    /// A message could not be encoded or a result decoded.
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// The configured tool is not offered by the server.
    #[error("MCP server does not provide tool '{0}'")]
    ToolNotFound(String),
}

type Reader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type Writer = Box<dyn AsyncWrite + Send + Unpin>;

struct Connection {
    reader: Reader,
    writer: Writer,
}

impl Connection {
    async fn send_line(&mut self, line: &str) -> Result<(), McpError> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Reads until the response to `id`, skipping notifications, replies to
    /// abandoned requests and non-JSON log output.
    async fn read_response(&mut self, id: u64) -> Result<Value, McpError> {
        let expected = json!(id);
        let mut line = String::new();
        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Err(McpError::ConnectionClosed);
            }
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let Ok(message) = serde_json::from_str::<JsonRpcResponse>(trimmed) else {
                tracing::debug!(line = %trimmed, "Skipping non-JSON-RPC output from MCP server");
                continue;
            };
            if message.id.as_ref() != Some(&expected) {
                continue;
            }
            if let Some(error) = message.error {
                return Err(McpError::Rpc {
                    code: error.code,
                    message: error.message,
                });
            }
            return Ok(message.result.unwrap_or(Value::Null));
        }
    }
}

/// JSON-RPC client over newline-delimited streams. One request is in
/// flight at a time.
pub struct McpClient {
    connection: Mutex<Connection>,
    next_id: AtomicU64,
    timeout: Duration,
    // Held so the process is killed when the client drops.
    _child: Option<Child>,
}

impl McpClient {
    /// Starts the configured server process and attaches to its stdio.
    pub fn spawn(config: &McpConfig) -> Result<Self, McpError> {
        let mut child = Command::new(&config.command)
            .args(&config.args)
            .envs(&config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(McpError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Protocol("server stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Protocol("server stdout unavailable".to_string()))?;

        tracing::info!(command = %config.command, "Started MCP server");
        Ok(Self::with_streams(
            Box::new(stdout),
            Box::new(stdin),
            Duration::from_secs(config.timeout_secs),
            Some(child),
        ))
    }

    /// Attaches to an already-open pair of streams.
    pub fn connect<R, W>(reader: R, writer: W, timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self::with_streams(Box::new(reader), Box::new(writer), timeout, None)
    }

    fn with_streams(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: Writer,
        timeout: Duration,
        child: Option<Child>,
    ) -> Self {
        Self {
            connection: Mutex::new(Connection {
                reader: BufReader::new(reader),
                writer,
            }),
            next_id: AtomicU64::new(1),
            timeout,
            _child: child,
        }
    }

    /// Performs the `initialize` handshake and sends `notifications/initialized`.
    pub async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let result: InitializeResult = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": CLIENT_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )
            .await?;
        self.notify("notifications/initialized").await?;

        tracing::info!(
            protocol = %result.protocol_version,
            server = result.server_info.as_ref().map_or("unknown", |s| s.name.as_str()),
            "MCP session initialized"
        );
        Ok(result)
    }

    /// Lists the server's tools.
    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpError> {
        let result: ToolsListResult = self.request("tools/list", json!({})).await?;
        Ok(result.tools)
    }

    /// Fails unless the server offers `name`.
    pub async fn require_tool(&self, name: &str) -> Result<(), McpError> {
        if self.list_tools().await?.iter().any(|t| t.name == name) {
            Ok(())
        } else {
            Err(McpError::ToolNotFound(name.to_string()))
        }
    }

    /// Calls a tool.
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<ToolCallResult, McpError> {
        self.request("tools/call", json!({"name": name, "arguments": arguments}))
            .await
    }

    pub(crate) async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Value,
    ) -> Result<T, McpError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let line = serde_json::to_string(&JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        })
        .map_err(|e| McpError::Protocol(e.to_string()))?;

        let mut connection = self.connection.lock().await;
        let exchange = async {
            connection.send_line(&line).await?;
            connection.read_response(id).await
        };
        let value = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| McpError::Timeout {
                method: method.to_string(),
                secs: self.timeout.as_secs(),
            })??;

        serde_json::from_value(value).map_err(|e| McpError::Protocol(format!("{method}: {e}")))
    }

    async fn notify(&self, method: &str) -> Result<(), McpError> {
        let line = serde_json::to_string(&JsonRpcNotification {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: None,
        })
        .map_err(|e| McpError::Protocol(e.to_string()))?;
        self.connection.lock().await.send_line(&line).await
    }
}
