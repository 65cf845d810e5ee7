//! Client and executor tests against an in-process fake server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};
use tokio::sync::Mutex;

use super::*;
use crate::assistant::{ExecutorError, QueryExecutor};
use invora_shared::TenantId;

type Received = Arc<Mutex<Vec<Value>>>;

fn reply(id: &Value, result: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "result": result})
}

/// Answers the handful of methods the client uses.
async fn fake_server(stream: DuplexStream, received: Received) {
    let (read_half, mut write_half) = tokio::io::split(stream);
    let mut lines = BufReader::new(read_half).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let message: Value = serde_json::from_str(&line).unwrap();
        received.lock().await.push(message.clone());

        let Some(id) = message.get("id").cloned() else {
            continue;
        };
        let params = &message["params"];
        let mut out = Vec::new();

        match message["method"].as_str().unwrap_or_default() {
            "initialize" => {
                out.push("fake server starting".to_string());
                out.push(
                    json!({"jsonrpc": "2.0", "method": "notifications/message", "params": {}})
                        .to_string(),
                );
                out.push(
                    reply(
                        &id,
                        json!({
                            "protocolVersion": "2024-11-05",
                            "capabilities": {"tools": {}},
                            "serverInfo": {"name": "fake", "version": "0.1.0"}
                        }),
                    )
                    .to_string(),
                );
            }
            "tools/list" => out.push(
                reply(
                    &id,
                    json!({"tools": [{"name": "query", "description": "Run SQL", "inputSchema": {"type": "object"}}]}),
                )
                .to_string(),
            ),
            "tools/call" if params["name"] == "slow" => {}
            "tools/call" => {
                let sql = params["arguments"]["sql"].as_str().unwrap_or_default();
                let result = if sql.contains("boom") {
                    json!({"content": [{"type": "text", "text": "relation \"boom\" does not exist"}], "isError": true})
                } else {
                    json!({"content": [{"type": "text", "text": "[{\"n\": 1}, {\"n\": 2}]"}]})
                };
                out.push(reply(&id, result).to_string());
            }
            _ => out.push(
                json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}})
                    .to_string(),
            ),
        }

        for line in out {
            write_half.write_all(line.as_bytes()).await.unwrap();
            write_half.write_all(b"\n").await.unwrap();
        }
        write_half.flush().await.unwrap();
    }
}

fn start(timeout: Duration) -> (Arc<McpClient>, Received) {
    let (client_end, server_end) = tokio::io::duplex(16 * 1024);
    let received = Received::default();
    tokio::spawn(fake_server(server_end, Arc::clone(&received)));

    let (reader, writer) = tokio::io::split(client_end);
    (Arc::new(McpClient::connect(reader, writer, timeout)), received)
}

#[tokio::test]
async fn test_initialize_handshake() {
    let (client, received) = start(Duration::from_secs(5));

    let result = client.initialize().await.unwrap();
    assert_eq!(result.protocol_version, "2024-11-05");
    assert_eq!(result.server_info.unwrap().name, "fake");

    // the notification is written before initialize returns
    client.list_tools().await.unwrap();
    let received = received.lock().await;
    assert_eq!(received[0]["method"], "initialize");
    assert_eq!(received[0]["params"]["clientInfo"]["name"], "invora");
    assert_eq!(received[0]["params"]["protocolVersion"], "2024-11-05");
    assert_eq!(received[1]["method"], "notifications/initialized");
    assert!(received[1].get("id").is_none());
}

#[tokio::test]
async fn test_request_ids_increase() {
    let (client, received) = start(Duration::from_secs(5));

    client.list_tools().await.unwrap();
    client.list_tools().await.unwrap();

    let received = received.lock().await;
    assert_eq!(received[0]["id"], 1);
    assert_eq!(received[1]["id"], 2);
}

#[tokio::test]
async fn test_require_tool() {
    let (client, _) = start(Duration::from_secs(5));

    client.require_tool("query").await.unwrap();
    assert!(matches!(
        client.require_tool("shell").await,
        Err(McpError::ToolNotFound(name)) if name == "shell"
    ));
}

#[tokio::test]
async fn test_call_tool_returns_content() {
    let (client, _) = start(Duration::from_secs(5));

    let result = client
        .call_tool("query", json!({"sql": "SELECT 1"}))
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.first_text(), Some("[{\"n\": 1}, {\"n\": 2}]"));
}

#[tokio::test]
async fn test_timeout_then_recovers() {
    let (client, _) = start(Duration::from_millis(100));

    assert!(matches!(
        client.call_tool("slow", json!({})).await,
        Err(McpError::Timeout { .. })
    ));
    assert_eq!(client.list_tools().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_closed_connection() {
    let (client_end, server_end) = tokio::io::duplex(1024);
    tokio::spawn(async move {
        let mut lines = BufReader::new(server_end).lines();
        let _ = lines.next_line().await;
    });
    let (reader, writer) = tokio::io::split(client_end);
    let client = McpClient::connect(reader, writer, Duration::from_secs(5));

    assert!(matches!(
        client.list_tools().await,
        Err(McpError::ConnectionClosed)
    ));
}

#[tokio::test]
async fn test_executor_parses_rows() {
    let (client, received) = start(Duration::from_secs(5));
    let executor = McpQueryExecutor::new(client, "query");

    let rows = executor
        .execute(TenantId::new(), "SELECT n FROM t LIMIT 200")
        .await
        .unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.columns, vec!["n"]);

    let received = received.lock().await;
    assert_eq!(received[0]["params"]["name"], "query");
    assert_eq!(received[0]["params"]["arguments"]["sql"], "SELECT n FROM t LIMIT 200");
}

#[tokio::test]
async fn test_executor_maps_tool_error() {
    let (client, _) = start(Duration::from_secs(5));
    let executor = McpQueryExecutor::new(client, "query");

    match executor.execute(TenantId::new(), "SELECT * FROM boom").await {
        Err(ExecutorError::Tool(message)) => assert!(message.contains("does not exist")),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_rpc_error_is_surfaced() {
    let (client, _) = start(Duration::from_secs(5));

    match client.request::<Value>("resources/list", json!({})).await {
        Err(McpError::Rpc { code, message }) => {
            assert_eq!(code, -32601);
            assert_eq!(message, "Method not found");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}
