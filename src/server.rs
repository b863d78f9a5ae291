//! MCP server speaking line-delimited JSON-RPC 2.0 over stdio.
//!
//! Requests are handled concurrently, one task each; a single writer task owns the
//! output stream so responses never interleave. Diagnostics go to `tracing`, never
//! to stdout.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, AsyncWrite, AsyncWriteExt as _, BufReader};
use tokio::sync::mpsc;

use crate::Result;
use crate::dispatch::Dispatcher;
use crate::error::Error;

/// Protocol revision answered when the client asks for none or for one we do not speak.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Revisions echoed back when a client requests them.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-03-26", PROTOCOL_VERSION];
pub const SERVER_NAME: &str = "delta-exchange";

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;
}

/// Incoming request or notification. Notifications have no `id` member at all;
/// `"id": null` is still a request.
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcError {
    fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_owned(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallToolParams {
    name: String,
    #[serde(default)]
    arguments: Option<Map<String, Value>>,
}

/// Exposes a [`Dispatcher`] as MCP `tools/list` and `tools/call`.
#[derive(Clone, Debug)]
pub struct Server {
    dispatcher: Arc<Dispatcher>,
}

impl Server {
    #[must_use]
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
        }
    }

    /// Serves stdin/stdout until stdin closes.
    pub async fn serve_stdio(self) -> Result<()> {
        self.serve(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await
    }

    /// Reads one message per line from `reader` and writes responses to `writer`.
    ///
    /// Returns after EOF once every in-flight request has been answered.
    pub async fn serve<R, W>(self, reader: R, writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<JsonRpcResponse>();

        let writer_task = tokio::spawn(async move {
            let mut writer = writer;
            while let Some(response) = rx.recv().await {
                let mut line = serde_json::to_vec(&response)?;
                line.push(b'\n');
                writer.write_all(&line).await?;
                writer.flush().await?;
            }
            Ok::<_, std::io::Error>(())
        });

        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let server = self.clone();
            let tx = tx.clone();
            tokio::spawn(async move {
                // The receiver only goes away if the writer failed; that error is reported below.
                if let Some(response) = server.handle_message(&line).await
                    && tx.send(response).is_err()
                {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("response dropped, writer already stopped");
                }
            });
        }
        drop(tx);

        #[cfg(feature = "tracing")]
        tracing::info!("input closed, draining in-flight requests");

        writer_task
            .await
            .map_err(|e| Error::internal(format!("response writer task failed: {e}")))??;
        Ok(())
    }

    /// Handles one raw line. Returns `None` for notifications.
    pub async fn handle_message(&self, line: &str) -> Option<JsonRpcResponse> {
        let value = match serde_json::from_str::<Value>(line) {
            Ok(value) => value,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(error_codes::PARSE_ERROR, format!("parse error: {e}")),
                ));
            }
        };

        let id = value.get("id").cloned();
        let request = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::failure(
                    id.unwrap_or(Value::Null),
                    JsonRpcError::new(error_codes::INVALID_REQUEST, format!("invalid request: {e}")),
                ));
            }
        };

        let Some(id) = id else {
            #[cfg(feature = "tracing")]
            tracing::debug!(method = %request.method, "notification");
            return None;
        };

        let response = match self.handle_request(&request.method, request.params).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        };
        Some(response)
    }

    async fn handle_request(
        &self,
        method: &str,
        params: Option<Value>,
    ) -> std::result::Result<Value, JsonRpcError> {
        match method {
            "initialize" => Ok(initialize_result(params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.tool_list() })),
            "tools/call" => {
                let params: CallToolParams =
                    serde_json::from_value(params.unwrap_or(Value::Null)).map_err(|e| {
                        JsonRpcError::new(
                            error_codes::INVALID_PARAMS,
                            format!("invalid tools/call params: {e}"),
                        )
                    })?;
                let arguments = params.arguments.unwrap_or_default();

                let result = self.dispatcher.invoke(&params.name, &arguments).await;
                serde_json::to_value(result)
                    .map_err(|e| JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string()))
            }
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        }
    }

    fn tool_list(&self) -> Vec<Value> {
        self.dispatcher
            .definitions()
            .iter()
            .map(|definition| {
                json!({
                    "name": definition.name,
                    "description": definition.description,
                    "inputSchema": definition.input_schema(),
                })
            })
            .collect()
    }
}

fn initialize_result(params: Option<&Value>) -> Value {
    let version = params
        .and_then(|p| p.get("protocolVersion"))
        .and_then(Value::as_str)
        .filter(|requested| SUPPORTED_PROTOCOL_VERSIONS.contains(requested))
        .unwrap_or(PROTOCOL_VERSION);

    json!({
        "protocolVersion": version,
        "capabilities": { "tools": { "listChanged": false } },
        "serverInfo": { "name": SERVER_NAME, "version": env!("CARGO_PKG_VERSION") },
    })
}

#[cfg(test)]
#[expect(clippy::missing_assert_message, reason = "each test name states the expectation")]
mod tests {
    use secrecy::SecretString;
    use tokio::io::AsyncReadExt as _;

    use super::*;
    use crate::auth::Credentials;
    use crate::exchange::Config;

    fn server() -> Server {
        let config = Config::builder()
            .credentials(Credentials::new("key", SecretString::from("secret")))
            .host("http://127.0.0.1:9")
            .build();
        Server::new(Dispatcher::from_config(config).expect("dispatcher builds"))
    }

    #[tokio::test]
    async fn initialize_echoes_protocol_version() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26"}}"#)
            .await
            .expect("response");

        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], "2025-03-26");
        assert_eq!(result["serverInfo"]["name"], SERVER_NAME);
        assert!(result["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn initialize_falls_back_for_unknown_version() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01"}}"#)
            .await
            .expect("response");

        let result = response.result.expect("result");
        assert_eq!(result["protocolVersion"], PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn null_id_is_answered() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":null,"method":"ping"}"#)
            .await
            .expect("null id is a request, not a notification");

        assert_eq!(response.id, Value::Null);
        assert_eq!(response.result, Some(json!({})));
    }

    #[tokio::test]
    async fn notifications_get_no_response() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;

        assert!(response.is_none());
    }

    #[tokio::test]
    async fn tools_list_exposes_catalog() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":"a","method":"tools/list"}"#)
            .await
            .expect("response");

        let tools = response.result.expect("result")["tools"].clone();
        let names: Vec<&str> = tools
            .as_array()
            .expect("array")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(names.contains(&"place_order"));
        assert_eq!(tools[0]["inputSchema"]["type"], "object");
        assert_eq!(response.id, json!("a"));
    }

    #[tokio::test]
    async fn tools_call_unknown_tool_is_tool_error() {
        let response = server()
            .handle_message(r#"{"jsonrpc":"2.0","id":7,"method":"tools/call","params":{"name":"delete_everything","arguments":{}}}"#)
            .await
            .expect("response");

        let result = response.result.expect("result");
        assert_eq!(result["isError"], true);
        assert_eq!(result["content"][0]["text"], "Unknown tool: delete_everything");
    }

    #[tokio::test]
    async fn protocol_errors() {
        let server = server();

        let response = server.handle_message("{not json").await.expect("response");
        assert_eq!(response.id, Value::Null);
        assert_eq!(response.error.expect("error").code, error_codes::PARSE_ERROR);

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"resources/list"}"#)
            .await
            .expect("response");
        assert_eq!(response.error.expect("error").code, error_codes::METHOD_NOT_FOUND);

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"arguments":{}}}"#)
            .await
            .expect("response");
        assert_eq!(response.error.expect("error").code, error_codes::INVALID_PARAMS);

        let response = server
            .handle_message(r#"{"jsonrpc":"2.0","id":4,"params":{}}"#)
            .await
            .expect("response");
        assert_eq!(response.id, json!(4));
        assert_eq!(response.error.expect("error").code, error_codes::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn serve_answers_every_request_then_exits() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":3,"method":"ping"}"#,
            "\n",
        );
        let (writer, mut output) = tokio::io::duplex(64 * 1024);

        server()
            .serve(input.as_bytes(), writer)
            .await
            .expect("serve completes");

        let mut raw = String::new();
        output.read_to_string(&mut raw).await.expect("read output");
        let mut ids: Vec<i64> = raw
            .lines()
            .map(|line| serde_json::from_str::<JsonRpcResponse>(line).expect("valid response"))
            .filter_map(|response| response.id.as_i64())
            .collect();
        ids.sort_unstable();

        assert_eq!(ids, [1, 2, 3]);
    }
}
