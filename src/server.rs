//! MCP server implementation.
//!
//! Handles JSON-RPC 2.0 according to the MCP protocol specification. The
//! dispatcher is transport-agnostic: [`McpServer::handle_message`] turns one raw
//! message into at most one response, and [`McpServer::run`] drives it over
//! stdin/stdout.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value as JsonValue};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::error::{rpc_codes, Result};
use crate::session::McpSession;
use crate::tools::ToolRegistry;

/// MCP protocol version we support.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Server information.
pub const SERVER_NAME: &str = "capsule-mcp";
/// Server version reported in `serverInfo`.
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    #[serde(default)]
    pub jsonrpc: String,
    /// `None` when the member is absent; an explicit `null` is `Some(Null)`.
    #[serde(default, deserialize_with = "present")]
    pub id: Option<JsonValue>,
    pub method: String,
    #[serde(default)]
    pub params: Option<JsonValue>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<JsonValue>, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(Some)
}

impl JsonRpcRequest {
    /// Notifications carry no id and never get a response.
    pub fn is_notification(&self) -> bool {
        self.id.is_none() && self.method.starts_with("notifications/")
    }

    fn response_id(&self) -> JsonValue {
        self.id.clone().unwrap_or(JsonValue::Null)
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: JsonValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: JsonValue, result: JsonValue) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: JsonValue, code: i32, message: String) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError { code, message }),
        }
    }
}

/// MCP server.
pub struct McpServer {
    session: McpSession,
    registry: ToolRegistry,
}

impl McpServer {
    /// Create a new MCP server with the given session.
    pub fn new(session: McpSession) -> Self {
        Self {
            session,
            registry: ToolRegistry::new(),
        }
    }

    /// The tools this server advertises.
    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// The session backing tool calls.
    pub fn session(&self) -> &McpSession {
        &self.session
    }

    /// Run the server, reading from stdin and writing to stdout.
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        tracing::info!("serving MCP over stdio");
        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                // EOF - client disconnected
                break;
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let Some(response) = self.handle_message(line) else {
                continue;
            };

            // Send response
            let response_json = serde_json::to_string(&response)?;
            stdout.write_all(response_json.as_bytes()).await?;
            stdout.write_all(b"\n").await?;
            stdout.flush().await?;
        }

        Ok(())
    }

    /// Handle one raw JSON-RPC message. Returns `None` for notifications.
    pub fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        self.handle_bytes(raw.as_bytes())
    }

    /// Handle one undecoded message body. Invalid UTF-8 is a parse error.
    pub fn handle_bytes(&self, raw: &[u8]) -> Option<JsonRpcResponse> {
        match serde_json::from_slice::<JsonValue>(raw) {
            Ok(value) => self.handle_value(value),
            Err(e) => {
                tracing::debug!(error = %e, "unparseable JSON-RPC message");
                Some(JsonRpcResponse::error(
                    JsonValue::Null,
                    rpc_codes::PARSE_ERROR,
                    "Parse error".to_string(),
                ))
            }
        }
    }

    /// Handle one decoded JSON-RPC message. Returns `None` for notifications.
    pub fn handle_value(&self, value: JsonValue) -> Option<JsonRpcResponse> {
        let id = value.get("id").cloned().unwrap_or(JsonValue::Null);

        let request = match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => request,
            Err(_) => {
                return Some(JsonRpcResponse::error(
                    id,
                    rpc_codes::INVALID_REQUEST,
                    "Invalid Request".to_string(),
                ))
            }
        };

        // A wrong version is answered even without an id
        if request.jsonrpc == "2.0" && request.is_notification() {
            tracing::debug!(method = %request.method, "notification received");
            return None;
        }

        Some(self.handle_request(request))
    }

    /// Handle a single JSON-RPC request.
    pub fn handle_request(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        let id = request.response_id();

        // Validate JSON-RPC version
        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                id,
                rpc_codes::INVALID_REQUEST,
                "Invalid Request".to_string(),
            );
        }

        tracing::debug!(method = %request.method, "handling request");

        // Route to appropriate handler
        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(id, self.initialize_result()),
            "ping" => JsonRpcResponse::success(id, serde_json::json!({})),
            "tools/list" => JsonRpcResponse::success(id, self.tools_list_result()),
            "tools/call" => self.handle_tools_call(id, request.params),
            other => JsonRpcResponse::error(
                id,
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            ),
        }
    }

    /// Result of the initialize request.
    fn initialize_result(&self) -> JsonValue {
        serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": SERVER_VERSION
            }
        })
    }

    /// Result of the tools/list request.
    fn tools_list_result(&self) -> JsonValue {
        serde_json::json!({ "tools": self.registry.tools() })
    }

    /// Server metadata and tool list, for non-RPC discovery.
    pub fn metadata(&self) -> JsonValue {
        serde_json::json!({
            "name": SERVER_NAME,
            "version": SERVER_VERSION,
            "description": "MCP server for a personal knowledge-capsule collection",
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {}
            },
            "tools": self.registry.tools(),
        })
    }

    /// Handle the tools/call request.
    fn handle_tools_call(&self, id: JsonValue, params: Option<JsonValue>) -> JsonRpcResponse {
        let params = match params {
            Some(JsonValue::Object(obj)) => obj,
            Some(JsonValue::Null) | None => Map::new(),
            Some(_) => {
                return JsonRpcResponse::error(
                    id,
                    rpc_codes::INVALID_PARAMS,
                    "Invalid params: params must be an object".to_string(),
                )
            }
        };

        let name = match params.get("name").and_then(|v| v.as_str()) {
            Some(n) => n.to_string(),
            None => {
                return JsonRpcResponse::error(
                    id,
                    rpc_codes::INVALID_PARAMS,
                    "Invalid params: missing tool name".to_string(),
                )
            }
        };

        let arguments = match params.get("arguments") {
            Some(JsonValue::Object(obj)) => obj.clone(),
            Some(JsonValue::Null) | None => Map::new(),
            Some(_) => {
                return JsonRpcResponse::error(
                    id,
                    rpc_codes::INVALID_PARAMS,
                    "Invalid params: 'arguments' must be an object".to_string(),
                )
            }
        };

        if self.registry.get(&name).is_none() {
            return JsonRpcResponse::error(
                id,
                rpc_codes::METHOD_NOT_FOUND,
                format!("Unknown tool: {}", name),
            );
        }

        // Dispatch the tool call
        match self.registry.dispatch(&self.session, &name, &arguments) {
            Ok(output) => {
                // MCP tool responses are wrapped in content array
                JsonRpcResponse::success(
                    id,
                    serde_json::json!({
                        "content": [{
                            "type": "text",
                            "text": output.text
                        }]
                    }),
                )
            }
            Err(err) => {
                tracing::warn!(tool = %name, error = %err, "tool call failed");
                JsonRpcResponse::error(
                    id,
                    err.rpc_code(),
                    format!("Error executing {}: {}", name, err),
                )
            }
        }
    }
}
