// ABOUTME: A single MCP session bound to one user identity for its whole lifetime
// ABOUTME: every JSON-RPC tools/call on it is rewritten to (tool, args, user) and dispatched

use std::sync::Arc;

use broker_core::User;
use broker_coordinator::Coordinator;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::protocol::{
    initialize_result, CallToolParams, CallToolResult, JsonRpcRequest, JsonRpcResponse,
    ListToolsResult, INVALID_PARAMS, METHOD_NOT_FOUND,
};

/// One MCP client connection. The user identity is resolved once, at
/// connect time, and never re-checked: every tool call on this session
/// runs as that user.
pub struct McpSession {
    pub id: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
    coordinator: Arc<Coordinator>,
}

impl McpSession {
    pub fn new(user: User, coordinator: Arc<Coordinator>) -> Self {
        Self {
            id: format!("mcps_{}", Uuid::new_v4()),
            user,
            created_at: Utc::now(),
            coordinator,
        }
    }

    /// Handle one JSON-RPC request, returning the JSON-RPC response to emit
    /// on this session's event stream. Never returns an `Err` — protocol and
    /// dispatch failures are both folded into a JSON-RPC response.
    pub async fn handle(&self, raw: Value) -> JsonRpcResponse {
        let request: JsonRpcRequest = match serde_json::from_value(raw) {
            Ok(r) => r,
            Err(e) => {
                return JsonRpcResponse::failure(
                    Value::Null,
                    crate::protocol::PARSE_ERROR,
                    format!("malformed JSON-RPC request: {e}"),
                )
            }
        };
        let id = request.id.clone().unwrap_or(Value::Null);

        debug!(
            session = %self.id,
            user_id = %self.user.id,
            method = %request.method,
            "mcp request"
        );

        match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(
                id,
                serde_json::to_value(initialize_result()).unwrap_or(Value::Null),
            ),
            "ping" => JsonRpcResponse::success(id, json!({})),
            "tools/list" => self.handle_tools_list(id),
            "tools/call" => self.handle_tools_call(id, request.params).await,
            other => {
                JsonRpcResponse::failure(id, METHOD_NOT_FOUND, format!("unknown method: {other}"))
            }
        }
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let result = ListToolsResult {
            tools: broker_tools::catalog(),
            next_cursor: None,
        };
        JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
    }

    async fn handle_tools_call(&self, id: Value, params: Option<Value>) -> JsonRpcResponse {
        let params: CallToolParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::failure(
                        id,
                        INVALID_PARAMS,
                        format!("invalid tools/call params: {e}"),
                    )
                }
            },
            None => {
                return JsonRpcResponse::failure(id, INVALID_PARAMS, "missing tools/call params")
            }
        };

        let arguments = params.arguments.unwrap_or(Value::Null);
        match broker_tools::dispatch(&params.name, arguments, &self.user.id, &self.coordinator)
            .await
        {
            Ok(value) => {
                let result = CallToolResult::ok(value);
                JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
            }
            Err(err) => {
                warn!(
                    session = %self.id,
                    user_id = %self.user.id,
                    tool = %params.name,
                    error = %err,
                    "tool call failed"
                );
                let result = CallToolResult::err(err.to_string());
                JsonRpcResponse::success(id, serde_json::to_value(result).unwrap_or(Value::Null))
            }
        }
    }
}
