//! Protocol handler that serves `initialize`, `ping`, `tools/list` and
//! `tools/call` from a set of registered [`McpTool`]s.

use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    serde_json::{Map, Value, json},
    telegate_common::{BridgeError, BridgeResult},
    tracing::{debug, info, warn},
};

use crate::{
    envelope::CanonicalRequest,
    traits::{McpTool, ProtocolHandler},
    types::{
        InitializeResult, JsonRpcError, JsonRpcResponse, McpToolDef, PROTOCOL_VERSION,
        ServerCapabilities, ServerInfo, ToolsCallParams, ToolsCallResult, ToolsCapability,
        ToolsListResult, error_codes, methods,
    },
};

pub struct ToolDispatcher {
    server_name: String,
    version: String,
    tools: Vec<Arc<dyn McpTool>>,
    index: HashMap<String, usize>,
}

impl ToolDispatcher {
    /// A dispatcher with only the built-in `ping` tool registered.
    pub fn new(server_name: impl Into<String>, version: impl Into<String>) -> Self {
        let mut dispatcher = Self {
            server_name: server_name.into(),
            version: version.into(),
            tools: Vec::new(),
            index: HashMap::new(),
        };
        dispatcher.register(Arc::new(PingTool));
        dispatcher
    }

    /// Register a tool; a tool with the same name is replaced.
    pub fn register(&mut self, tool: Arc<dyn McpTool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            },
        }
    }

    #[must_use]
    pub fn tool_names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    #[must_use]
    pub fn tool_defs(&self) -> Vec<McpToolDef> {
        self.tools
            .iter()
            .map(|t| McpToolDef {
                name: t.name().to_string(),
                description: Some(t.description().to_string()),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    fn initialize_result(&self) -> InitializeResult {
        InitializeResult {
            protocol_version: PROTOCOL_VERSION.into(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: false,
                }),
            },
            server_info: ServerInfo {
                name: self.server_name.clone(),
                version: self.version.clone(),
            },
        }
    }

    async fn call_tool(&self, params: Option<Map<String, Value>>) -> Result<Value, JsonRpcError> {
        let ToolsCallParams { name, arguments } =
            serde_json::from_value(Value::Object(params.unwrap_or_default()))
                .ok()
                .filter(|p: &ToolsCallParams| !p.name.is_empty())
                .ok_or_else(|| {
                    JsonRpcError::new(
                        error_codes::INVALID_PARAMS,
                        "tools/call requires a string 'name'",
                    )
                })?;
        let arguments = match arguments {
            Value::Object(args) => Value::Object(args),
            Value::Null => Value::Object(Map::new()),
            _ => {
                return Err(JsonRpcError::new(
                    error_codes::INVALID_PARAMS,
                    "tools/call 'arguments' must be an object",
                ));
            },
        };

        let Some(tool) = self.index.get(&name).map(|&slot| &self.tools[slot]) else {
            return Err(JsonRpcError::new(
                error_codes::INVALID_PARAMS,
                format!("unknown tool '{name}'"),
            ));
        };

        debug!(tool = %name, "calling tool");
        match tool.call(arguments).await {
            Ok(value) => to_value(ToolsCallResult::from_value(value)),
            Err(e) => {
                info!(tool = %name, kind = %e.kind, error = %e.message, "tool call failed");
                Err(tool_error(&e))
            },
        }
    }
}

#[async_trait]
impl ProtocolHandler for ToolDispatcher {
    async fn handle(&self, request: CanonicalRequest) -> Option<JsonRpcResponse> {
        let CanonicalRequest {
            id, method, params, ..
        } = request;

        if method.starts_with(methods::NOTIFICATION_PREFIX) {
            debug!(method = %method, "notification received");
            return None;
        }

        let outcome = match method.as_str() {
            methods::INITIALIZE => to_value(self.initialize_result()),
            methods::PING => Ok(json!({})),
            methods::TOOLS_LIST => to_value(ToolsListResult {
                tools: self.tool_defs(),
            }),
            methods::TOOLS_CALL => self.call_tool(params).await,
            other => Err(JsonRpcError::new(
                error_codes::METHOD_NOT_FOUND,
                format!("method '{other}' not found"),
            )),
        };

        // Without an id the caller asked for no response.
        let Some(id) = id else {
            if let Err(e) = &outcome {
                debug!(method = %method, error = %e.message, "notification-style request failed");
            }
            return None;
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }
}

fn to_value<T: serde::Serialize>(value: T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| {
        warn!(error = %e, "failed to serialize result");
        JsonRpcError::new(error_codes::INTERNAL_ERROR, "failed to serialize result")
    })
}

/// Render a classified tool failure as a JSON-RPC error object.
fn tool_error(err: &BridgeError) -> JsonRpcError {
    let mut data = json!({
        "kind": err.kind,
        "status": err.kind.http_status(),
    });
    if let (Some(details), Some(obj)) = (&err.details, data.as_object_mut()) {
        obj.insert("details".into(), details.clone());
    }
    JsonRpcError {
        code: err.kind.jsonrpc_code(),
        message: err.message.clone(),
        data: Some(data),
    }
}

/// Liveness probe that never touches the provider.
pub struct PingTool;

#[async_trait]
impl McpTool for PingTool {
    fn name(&self) -> &str {
        "ping"
    }

    fn description(&self) -> &str {
        "Check that the bridge is reachable. Returns {\"pong\": true}."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}})
    }

    async fn call(&self, _arguments: Value) -> BridgeResult<Value> {
        Ok(json!({"pong": true}))
    }
}
