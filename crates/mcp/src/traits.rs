//! Seams between the session layer, the protocol layer and the tools.
//!
//! The session registry only knows [`ProtocolHandler`]; the dispatcher only
//! knows [`McpTool`]. Tests substitute either side.

use {async_trait::async_trait, serde_json::Value, telegate_common::BridgeResult};

use crate::{envelope::CanonicalRequest, types::JsonRpcResponse};

/// Processes one canonical request and produces the response frame, if any.
///
/// Returns `None` for notifications.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    async fn handle(&self, request: CanonicalRequest) -> Option<JsonRpcResponse>;
}

/// A callable operation advertised over `tools/list`.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema for the `arguments` object.
    fn input_schema(&self) -> Value;

    async fn call(&self, arguments: Value) -> BridgeResult<Value>;
}
