//! Normalization of inbound request payloads.
//!
//! Clients submit either a JSON-RPC 2.0 request or, when enabled, the flat
//! legacy `{id, tool, arguments}` envelope. Both end up as a single
//! [`CanonicalRequest`] before anything else in the bridge sees them.

use {
    serde::{Deserialize, Serialize},
    serde_json::{Map, Value},
    telegate_common::{BridgeError, BridgeResult, ErrorKind},
};

use crate::types::{JSONRPC_VERSION, methods};

/// Client spellings accepted for the canonical method names.
const METHOD_ALIASES: &[(&str, &str)] = &[
    ("tools.call", methods::TOOLS_CALL),
    ("tool/call", methods::TOOLS_CALL),
    ("callTool", methods::TOOLS_CALL),
    ("call_tool", methods::TOOLS_CALL),
    ("tools.list", methods::TOOLS_LIST),
    ("tool/list", methods::TOOLS_LIST),
    ("listTools", methods::TOOLS_LIST),
    ("list_tools", methods::TOOLS_LIST),
];

/// The single internal request shape.
///
/// `id` is `None` for notifications; otherwise it is a JSON string or number
/// echoed back unchanged in the response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Map<String, Value>>,
}

impl CanonicalRequest {
    pub fn new(id: Option<Value>, method: impl Into<String>, params: Option<Map<String, Value>>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method: method.into(),
            params,
        }
    }

    #[must_use]
    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }
}

/// An inbound payload before normalization.
#[derive(Debug, Clone)]
pub enum RawPayload {
    Text(String),
    Bytes(Vec<u8>),
    Json(Value),
}

impl From<String> for RawPayload {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for RawPayload {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<Value> for RawPayload {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    pub legacy_dialect: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            legacy_dialect: true,
        }
    }
}

/// Convert a raw payload into the canonical request shape.
///
/// Fails with `malformed_payload` when the payload is not a JSON object or
/// matches neither recognized envelope, and with `legacy_dialect_disabled`
/// when a legacy envelope arrives while that dialect is switched off.
pub fn normalize(raw: RawPayload, options: NormalizeOptions) -> BridgeResult<CanonicalRequest> {
    let value = match raw {
        RawPayload::Text(text) => serde_json::from_str(&text)
            .map_err(|e| BridgeError::malformed(format!("payload is not valid JSON: {e}")))?,
        RawPayload::Bytes(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| BridgeError::malformed(format!("payload is not valid JSON: {e}")))?,
        RawPayload::Json(value) => value,
    };

    let Value::Object(mut obj) = value else {
        return Err(BridgeError::malformed("payload must be a JSON object"));
    };

    if is_canonical(&obj) {
        let id = take_id(&mut obj);
        let method = match obj.remove("method") {
            Some(Value::String(m)) => canonical_method(m),
            _ => return Err(BridgeError::malformed("method must be a string")),
        };
        let params = match obj.remove("params") {
            Some(Value::Object(params)) => Some(params),
            _ => None,
        };
        return Ok(CanonicalRequest::new(id, method, params));
    }

    if is_legacy(&obj) {
        if !options.legacy_dialect {
            return Err(BridgeError::new(
                ErrorKind::LegacyDialectDisabled,
                "the flat {tool, arguments} envelope is disabled on this server",
            ));
        }
        let id = take_id(&mut obj)
            .unwrap_or_else(|| Value::String(uuid::Uuid::new_v4().to_string()));
        let name = obj.remove("tool").unwrap_or(Value::Null);
        let arguments = match obj.remove("arguments") {
            Some(Value::Object(args)) => Value::Object(args),
            _ => Value::Object(Map::new()),
        };
        let mut params = Map::new();
        params.insert("name".into(), name);
        params.insert("arguments".into(), arguments);
        return Ok(CanonicalRequest::new(
            Some(id),
            methods::TOOLS_CALL,
            Some(params),
        ));
    }

    Err(BridgeError::malformed(
        "payload matches neither a JSON-RPC 2.0 request nor a {tool, arguments} envelope",
    ))
}

fn is_canonical(obj: &Map<String, Value>) -> bool {
    obj.get("jsonrpc").and_then(Value::as_str) == Some(JSONRPC_VERSION)
        && obj
            .get("method")
            .and_then(Value::as_str)
            .is_some_and(|m| !m.trim().is_empty())
        && valid_id(obj.get("id"))
        && matches!(obj.get("params"), None | Some(Value::Null | Value::Object(_)))
}

fn is_legacy(obj: &Map<String, Value>) -> bool {
    obj.get("tool")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty())
        && valid_id(obj.get("id"))
}

fn valid_id(id: Option<&Value>) -> bool {
    matches!(id, None | Some(Value::Null | Value::String(_) | Value::Number(_)))
}

/// Remove the id, treating an explicit `null` like an absent one.
fn take_id(obj: &mut Map<String, Value>) -> Option<Value> {
    obj.remove("id").filter(|id| !id.is_null())
}

fn canonical_method(method: String) -> String {
    METHOD_ALIASES
        .iter()
        .find(|(alias, _)| *alias == method)
        .map_or(method, |(_, canonical)| (*canonical).to_string())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn norm(value: Value) -> BridgeResult<CanonicalRequest> {
        normalize(RawPayload::Json(value), NormalizeOptions::default())
    }

    #[test]
    fn canonical_request_passes_through() {
        let req = norm(json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": {"name": "send_message", "arguments": {"chat_id": "1"}}
        }))
        .unwrap();
        assert_eq!(req.id, Some(json!(7)));
        assert_eq!(req.method, "tools/call");
        assert_eq!(req.params.unwrap()["name"], "send_message");
    }

    #[test]
    fn string_id_is_preserved() {
        let req = norm(json!({"jsonrpc": "2.0", "id": "abc", "method": "ping"})).unwrap();
        assert_eq!(req.id, Some(json!("abc")));
        assert!(req.params.is_none());
    }

    #[rstest]
    #[case("tools.call", "tools/call")]
    #[case("tool/call", "tools/call")]
    #[case("callTool", "tools/call")]
    #[case("call_tool", "tools/call")]
    #[case("tools.list", "tools/list")]
    #[case("listTools", "tools/list")]
    #[case("initialize", "initialize")]
    fn method_aliases_are_canonicalized(#[case] alias: &str, #[case] expected: &str) {
        let req = norm(json!({"jsonrpc": "2.0", "id": 1, "method": alias})).unwrap();
        assert_eq!(req.method, expected);
    }

    #[test]
    fn missing_and_null_id_are_notifications() {
        let req = norm(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).unwrap();
        assert!(req.is_notification());
        let req = norm(json!({"jsonrpc": "2.0", "id": null, "method": "ping"})).unwrap();
        assert!(req.is_notification());
    }

    #[test]
    fn legacy_envelope_is_wrapped() {
        let req = norm(json!({
            "id": "r1",
            "tool": "send_message",
            "arguments": {"chat_id": "42", "text": "hi"}
        }))
        .unwrap();
        assert_eq!(req.jsonrpc, "2.0");
        assert_eq!(req.id, Some(json!("r1")));
        assert_eq!(req.method, "tools/call");
        let params = req.params.unwrap();
        assert_eq!(params["name"], "send_message");
        assert_eq!(params["arguments"]["text"], "hi");
    }

    #[test]
    fn legacy_envelope_without_id_gets_generated_one() {
        let req = norm(json!({"tool": "get_me"})).unwrap();
        let id = req.id.unwrap();
        assert!(uuid::Uuid::parse_str(id.as_str().unwrap()).is_ok());
        assert_eq!(req.params.unwrap()["arguments"], json!({}));
    }

    #[test]
    fn legacy_non_object_arguments_become_empty() {
        let req = norm(json!({"tool": "get_me", "arguments": [1, 2]})).unwrap();
        assert_eq!(req.params.unwrap()["arguments"], json!({}));
    }

    #[test]
    fn legacy_rejected_when_disabled() {
        let err = normalize(
            RawPayload::Json(json!({"tool": "get_me"})),
            NormalizeOptions {
                legacy_dialect: false,
            },
        )
        .unwrap_err();
        assert_eq!(err.kind, ErrorKind::LegacyDialectDisabled);
    }

    #[rstest]
    #[case(json!([1, 2, 3]))]
    #[case(json!("ping"))]
    #[case(json!({"jsonrpc": "1.0", "method": "ping"}))]
    #[case(json!({"jsonrpc": "2.0", "method": ""}))]
    #[case(json!({"jsonrpc": "2.0", "method": "ping", "id": {"nested": true}}))]
    #[case(json!({"jsonrpc": "2.0", "method": "ping", "params": [1]}))]
    #[case(json!({"hello": "world"}))]
    #[case(json!({"tool": ""}))]
    fn unrecognized_shapes_are_malformed(#[case] value: Value) {
        let err = norm(value).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedPayload);
    }

    #[test]
    fn invalid_json_text_is_malformed() {
        let err = normalize(RawPayload::from("{not json"), NormalizeOptions::default()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MalformedPayload);
    }

    #[test]
    fn bytes_payload_is_parsed() {
        let req = normalize(
            RawPayload::Bytes(br#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#.to_vec()),
            NormalizeOptions::default(),
        )
        .unwrap();
        assert_eq!(req.method, "tools/list");
    }
}
