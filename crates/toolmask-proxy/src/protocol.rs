//! MCP protocol message types

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const JSONRPC_VERSION: &str = "2.0";
pub const MCP_PROTOCOL_VERSION: &str = "2024-11-05";

pub const METHOD_INITIALIZE: &str = "initialize";
pub const METHOD_TOOLS_LIST: &str = "tools/list";
pub const NOTIFICATION_INITIALIZED: &str = "notifications/initialized";

/// JSON-RPC 2.0 request, or notification when `id` is absent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.to_string(),
            params,
        }
    }

    pub fn notification(method: &str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.to_string(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitializeParams {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Value,
    #[serde(rename = "clientInfo")]
    pub client_info: ClientInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientInfo {
    pub name: String,
    pub version: String,
}

impl InitializeParams {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            protocol_version: MCP_PROTOCOL_VERSION.to_string(),
            capabilities: Value::Object(Map::new()),
            client_info: ClientInfo {
                name: name.to_string(),
                version: version.to_string(),
            },
        }
    }
}

/// Discriminant of [`JsonRpcMessage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Notification,
    Response,
    ErrorResponse,
}

/// A JSON-RPC envelope, kept as its raw object so untouched fields survive a rewrite
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcMessage {
    /// Has `method` and `id`
    Request(Map<String, Value>),
    /// Has `method`, no `id`
    Notification(Map<String, Value>),
    /// Has `result`, no `method` or `error`
    Response(Map<String, Value>),
    /// Has `error`
    ErrorResponse(Map<String, Value>),
}

impl JsonRpcMessage {
    /// Parse one frame. `None` for anything that is not a JSON-RPC 2.0 object.
    pub fn parse(line: &str) -> Option<Self> {
        serde_json::from_str::<Value>(line)
            .ok()
            .and_then(Self::from_value)
    }

    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(map) = value else {
            return None;
        };

        if map.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return None;
        }

        if map.get("method").is_some_and(Value::is_string) {
            if map.contains_key("id") {
                Some(JsonRpcMessage::Request(map))
            } else {
                Some(JsonRpcMessage::Notification(map))
            }
        } else if map.contains_key("error") {
            Some(JsonRpcMessage::ErrorResponse(map))
        } else if map.contains_key("result") {
            Some(JsonRpcMessage::Response(map))
        } else {
            None
        }
    }

    pub fn kind(&self) -> MessageKind {
        match self {
            JsonRpcMessage::Request(_) => MessageKind::Request,
            JsonRpcMessage::Notification(_) => MessageKind::Notification,
            JsonRpcMessage::Response(_) => MessageKind::Response,
            JsonRpcMessage::ErrorResponse(_) => MessageKind::ErrorResponse,
        }
    }

    fn fields(&self) -> &Map<String, Value> {
        match self {
            JsonRpcMessage::Request(map)
            | JsonRpcMessage::Notification(map)
            | JsonRpcMessage::Response(map)
            | JsonRpcMessage::ErrorResponse(map) => map,
        }
    }

    pub fn id(&self) -> Option<&Value> {
        self.fields().get("id")
    }

    pub fn method(&self) -> Option<&str> {
        self.fields().get("method").and_then(Value::as_str)
    }

    /// The tool array of a successful `tools/list` result, if this is one
    pub fn tool_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match self {
            JsonRpcMessage::Response(map) => map.get_mut("result").and_then(tool_list_mut),
            _ => None,
        }
    }

    pub fn into_value(self) -> Value {
        match self {
            JsonRpcMessage::Request(map)
            | JsonRpcMessage::Notification(map)
            | JsonRpcMessage::Response(map)
            | JsonRpcMessage::ErrorResponse(map) => Value::Object(map),
        }
    }
}

/// View a result as a tool list.
///
/// Returns the `tools` array when `result` is an object whose `tools` is an
/// array of objects that each carry a string `name`. Any other shape yields
/// `None`, never an error.
pub fn tool_list_mut(result: &mut Value) -> Option<&mut Vec<Value>> {
    let tools = result.as_object_mut()?.get_mut("tools")?.as_array_mut()?;
    let well_formed = tools.iter().all(|tool| tool_name(tool).is_some());
    well_formed.then_some(tools)
}

/// Name of a raw tool entry
pub fn tool_name(tool: &Value) -> Option<&str> {
    tool.as_object()?.get("name")?.as_str()
}

/// Tool definition from a tools/list response.
///
/// Only `name` and `description` are interpreted; every other field is carried
/// along in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Parse tool descriptors out of a tools/list result
pub fn parse_tool_list(result: &Value) -> Option<Vec<ToolDescriptor>> {
    let tools = result.get("tools")?;
    serde_json::from_value(tools.clone()).ok()
}
