//! MCP protocol types.
//!
//! This module defines the JSON-RPC message types used by MCP, plus the
//! request-scoped context value carrying session headers through dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP tool definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Internal name (marker-prefixed, e.g. `_query`) at rest; external
    /// session-scoped name on the wire after the identity middleware runs.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// List tools response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResponse {
    pub tools: Vec<ToolDefinition>,
}

/// Call tool request parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Call tool response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallToolResponse {
    pub content: Vec<ToolContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

/// Tool response content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ToolContent {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "json")]
    Json { json: Value },
}

/// Request context passed from the transport to the MCP server.
///
/// Carries the raw session headers of one request/response exchange. In HTTP
/// mode this is populated per request from the incoming headers; in stdio
/// mode it is empty and the identity middleware passes tools through
/// unchanged. It is threaded through dispatch as a value, never stored in a
/// process-wide singleton, so concurrent requests only ever see their own
/// headers.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Target API URL from the `x-target-url` header.
    pub target_url: Option<String>,
    /// API kind ("graphql" or "rest") from the `x-api-type` header.
    pub api_kind: Option<String>,
}

impl RequestContext {
    /// Build a context from HTTP-style header pairs.
    pub fn from_headers<'a, I>(headers: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut ctx = Self::default();
        for (name, value) in headers {
            match name.to_ascii_lowercase().as_str() {
                "x-target-url" => ctx.target_url = Some(value.to_string()),
                "x-api-type" => ctx.api_kind = Some(value.to_string()),
                _ => {}
            }
        }
        ctx
    }

    /// Whether any session headers were resolvable (a non-networked
    /// transport yields none).
    pub fn has_session(&self) -> bool {
        self.target_url.is_some() || self.api_kind.is_some()
    }
}
