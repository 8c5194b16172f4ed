//! MCP client: JSON-RPC over HTTP.
//!
//! Speaks the `initialize` / `tools/list` / `tools/call` subset of the MCP
//! protocol against a remote endpoint. Transport is plain HTTP POST with
//! one JSON-RPC document per request.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::catalog::ToolDescriptor;
use super::{McpError, McpResult};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// One remote MCP endpoint.
#[derive(Debug, Clone)]
pub struct McpEndpoint {
    /// Endpoint name, used for logging and error reporting.
    pub name: String,
    /// Full URL of the message endpoint.
    pub url: String,
    /// Optional bearer token.
    pub auth_token: Option<String>,
}

impl McpEndpoint {
    /// Create an endpoint without authentication.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            auth_token: None,
        }
    }

    /// Attach a bearer token.
    pub fn with_auth(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTool {
    name: String,
    #[serde(default)]
    description: String,
    input_schema: Value,
}

#[derive(Debug, Deserialize)]
struct ToolsListResult {
    tools: Vec<WireTool>,
}

/// Result of one tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    /// Joined text items, suitable for feeding back to the model.
    pub content: String,
    /// Whether the server flagged the result as an error.
    pub is_error: bool,
    /// The raw content array, kept for the display side channel.
    pub raw_content: Value,
}

/// HTTP client for MCP endpoints.
#[derive(Debug, Default, Clone)]
pub struct McpClient {
    http: reqwest::Client,
}

impl McpClient {
    /// Create a new client with a fresh connection pool.
    pub fn new() -> Self {
        Self::default()
    }

    async fn rpc(
        &self,
        endpoint: &McpEndpoint,
        id: u64,
        method: &'static str,
        params: Option<Value>,
    ) -> McpResult<Option<Value>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };

        let mut http_request = self.http.post(&endpoint.url).json(&request);
        if let Some(ref token) = endpoint.auth_token {
            http_request = http_request.bearer_auth(token);
        }

        let response = http_request.send().await.map_err(|e| McpError::Transport {
            server: endpoint.name.clone(),
            source: e,
        })?;

        if !response.status().is_success() {
            return Err(McpError::Server {
                server: endpoint.name.clone(),
                message: format!("HTTP {}", response.status()),
            });
        }

        let rpc_response: JsonRpcResponse =
            response.json().await.map_err(|e| McpError::Malformed {
                server: endpoint.name.clone(),
                message: format!("invalid JSON-RPC response: {e}"),
            })?;

        if let Some(error) = rpc_response.error {
            return Err(McpError::Server {
                server: endpoint.name.clone(),
                message: error.message,
            });
        }

        Ok(rpc_response.result)
    }

    /// Perform the `initialize` / `initialized` handshake.
    ///
    /// Some servers answer `tools/list` without it, so callers treat a
    /// failed handshake as a warning rather than an error.
    pub async fn initialize(&self, endpoint: &McpEndpoint) -> McpResult<()> {
        self.rpc(
            endpoint,
            1,
            "initialize",
            Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {
                    "name": "shopchat",
                    "version": env!("CARGO_PKG_VERSION"),
                }
            })),
        )
        .await?;

        // Notification; servers may answer with an empty body.
        let _ = self.rpc(endpoint, 2, "notifications/initialized", None).await;
        Ok(())
    }

    /// Fetch the tool descriptors advertised by an endpoint.
    pub async fn list_tools(&self, endpoint: &McpEndpoint) -> McpResult<Vec<ToolDescriptor>> {
        let result = self
            .rpc(endpoint, 3, "tools/list", Some(json!({})))
            .await?
            .ok_or_else(|| McpError::Malformed {
                server: endpoint.name.clone(),
                message: "no result in tools/list response".to_string(),
            })?;

        let listed: ToolsListResult =
            serde_json::from_value(result).map_err(|e| McpError::Malformed {
                server: endpoint.name.clone(),
                message: format!("invalid tools/list result: {e}"),
            })?;

        Ok(listed
            .tools
            .into_iter()
            .map(|tool| ToolDescriptor {
                name: tool.name,
                description: tool.description,
                input_schema: tool.input_schema,
            })
            .collect())
    }

    /// Invoke a tool by name.
    ///
    /// A server-side tool failure is not an `Err`: it comes back as a
    /// `ToolOutcome` with `is_error` set, so the model can react to it.
    pub async fn call_tool(
        &self,
        endpoint: &McpEndpoint,
        tool_name: &str,
        arguments: Value,
    ) -> McpResult<ToolOutcome> {
        let result = self
            .rpc(
                endpoint,
                4,
                "tools/call",
                Some(json!({
                    "name": tool_name,
                    "arguments": arguments,
                })),
            )
            .await?
            .ok_or_else(|| McpError::Malformed {
                server: endpoint.name.clone(),
                message: "no result in tools/call response".to_string(),
            })?;

        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let raw_content = result.get("content").cloned().unwrap_or_else(|| json!([]));

        let content = match raw_content.as_array() {
            Some(items) => items
                .iter()
                .filter_map(|item| {
                    if item.get("type").and_then(Value::as_str) == Some("text") {
                        item.get("text").and_then(Value::as_str).map(String::from)
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
            None => raw_content.to_string(),
        };

        Ok(ToolOutcome {
            content,
            is_error,
            raw_content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_builder() {
        let endpoint = McpEndpoint::new("storefront", "https://shop.example.com/api/mcp")
            .with_auth("secret");
        assert_eq!(endpoint.name, "storefront");
        assert_eq!(endpoint.auth_token.as_deref(), Some("secret"));
    }

    #[test]
    fn test_rpc_request_serialization() {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 3,
            method: "tools/list",
            params: Some(json!({})),
        };
        let raw = serde_json::to_string(&request).unwrap();
        assert!(raw.contains("\"jsonrpc\":\"2.0\""));
        assert!(raw.contains("\"method\":\"tools/list\""));

        // params omitted entirely when absent
        let notification = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 2,
            method: "initialized",
            params: None,
        };
        assert!(!serde_json::to_string(&notification).unwrap().contains("params"));
    }

    #[test]
    fn test_tools_list_parsing() {
        let result = json!({
            "tools": [
                {
                    "name": "search_shop_catalog",
                    "description": "Search products",
                    "inputSchema": {"type": "object", "properties": {"query": {"type": "string"}}}
                },
                {
                    "name": "get_cart",
                    "inputSchema": {"type": "object"}
                }
            ]
        });
        let listed: ToolsListResult = serde_json::from_value(result).unwrap();
        assert_eq!(listed.tools.len(), 2);
        assert_eq!(listed.tools[0].name, "search_shop_catalog");
        assert_eq!(listed.tools[1].description, "");
    }
}
