//! Error types for the tool gateway.

use thiserror::Error;

/// Errors raised while talking to MCP servers.
#[derive(Debug, Error)]
pub enum McpError {
    /// The HTTP request itself failed.
    #[error("MCP server '{server}' unreachable: {source}")]
    Transport {
        /// Endpoint name.
        server: String,
        /// Underlying HTTP error.
        #[source]
        source: reqwest::Error,
    },

    /// The server answered with a JSON-RPC error or a failing HTTP status.
    #[error("MCP server '{server}' returned an error: {message}")]
    Server {
        /// Endpoint name.
        server: String,
        /// Error detail from the server.
        message: String,
    },

    /// The server's response could not be interpreted.
    #[error("MCP server '{server}' returned malformed data: {message}")]
    Malformed {
        /// Endpoint name.
        server: String,
        /// Parse detail.
        message: String,
    },

    /// The requested tool is not in the session catalog.
    #[error("no MCP endpoint advertises tool '{0}'")]
    UnknownTool(String),
}

/// Result type for tool gateway operations.
pub type McpResult<T> = Result<T, McpError>;
