//! Storefront chat backend.
//!
//! shopchat bridges a storefront's web chat widget with the Anthropic
//! Messages API and MCP-discovered commerce tools:
//!
//! - **`config`** - TOML settings with environment overrides
//! - **`message`** - conversation messages and content blocks
//! - **`provider`** - model gateway: streaming turns with a non-streaming
//!   fallback
//! - **`mcp`** - MCP tool discovery and invocation over JSON-RPC/HTTP
//! - **`storage`** - sqlite-backed conversation store
//! - **`orchestration`** - per-request session turn loop and its output
//!   channel
//! - **`server`** - axum HTTP boundary: SSE chat stream plus history
//!
//! The binary in `main.rs` wires these together; the library surface
//! exists for integration tests and embedding.

#![warn(missing_docs)]

pub mod config;
pub mod logging;
pub mod mcp;
pub mod message;
pub mod orchestration;
pub mod provider;
pub mod server;
pub mod storage;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::mcp::{McpClient, McpEndpoint, StorefrontGateway, ToolDescriptor, ToolGateway};
    pub use crate::message::{ContentBlock, Message, MessageContent, Role};
    pub use crate::orchestration::{
        ChatRequest, ChatSession, OutboundEvent, OutputChannel,
    };
    pub use crate::provider::{
        AnthropicProvider, ModelGateway, ModelMessage, ModelProvider, StopReason, TurnEvent,
    };
    pub use crate::server::{router, AppState};
    pub use crate::storage::MessageStore;
}
