//! Tool gateway: MCP client and per-session tool catalog assembly.
//!
//! Tools are discovered over the MCP JSON-RPC protocol from up to two
//! endpoints: the general-purpose storefront endpoint and, when a
//! customer-account URL is known for the conversation, an identity-scoped
//! endpoint. Discovery happens once per session; invocation is routed to
//! whichever endpoint advertised the tool.

mod catalog;
mod client;
mod error;

pub use catalog::{
    resolve_customer_endpoint, storefront_endpoint, StorefrontGateway, ToolDescriptor,
    ToolGateway,
};
pub use client::{McpClient, McpEndpoint, ToolOutcome};
pub use error::{McpError, McpResult};
