//! Tool catalog assembly and invocation routing.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::{McpClient, McpEndpoint, McpError, McpResult, ToolOutcome};
use crate::config::McpSettings;
use crate::storage::MessageStore;

/// One tool offered to the model.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    /// Tool name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON schema of the tool's arguments.
    pub input_schema: Value,
}

/// Seam between the orchestrator and the tool layer.
#[async_trait]
pub trait ToolGateway: Send + Sync {
    /// Connect to the configured endpoints and assemble the tool catalog.
    /// Called at most once per session.
    async fn discover(&mut self) -> McpResult<Vec<ToolDescriptor>>;

    /// Invoke a previously discovered tool.
    async fn call(&self, name: &str, input: Value) -> McpResult<ToolOutcome>;
}

/// Gateway over the storefront endpoint plus an optional identity-scoped
/// customer-account endpoint.
pub struct StorefrontGateway {
    client: McpClient,
    storefront: Option<McpEndpoint>,
    customer: Option<McpEndpoint>,
    routes: HashMap<String, McpEndpoint>,
}

impl StorefrontGateway {
    /// Create a gateway for one session. Endpoints are optional; an
    /// unconfigured gateway discovers an empty catalog.
    pub fn new(
        client: McpClient,
        storefront: Option<McpEndpoint>,
        customer: Option<McpEndpoint>,
    ) -> Self {
        Self {
            client,
            storefront,
            customer,
            routes: HashMap::new(),
        }
    }

    async fn connect(&self, endpoint: &McpEndpoint) -> McpResult<Vec<ToolDescriptor>> {
        if let Err(err) = self.client.initialize(endpoint).await {
            tracing::warn!(server = %endpoint.name, error = %err,
                "MCP initialize failed, attempting tools/list anyway");
        }
        self.client.list_tools(endpoint).await
    }
}

#[async_trait]
impl ToolGateway for StorefrontGateway {
    /// Connects to the storefront endpoint (required) and the customer
    /// endpoint (best-effort). Tool names already claimed by the storefront
    /// win on conflict.
    async fn discover(&mut self) -> McpResult<Vec<ToolDescriptor>> {
        let mut catalog = Vec::new();
        if let Some(storefront) = self.storefront.clone() {
            catalog = self.connect(&storefront).await?;
            for tool in &catalog {
                self.routes.insert(tool.name.clone(), storefront.clone());
            }
        }

        if let Some(customer) = self.customer.clone() {
            match self.connect(&customer).await {
                Ok(tools) => {
                    for tool in tools {
                        if self.routes.contains_key(&tool.name) {
                            continue;
                        }
                        self.routes.insert(tool.name.clone(), customer.clone());
                        catalog.push(tool);
                    }
                }
                Err(err) => {
                    tracing::warn!(server = %customer.name, error = %err,
                        "customer endpoint discovery failed, continuing with storefront tools");
                }
            }
        }

        Ok(catalog)
    }

    async fn call(&self, name: &str, input: Value) -> McpResult<ToolOutcome> {
        let endpoint = self
            .routes
            .get(name)
            .ok_or_else(|| McpError::UnknownTool(name.to_string()))?;
        self.client.call_tool(endpoint, name, input).await
    }
}

/// Build the general-purpose storefront endpoint from settings, when one
/// is configured.
pub fn storefront_endpoint(settings: &McpSettings) -> Option<McpEndpoint> {
    let url = settings.storefront_url.clone()?;
    let mut endpoint = McpEndpoint::new("storefront", url);
    if let Some(ref token) = settings.auth_token {
        endpoint = endpoint.with_auth(token.clone());
    }
    Some(endpoint)
}

/// Resolve the identity-scoped MCP endpoint for a conversation.
///
/// Read-through cache: the URL stored for the conversation wins; otherwise
/// the configured URL is stored for the conversation and used. Populated
/// once, never invalidated within this layer. Returns `None` when no URL is
/// available from either source.
pub async fn resolve_customer_endpoint(
    store: &MessageStore,
    conversation_id: &str,
    settings: &McpSettings,
) -> Option<McpEndpoint> {
    let cached = match store.customer_account_url(conversation_id).await {
        Ok(cached) => cached,
        Err(err) => {
            tracing::warn!(error = %err, "customer URL cache read failed");
            None
        }
    };

    let url = match cached {
        Some(url) => url,
        None => {
            let url = settings.customer_account_url.clone()?;
            if let Err(err) = store.store_customer_account_url(conversation_id, &url).await {
                tracing::warn!(error = %err, "customer URL cache write failed");
            }
            url
        }
    };

    let mut endpoint = McpEndpoint::new("customer-account", url);
    if let Some(ref token) = settings.auth_token {
        endpoint = endpoint.with_auth(token.clone());
    }
    Some(endpoint)
}
