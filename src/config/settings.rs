//! TOML settings parsing and environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

/// HTTP listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlite connection URL.
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: "sqlite://shopchat.db".to_string(),
        }
    }
}

/// Model provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// API key. Not read from the settings file; comes from the
    /// `ANTHROPIC_API_KEY` environment variable.
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Model identifier.
    pub model: String,
    /// Token budget per turn.
    pub max_tokens: u32,
    /// Override for the provider base URL (testing, proxies).
    pub base_url: Option<String>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "claude-sonnet-4-5".to_string(),
            max_tokens: 4096,
            base_url: None,
        }
    }
}

/// MCP endpoint settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct McpSettings {
    /// General-purpose storefront MCP endpoint URL.
    pub storefront_url: Option<String>,
    /// Identity-scoped customer-account MCP endpoint URL.
    pub customer_account_url: Option<String>,
    /// Bearer token sent to both endpoints when set.
    pub auth_token: Option<String>,
}

/// Chat session settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Upper bound on model turns per request.
    pub max_turns: u32,
    /// Outbound event channel capacity.
    pub event_buffer: usize,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_turns: 16,
            event_buffer: 64,
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// HTTP listener section.
    pub server: ServerSettings,
    /// Persistence section.
    pub database: DatabaseSettings,
    /// Model provider section.
    pub model: ModelSettings,
    /// MCP endpoints section.
    pub mcp: McpSettings,
    /// Session tuning section.
    pub session: SessionSettings,
}

impl Settings {
    /// Load settings.
    ///
    /// Order: `.env` file (if present), then the TOML file at `path` (or
    /// `shopchat.toml` in the working directory when it exists), then
    /// environment variable overrides on top.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        // Missing .env is the normal case, not an error.
        let _ = dotenv::dotenv();

        let mut settings = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Path::new("shopchat.toml");
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Parse settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("parsing settings file {}", path.display()))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = env::var("ANTHROPIC_API_KEY") {
            self.model.api_key = Some(key);
        }
        if let Ok(model) = env::var("ANTHROPIC_MODEL") {
            self.model.model = model;
        }
        if let Ok(url) = env::var("ANTHROPIC_BASE_URL") {
            self.model.base_url = Some(url);
        }
        if let Ok(url) = env::var("SHOPCHAT_DATABASE_URL") {
            self.database.url = url;
        }
        if let Ok(host) = env::var("SHOPCHAT_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = env::var("SHOPCHAT_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "ignoring non-numeric SHOPCHAT_PORT"),
            }
        }
        if let Ok(url) = env::var("SHOPCHAT_STOREFRONT_MCP_URL") {
            self.mcp.storefront_url = Some(url);
        }
        if let Ok(url) = env::var("SHOPCHAT_CUSTOMER_MCP_URL") {
            self.mcp.customer_account_url = Some(url);
        }
        if let Ok(token) = env::var("SHOPCHAT_MCP_AUTH_TOKEN") {
            self.mcp.auth_token = Some(token);
        }
    }

    /// Listener address in `host:port` form.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
