//! Configuration loading: optional TOML settings file, `.env` support, and
//! environment overrides.

mod settings;

pub use settings::{
    DatabaseSettings, McpSettings, ModelSettings, ServerSettings, SessionSettings, Settings,
};
