//! shopchat server binary.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use shopchat::config::Settings;
use shopchat::logging;
use shopchat::provider::AnthropicProvider;
use shopchat::server::{router, AppState};
use shopchat::storage::MessageStore;

#[derive(Debug, Parser)]
#[command(name = "shopchat", about = "Storefront chat backend", version)]
struct Args {
    /// Path to the settings file (default: shopchat.toml when present).
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Override the listener port.
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = Args::parse();
    let mut settings = Settings::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        settings.server.port = port;
    }

    let Some(api_key) = settings.model.api_key.clone() else {
        bail!("ANTHROPIC_API_KEY is not set");
    };

    let mut provider = AnthropicProvider::new(api_key);
    if let Some(base_url) = settings.model.base_url.clone() {
        provider = provider.with_base_url(base_url);
    }

    let store = MessageStore::connect(&settings.database.url)
        .await
        .with_context(|| format!("opening database {}", settings.database.url))?;

    let addr = settings.bind_addr();
    let state = AppState {
        store,
        provider: Arc::new(provider),
        settings: Arc::new(settings.clone()),
    };

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, model = %settings.model.model, "shopchat listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
