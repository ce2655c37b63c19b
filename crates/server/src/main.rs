//! shellcache server entry point.
//!
//! This is the main binary that boots the MCP server on stdio transport.
//! Logging goes to stderr to avoid interfering with the JSON-RPC protocol on stdout.

use std::sync::Arc;

use anyhow::Result;
use rmcp::service::serve_server;
use rmcp::transport::io::stdio;
use shellcache_client::{Controller, HttpNetwork, NetworkConfig};
use shellcache_core::{AppConfig, CacheDb};
use tracing_subscriber::EnvFilter;

mod error;
mod handler;
mod tools;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AppConfig::load()?;
    let origin = config.origin_url()?;
    tracing::info!(version = %config.version, origin = %origin, db = %config.db_path.display(), "Starting shellcache server on stdio transport");

    let db = CacheDb::open(&config.db_path).await?;
    let network = HttpNetwork::new(NetworkConfig {
        user_agent: config.user_agent.clone(),
        timeout: config.timeout(),
        origin: origin.clone(),
    })?;
    let controller = Arc::new(Controller::new(db, Arc::new(network)));

    if let Err(e) = controller.register(&config).await {
        tracing::error!(version = %config.version, "registration failed, requests pass through: {e}");
    }

    let handler = handler::ShellcacheServer::new(controller, Arc::new(config), origin);
    let transport = stdio();
    let server = serve_server(handler, transport).await?;

    server.waiting().await?;

    Ok(())
}
