//! Media Gate Server
//!
//! Loads configuration, sets up logging, and serves the gateway until
//! interrupted.

use anyhow::Context;
use media_gate::{DownloadHandler, GatewayConfig, GatewayServer};
use std::env;
use std::sync::Arc;
use tracing::{info, warn};

/// Main entry point for the Media Gate server
///
/// # Usage
/// ```bash
/// # Defaults plus environment overrides
/// media-gate
///
/// # With a config file
/// media-gate /path/to/media_gate.yaml
/// ```
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = env::args().nth(1);
    let config = GatewayConfig::load(config_path.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.tracing_level()?)
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        .init();

    info!("Starting Media Gate");
    match &config_path {
        Some(path) => info!("Configuration loaded from: {}", path),
        None => info!("No config file given, using defaults and environment"),
    }
    info!("  - Max bytes: {} ({} MB)", config.max_bytes, config.max_bytes / (1024 * 1024));
    info!("  - Fetch timeout: {} ms", config.fetch_timeout_ms);
    info!("  - Allowed hostnames: {:?}", config.allowed_hostnames);
    info!("  - Denied hostnames: {:?}", config.denied_hostnames);
    info!("  - Extraction enabled: {}", config.extract.enabled);

    if !config.has_api_key() {
        warn!("No API key configured; every request will be rejected with 401");
    }
    if config.allowed_hostnames.is_empty() {
        warn!("No allowed hostnames configured; any host not denied may be fetched");
    }

    let addr = config.socket_addr()?;
    let handler = Arc::new(DownloadHandler::new(Arc::new(config))?);
    let server = GatewayServer::new(handler, addr);

    tokio::select! {
        result = server.start() => result.context("Server terminated")?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    info!("Media Gate stopped");
    Ok(())
}
