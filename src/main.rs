//! Sticky reverse proxy for a single load-balanced service.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server ──▶ proxy::transport ──▶ load_balancer ──▶ net::dial ──▶ Backend
//!                          │                 │
//!                          │                 └── affinity (sticky cookie in, Set-Cookie out)
//!                          └── http::upgrade (101 → byte splice)
//!
//!     Cross-cutting: config (TOML + hot reload), observability, lifecycle
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use router_proxy::config::{load_config, ProxyConfig};
use router_proxy::http::HttpServer;
use router_proxy::lifecycle::{signals, startup, Shutdown};
use router_proxy::observability::logging;

#[derive(Parser)]
#[command(name = "router-proxy")]
#[command(about = "Reverse proxy with sticky sessions and connect-level failover", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_logging(&config.observability.log_level);
    tracing::info!("router-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.addresses.len(),
        affinity = config.affinity.enabled,
        "Configuration loaded"
    );

    let runtime = startup::build_runtime(&config)?;
    let _watcher = startup::start_background(&config, cli.config.as_deref(), &runtime.backends);

    let shutdown = Arc::new(Shutdown::new());
    signals::trigger_on_signal(Arc::clone(&shutdown));

    // Bind TCP listener
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(runtime.transport, shutdown.subscribe());
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
