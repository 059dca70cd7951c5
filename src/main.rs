//! Fetch proxy (v1)
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ /proxy?url=… ──▶ validate URL ──▶ SSRF guard ──▶ sanitize headers
//!                                                   │ (resolve, classify,
//!                                                   │  pin addresses)
//!                                                   ▼
//!   Client ◀── stream | envelope ◀── translate ◀── forward (timeout, redirects) ──▶ Upstream
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use fetch_proxy::config::{resolve_config, Overrides};
use fetch_proxy::lifecycle::signals::spawn_signal_listener;
use fetch_proxy::observability::{logging, metrics};
use fetch_proxy::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "fetch-proxy")]
#[command(about = "SSRF-guarded forward fetch proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "PROXY_CONFIG")]
    config: Option<PathBuf>,

    /// Listen port, overriding the configured bind address port.
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Upstream request timeout in seconds.
    #[arg(long, env = "PROXY_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let overrides = Overrides {
        port: cli.port,
        request_timeout_secs: cli.timeout_secs,
    };
    let config = resolve_config(cli.config.as_deref(), &overrides)?;

    logging::init(&config.observability);
    tracing::info!("fetch-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        redirect_policy = ?config.forward.redirect_policy,
        allowed_addresses = config.security.allowed_addresses.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Arc::new(Shutdown::new());
    spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config);
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
