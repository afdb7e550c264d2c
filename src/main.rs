//! Edge guard
//!
//! A request filter that sits in front of a site, built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────▶ request id ──▶ trace ──▶ edge filter ──────────▶ upstream ──▶ Site
//!                                        │  rate limit            │
//!                                        │  origin                │
//!                                        │  user agent            │
//!                                        │  content type          │
//!                                        ▼                        ▼
//!     ◀────── rejection (JSON)      decorate (security headers, CSP, nonce)
//!
//!     Cross-cutting: config (TOML + hot reload), observability, lifecycle
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_guard::config::validation::validate_config;
use edge_guard::config::watcher::ConfigWatcher;
use edge_guard::config::{load_config, ConfigError, ConfigOverrides, EdgeConfig, RuntimeMode};
use edge_guard::observability::{logging, metrics};
use edge_guard::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "edge-guard", version, about = "Request filter in front of a site")]
struct Cli {
    /// Path to the TOML configuration file. Watched for changes.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Runtime mode, overriding the config file.
    #[arg(long, env = "EDGE_GUARD_MODE", value_enum)]
    mode: Option<RuntimeMode>,

    /// Listen address, overriding the config file.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EdgeConfig::default(),
    };
    let overrides = ConfigOverrides {
        mode: cli.mode,
        bind_address: cli.bind,
    };
    overrides.apply(&mut config);
    validate_config(&config).map_err(ConfigError::Validation)?;

    logging::init_tracing(&config.observability);
    tracing::info!("edge-guard v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.runtime.mode,
        max_requests = config.filter.rate_limit.max_requests,
        window_secs = config.filter.rate_limit.window_secs,
        "Configuration loaded"
    );

    // Initialize metrics server
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
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

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    // The watcher stops when dropped, so it lives until main returns.
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.with_overrides(overrides).run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let server = HttpServer::new(config)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
