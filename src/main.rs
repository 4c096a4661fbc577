//! Route adapter server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Trusted proxy               ┌───────────────────────────────────────────────┐
//!     (x-matched-path, ...)       │                ROUTE ADAPTER                  │
//!     ────────────────────────────┼─▶ http server ──▶ adapter pipeline ──▶ render │
//!                                 │                     │                         │
//!                                 │          ┌──────────┼──────────┐              │
//!                                 │          ▼          ▼          ▼              │
//!                                 │       routing     i18n       route            │
//!                                 │     (shapes)   (locales)  (params,rewrites)   │
//!                                 │                                               │
//!                                 │  config (+watcher)      observability         │
//!                                 └───────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use route_adapter::config::{load_config, AdapterConfig, ConfigWatcher};
use route_adapter::observability::{logging, metrics};
use route_adapter::{AdapterServer, RequestAdapter};

#[derive(Parser, Debug)]
#[command(name = "route-adapter", version, about = "Request normalization server")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the configuration file when it changes.
    #[arg(long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => AdapterConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!("route-adapter v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        build_id = %config.build_id,
        base_path = %config.base_path,
        pages = config.routes.pages.len(),
        i18n = config.i18n.is_some(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // Dropping the notify watcher stops it, so it lives until shutdown.
    let mut _watcher = None;
    let updates = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            _watcher = Some(watcher.run()?);
            Some(rx)
        }
        _ => None,
    };

    let adapter = RequestAdapter::from_config(config)?;
    AdapterServer::new(adapter).run(listener, updates).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
