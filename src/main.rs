//! Edge router binary.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client Request
//!   ──────────────▶ http::server (request ID, trace, timeout, body buffering)
//!                        │
//!                        ▼
//!                  routing::EdgeRouter
//!                   ├─ environment (feature branch, recursion guard, testing mode)
//!                   ├─ routing::site (brand from host)
//!                   └─ routing::tables (registrations per brand)
//!                        │
//!                        ▼
//!                  pipeline (request middleware → origin fetch → response middleware → finalizer)
//!                        │
//!   Client Response      ▼
//!   ◀────────────── EdgeResponse
//!
//!   Cross-cutting: config (TOML + env, hot reload), observability (logs, metrics),
//!   resilience (fail-open subrequests), lifecycle (startup check, graceful shutdown)
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use clap::Parser;
use tokio::net::TcpListener;

use edge_router::config::watcher::{apply_updates, ConfigWatcher};
use edge_router::config::{load_config, RouterConfig};
use edge_router::http::{EdgeCache, Fetch, HttpOrigin, HttpServer};
use edge_router::lifecycle::{signals, startup, Shutdown};
use edge_router::middlewares::Catalog;
use edge_router::observability::{logging, metrics};

/// Default TTL for the third-party script cache; each proxy passes its own.
const EDGE_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Debug, Parser)]
#[command(name = "edge-router", version, about = "Edge middleware router for the brand sites")]
struct Args {
    /// TOML config file. Defaults apply when omitted; the file is watched
    /// for changes when given.
    #[arg(short, long, env = "EDGE_ROUTER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RouterConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        stage = %config.environment.stage,
        testing = config.environment.testing,
        bind_address = %config.listener.bind_address,
        "edge-router starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics endpoint");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let fetcher: Arc<dyn Fetch> = Arc::new(HttpOrigin::new(&config.origins, &config.timeouts)?);
    let cache = EdgeCache::new(fetcher.clone(), EDGE_CACHE_TTL);

    let checked = startup::self_check(&Catalog::new(Arc::new(config.clone()), fetcher.clone(), cache.clone()))?;
    tracing::info!(registrations = checked, "Site tables validated");

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shared = Arc::new(ArcSwap::from_pointee(config));
    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    // Held for the life of the process; dropping it stops the watch.
    let _watcher = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            tokio::spawn(apply_updates(shared.clone(), updates, shutdown.subscribe()));
            match watcher.run() {
                Ok(watcher) => Some(watcher),
                Err(e) => {
                    tracing::warn!(error = %e, "Config watcher unavailable, hot reload disabled");
                    None
                }
            }
        }
        None => None,
    };

    HttpServer::new(shared, fetcher, cache).run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
