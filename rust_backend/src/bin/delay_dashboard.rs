//! Delay dashboard service.
//!
//! Loads the configuration, starts the source watcher and the cache
//! reconnector, and logs dashboard events until interrupted.
//!
//! # Usage
//!
//! ```bash
//! # Default configuration next to the binary
//! cargo run --bin delay-dashboard
//!
//! # Explicit configuration file
//! cargo run --bin delay-dashboard -- path/to/config.toml
//! ```
//!
//! # Environment Variables
//!
//! - `DASHBOARD_CONFIG`: base configuration path (default: config.toml)
//! - `RUST_LOG`: Log level (default: info)

use std::env;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use delay_dashboard::cache::ComputationCache;
use delay_dashboard::config::ConfigStore;
use delay_dashboard::{logging, watcher, Dashboard, DashboardEvent};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("DASHBOARD_CONFIG").ok())
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Arc::new(
        ConfigStore::load(&config_path)
            .with_context(|| format!("loading configuration from {}", config_path))?,
    );
    let log_file = logging::init(&config.base().log).context("installing log subscriber")?;
    info!("Starting delay dashboard with {}", config_path);
    if let Some(log_file) = log_file {
        info!("Logging to {}", log_file.display());
    }
    info!("User config: {}", config.user_path().display());

    let cache = Arc::new(ComputationCache::from_config(config.base()).await);
    let dashboard = Arc::new(Dashboard::new(Arc::clone(&config), Arc::clone(&cache)));
    let mut events = dashboard.subscribe();

    let shutdown = CancellationToken::new();
    let watcher = watcher::spawn_watcher(Arc::clone(&dashboard), shutdown.clone());
    let reconnector = cache.spawn_reconnector(shutdown.clone());

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown requested");
                break;
            }
            event = events.recv() => match event {
                Ok(DashboardEvent::LoadFailed { message }) => warn!("Load failed: {}", message),
                Ok(event) => info!("{:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Dropped {} dashboard events", skipped),
                Err(RecvError::Closed) => break,
            },
        }
    }

    shutdown.cancel();
    for handle in [watcher, reconnector].into_iter().flatten() {
        handle.await?;
    }
    info!("Stopped");
    Ok(())
}
