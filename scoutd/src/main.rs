//! Scout daemon.
//!
//! Loads the configuration (optionally from the path given as the first
//! argument), opens the database and scans until interrupted.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod app;

use anyhow::Context;
use app::ScoutApp;
use scout_core::AppConfig;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Initialize tracing subscriber for logging
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

fn load_config() -> anyhow::Result<AppConfig> {
    let mut config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => AppConfig::load_from(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().context("failed to load config")?,
    };
    config.apply_env_overrides();
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.general.log_filter);

    info!("Starting Scout v{}", env!("CARGO_PKG_VERSION"));

    let app = ScoutApp::new(&config).await?;
    let shutdown = CancellationToken::new();

    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown requested"),
            Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
        }
        signal.cancel();
    });

    app.run(shutdown).await?;
    info!("Scout stopped");
    Ok(())
}
