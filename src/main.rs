//! Price Crawler - Entry Point
//!
//! Loads configuration, initializes logging, and hands control to the
//! supervisor. Runs until SIGINT/SIGTERM.
//!
//! Wiring sequence:
//! 1. Load config (first CLI argument, default `config.toml`) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Supervisor builds Kraken/Coinbase sources, file + memory publishers
//! 4. Supervisor spawns the poll loop and the file server
//! 5. Wait for SIGINT/SIGTERM → cancel → join both tasks → exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};

use price_crawler::config::loader::load_config;
use price_crawler::usecases::Supervisor;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load configuration from {config_path}"))?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.crawler.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.crawler.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        interval_ms = config.crawler.interval_ms,
        currencies = ?config.crawler.currencies,
        publish_path = %config.publish.path,
        "Starting price crawler"
    );

    // ── 3. Run until a signal or a task exits ───────────────
    let result = Supervisor::new(config).run(shutdown_signal()).await;

    match &result {
        Ok(()) => info!("Price crawler stopped cleanly"),
        Err(e) => error!(error = %e, "Price crawler stopped with an error"),
    }
    result
}

/// Resolve on SIGINT, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT"),
        () = terminate => info!("Received SIGTERM"),
    }
}
