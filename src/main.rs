//! CPMI — Crypto Prediction Market Index
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the trade and price sources into the index engine, spawns the
//! API server, and runs the periodic recomputation loop with graceful
//! shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use cpmi::api;
use cpmi::config::AppConfig;
use cpmi::engine::scheduler::IndexScheduler;
use cpmi::engine::IndexEngine;
use cpmi::sources::coingecko::CoinGeckoClient;
use cpmi::sources::polymarket::PolymarketClient;
use cpmi::sources::PriceSource;

const BANNER: &str = r#"
   ____ ____  __  __ ___
  / ___|  _ \|  \/  |_ _|
 | |   | |_) | |\/| || |
 | |___|  __/| |  | || |
  \____|_|   |_|  |_|___|

  Crypto Prediction Market Index
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML (validated eagerly)
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        baseline = cfg.index.baseline,
        smoothing_window_secs = cfg.index.smoothing_window_secs,
        update_interval_secs = cfg.index.update_interval_secs,
        categories = cfg.categories.len(),
        "CPMI starting up"
    );

    // -- Initialise components -------------------------------------------

    let trades = Arc::new(PolymarketClient::new()?);

    let prices: Option<Arc<dyn PriceSource>> = if cfg.sources.prices_enabled {
        Some(Arc::new(CoinGeckoClient::new()?))
    } else {
        info!("Reference price refresh disabled; using static defaults");
        None
    };

    let engine = Arc::new(RwLock::new(IndexEngine::new(cfg.clone())?));

    if cfg.api.enabled {
        api::spawn_api(engine.clone(), cfg.api.port)?;
    }

    let scheduler = Arc::new(IndexScheduler::new(engine, trades, prices, &cfg));

    // -- Main loop ---------------------------------------------------------

    let handle = scheduler.clone().spawn();
    info!("Entering main loop. Press Ctrl+C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received.");

    scheduler.stop();
    let _ = handle.await;

    info!("CPMI shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("cpmi=info"));

    let json_logging = std::env::var("CPMI_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
