//! External data sources.
//!
//! Defines the `TradeSource` and `PriceSource` traits and provides the
//! Polymarket and CoinGecko implementations. The engine only ever sees
//! these traits, so tests drive it with in-memory mocks.

pub mod polymarket;
pub mod coingecko;

use async_trait::async_trait;

use crate::types::{CpmiError, TradeRecord};

/// Abstraction over a prediction-market trade feed.
///
/// Implementations must tolerate missing or partial fields (defaulting
/// volume and price to 0) and report failure as `CpmiError::Fetch`
/// rather than surfacing raw transport errors into the engine.
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Fetch the most recent trades, capped at `limit`.
    async fn recent_trades(&self, limit: u32) -> Result<Vec<TradeRecord>, CpmiError>;

    /// Source name for logging and error reporting.
    fn name(&self) -> &str;
}

/// Current price plus a recent close series for one asset.
#[derive(Debug, Clone)]
pub struct Ticker {
    pub price: f64,
    /// Daily closes, oldest first.
    pub closes: Vec<f64>,
}

/// Abstraction over a reference-price feed for the assets that price
/// markets mention. Failures here are non-fatal: the engine keeps its
/// last known reference table.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn ticker(&self, symbol: &str) -> Result<Ticker, CpmiError>;

    fn name(&self) -> &str;
}
