//! Shared types for the CPMI engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that source, engine, and API
//! modules can depend on them without circular references.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Trade
// ---------------------------------------------------------------------------

/// Trade direction as reported by the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// A single trade on a prediction market, as ingested from the venue.
///
/// Immutable once ingested; lives for one aggregation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Venue-assigned market identifier.
    pub condition_id: String,
    pub title: String,
    pub slug: String,
    pub event_slug: String,
    pub side: TradeSide,
    /// Trade size in shares (≥ 0).
    pub size: f64,
    /// Fill price as an implied probability (0.0–1.0).
    pub price: f64,
    /// Unix seconds.
    pub timestamp: i64,
}

impl TradeRecord {
    /// Notional value of this trade (size × price).
    pub fn value(&self) -> f64 {
        self.size * self.price
    }

    /// Trade time as a chrono timestamp.
    pub fn time(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.timestamp, 0)
            .single()
            .unwrap_or_else(Utc::now)
    }
}

impl fmt::Display for TradeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {:.2} @ {:.0}¢ ({})",
            self.condition_id, self.side, self.size, self.price * 100.0, self.title,
        )
    }
}

// ---------------------------------------------------------------------------
// Market classification
// ---------------------------------------------------------------------------

/// Heuristic market-type tag derived from the market title.
///
/// Drives which probability-extraction strategy applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MarketType {
    /// "X between $A and $B" markets.
    Range,
    /// "Will X reach/hit/exceed $N" markets.
    PriceTarget,
    /// "Up or down" / explicitly bullish-bearish markets.
    Directional,
    /// Generic "Will X happen?" yes/no markets.
    Binary,
    /// Fallback when no structural pattern matches; resolved from
    /// trade-flow sentiment instead of price semantics.
    Sentiment,
}

impl fmt::Display for MarketType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketType::Range => write!(f, "range"),
            MarketType::PriceTarget => write!(f, "price-target"),
            MarketType::Directional => write!(f, "directional"),
            MarketType::Binary => write!(f, "binary"),
            MarketType::Sentiment => write!(f, "sentiment"),
        }
    }
}

// ---------------------------------------------------------------------------
// Market summary
// ---------------------------------------------------------------------------

/// Per-market aggregation of one cycle's trades, plus the derived
/// classification, probability, and weight filled in by the engine.
///
/// Created fresh every aggregation cycle; nothing here survives across
/// cycles except what the volatility trackers keep per `condition_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSummary {
    pub condition_id: String,
    pub title: String,
    pub trades: Vec<TradeRecord>,
    pub total_volume: f64,
    pub total_value: f64,
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub buy_trades: u64,
    pub sell_trades: u64,
    /// The most recent trade by timestamp.
    pub last_trade: Option<TradeRecord>,
    /// Category name assigned by the classifier; `None` = uncategorized,
    /// excluded from index aggregation.
    pub category: Option<String>,
    pub market_type: MarketType,
    /// Bullish probability in [0, 100]; `None` until extraction runs.
    pub bullish_probability: Option<f64>,
    /// Composite aggregation weight (≥ 0).
    pub weight: f64,
}

impl MarketSummary {
    /// Empty summary for a market identifier, before any trades accumulate.
    pub fn new(condition_id: &str, title: &str) -> Self {
        Self {
            condition_id: condition_id.to_string(),
            title: title.to_string(),
            trades: Vec::new(),
            total_volume: 0.0,
            total_value: 0.0,
            buy_volume: 0.0,
            sell_volume: 0.0,
            buy_trades: 0,
            sell_trades: 0,
            last_trade: None,
            category: None,
            market_type: MarketType::Sentiment,
            bullish_probability: None,
            weight: 0.0,
        }
    }

    /// Volume-weighted average fill price. Returns 0.0 for a market with
    /// no volume — callers must check `total_volume` before trusting it.
    pub fn avg_price(&self) -> f64 {
        if self.total_volume > 0.0 {
            self.total_value / self.total_volume
        } else {
            0.0
        }
    }

    /// Fraction of trades that were buys. 0.5 (neutral) when no trades.
    pub fn buy_trade_ratio(&self) -> f64 {
        let total = self.buy_trades + self.sell_trades;
        if total == 0 {
            0.5
        } else {
            self.buy_trades as f64 / total as f64
        }
    }

    /// Fraction of volume on the buy side. 0.5 (neutral) when no volume.
    pub fn buy_volume_ratio(&self) -> f64 {
        let total = self.buy_volume + self.sell_volume;
        if total <= 0.0 {
            0.5
        } else {
            self.buy_volume / total
        }
    }
}

impl fmt::Display for MarketSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} | vol={:.1} avg={:.0}¢ trades={} ({}B/{}S) | {} {}",
            self.condition_id,
            self.title,
            self.total_volume,
            self.avg_price() * 100.0,
            self.trades.len(),
            self.buy_trades,
            self.sell_trades,
            self.category.as_deref().unwrap_or("uncategorized"),
            self.market_type,
        )
    }
}

// ---------------------------------------------------------------------------
// Index history
// ---------------------------------------------------------------------------

/// One computed index point, appended every cycle and pruned to the
/// smoothing window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexHistoryEntry {
    pub timestamp: DateTime<Utc>,
    /// Raw (unsmoothed) index value on the 100-baseline scale.
    pub value: f64,
    /// Overall bullish probability in [0, 100] that produced `value`.
    pub probability: f64,
}

/// Sentiment label for an index or probability reading.
pub fn interpret_index(value: f64, baseline: f64) -> &'static str {
    if value > baseline {
        "Bullish"
    } else if value < baseline {
        "Bearish"
    } else {
        "Neutral"
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for CPMI.
///
/// Parse failures inside the engine never surface here — they degrade to
/// neutral values. Only fetch failures and operator misconfiguration are
/// reportable errors.
#[derive(Debug, thiserror::Error)]
pub enum CpmiError {
    #[error("Data fetch failed ({source_name}): {message}")]
    Fetch { source_name: String, message: String },

    #[error("Malformed payload from {source_name}: {message}")]
    Malformed { source_name: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl CpmiError {
    /// Shorthand for a fetch error with a named source.
    pub fn fetch(source_name: &str, message: impl fmt::Display) -> Self {
        CpmiError::Fetch {
            source_name: source_name.to_string(),
            message: message.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
