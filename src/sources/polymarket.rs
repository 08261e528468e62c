//! Polymarket trade feed.
//!
//! Uses the public data API (no auth required) to pull recent trades,
//! converts them into `TradeRecord`s with tolerant field defaults, and
//! pre-filters to crypto-relevant markets so the engine never has to.
//!
//! Data API: https://data-api.polymarket.com

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::sources::TradeSource;
use crate::types::{CpmiError, TradeRecord, TradeSide};

const DATA_API_URL: &str = "https://data-api.polymarket.com";
const SOURCE_NAME: &str = "polymarket";

/// Titles or slugs must contain one of these to count as crypto-relevant.
/// Deliberately excludes the bare "eth" token ("whether" contains it).
const CRYPTO_KEYWORDS: &[&str] = &[
    "bitcoin",
    "btc",
    "ethereum",
    "crypto",
    "solana",
    "xrp",
    "doge",
    "cardano",
    "stablecoin",
    "blockchain",
    "defi",
    "halving",
];

// ---------------------------------------------------------------------------
// Data API response types
// ---------------------------------------------------------------------------

/// Raw trade as the data API reports it. Every field defaults so that a
/// partially populated record deserializes instead of failing the batch.
#[derive(Debug, Deserialize, Clone)]
pub struct RawTrade {
    #[serde(default, rename = "conditionId")]
    pub condition_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default, rename = "eventSlug")]
    pub event_slug: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub size: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub timestamp: i64,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct PolymarketClient {
    http: Client,
    base_url: String,
}

impl PolymarketClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build Polymarket HTTP client")?;

        Ok(Self {
            http,
            base_url: DATA_API_URL.to_string(),
        })
    }

    /// Client pointed at a custom base URL (test servers).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let mut client = Self::new()?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }

    /// Convert a raw API trade into the engine's record type.
    /// Returns `None` for records missing their market identity or
    /// carrying an unrecognized side.
    pub fn convert_trade(raw: &RawTrade) -> Option<TradeRecord> {
        if raw.condition_id.is_empty() || raw.title.is_empty() {
            return None;
        }
        let side = match raw.side.to_uppercase().as_str() {
            "BUY" => TradeSide::Buy,
            "SELL" => TradeSide::Sell,
            other => {
                debug!(side = other, condition_id = %raw.condition_id, "Unknown trade side, skipping");
                return None;
            }
        };

        Some(TradeRecord {
            condition_id: raw.condition_id.clone(),
            title: raw.title.clone(),
            slug: raw.slug.clone(),
            event_slug: raw.event_slug.clone(),
            side,
            size: if raw.size.is_finite() { raw.size.max(0.0) } else { 0.0 },
            price: if raw.price.is_finite() { raw.price.clamp(0.0, 1.0) } else { 0.0 },
            timestamp: raw.timestamp,
        })
    }

    /// Whether a trade belongs to a crypto market. The engine aggregates
    /// whatever it is given; this is the upstream relevance filter.
    pub fn is_crypto_relevant(trade: &TradeRecord) -> bool {
        let haystack = format!(
            "{} {} {}",
            trade.title.to_lowercase(),
            trade.slug.to_lowercase(),
            trade.event_slug.to_lowercase()
        );
        CRYPTO_KEYWORDS.iter().any(|k| haystack.contains(k))
    }
}

#[async_trait]
impl TradeSource for PolymarketClient {
    async fn recent_trades(&self, limit: u32) -> Result<Vec<TradeRecord>, CpmiError> {
        let url = format!("{}/trades", self.base_url);
        debug!(limit, "Fetching Polymarket trades");

        let resp = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string().as_str()), ("takerOnly", "true")])
            .send()
            .await
            .map_err(|e| CpmiError::fetch(SOURCE_NAME, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(CpmiError::fetch(
                SOURCE_NAME,
                format!("HTTP {status}: {body}"),
            ));
        }

        let raw: Vec<RawTrade> = resp.json().await.map_err(|e| CpmiError::Malformed {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;

        let total = raw.len();
        let trades: Vec<TradeRecord> = raw
            .iter()
            .filter_map(Self::convert_trade)
            .filter(Self::is_crypto_relevant)
            .collect();

        if trades.is_empty() && total > 0 {
            warn!(total, "No crypto-relevant trades in batch");
        }
        info!(total, crypto = trades.len(), "Fetched Polymarket trades");
        Ok(trades)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
