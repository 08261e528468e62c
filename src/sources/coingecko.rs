//! CoinGecko reference prices.
//!
//! Pulls a daily close series per asset from the market-chart endpoint
//! (no auth required). The last close doubles as the current reference
//! price; the full series feeds the EWMA volatility estimator.
//!
//! API: https://api.coingecko.com/api/v3

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::sources::{PriceSource, Ticker};
use crate::types::CpmiError;

const API_URL: &str = "https://api.coingecko.com/api/v3";
const SOURCE_NAME: &str = "coingecko";
const CHART_DAYS: u32 = 30;

#[derive(Debug, Deserialize)]
struct MarketChart {
    /// `[timestamp_ms, price]` pairs, oldest first.
    #[serde(default)]
    prices: Vec<(f64, f64)>,
}

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to build CoinGecko HTTP client")?;

        Ok(Self {
            http,
            base_url: API_URL.to_string(),
        })
    }

    /// Client pointed at a custom base URL (test servers).
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let mut client = Self::new()?;
        client.base_url = base_url.trim_end_matches('/').to_string();
        Ok(client)
    }

    fn chart_to_ticker(chart: MarketChart) -> Result<Ticker, CpmiError> {
        let closes: Vec<f64> = chart
            .prices
            .iter()
            .map(|(_, price)| *price)
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();

        let Some(&price) = closes.last() else {
            return Err(CpmiError::Malformed {
                source_name: SOURCE_NAME.to_string(),
                message: "market chart contained no usable closes".to_string(),
            });
        };

        Ok(Ticker { price, closes })
    }
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn ticker(&self, symbol: &str) -> Result<Ticker, CpmiError> {
        let url = format!("{}/coins/{symbol}/market_chart", self.base_url);
        debug!(symbol, "Fetching CoinGecko market chart");

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("vs_currency", "usd"),
                ("days", &CHART_DAYS.to_string()),
                ("interval", "daily"),
            ])
            .send()
            .await
            .map_err(|e| CpmiError::fetch(SOURCE_NAME, e))?;

        if !resp.status().is_success() {
            return Err(CpmiError::fetch(
                SOURCE_NAME,
                format!("HTTP {} for {symbol}", resp.status()),
            ));
        }

        let chart: MarketChart = resp.json().await.map_err(|e| CpmiError::Malformed {
            source_name: SOURCE_NAME.to_string(),
            message: e.to_string(),
        })?;

        Self::chart_to_ticker(chart)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
