//! Market weight calculation.
//!
//! Five independent factors, each normalized to roughly [0, 1], combined
//! as a linear blend scaled by the configured 0–10 sensitivities:
//! `weight = Σ factor × (sensitivity / 10)`, clamped to [0, 1] so no
//! single market can dominate aggregation.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::config::{CategoryConfig, SensitivityConfig};
use crate::engine::probability::market_cap_factor;
use crate::types::MarketSummary;

/// Volume at which the volume factor saturates.
pub const VOLUME_SCALE: f64 = 1000.0;

/// Trades older than this contribute zero recency.
pub const MAX_AGE_SECS: i64 = 24 * 3600;

/// Impact factor for markets matching no configured category.
const UNCLASSIFIED_IMPACT: f64 = 0.1;

/// Computes composite per-market weights from the configured
/// sensitivities and category impact constants.
pub struct WeightCalculator {
    sensitivity: SensitivityConfig,
    impact: HashMap<String, f64>,
}

impl WeightCalculator {
    pub fn new(sensitivity: SensitivityConfig, categories: &[CategoryConfig]) -> Self {
        let impact = categories
            .iter()
            .map(|c| (c.name.clone(), c.impact))
            .collect();
        Self {
            sensitivity,
            impact,
        }
    }

    /// `min(volume / 1000, 1)`.
    pub fn volume_factor(market: &MarketSummary) -> f64 {
        (market.total_volume / VOLUME_SCALE).min(1.0)
    }

    /// Linear decay from 1 (just traded) to 0 (a day old or older).
    /// Zero when the market has no trades.
    pub fn time_factor(market: &MarketSummary, now: DateTime<Utc>) -> f64 {
        let Some(last) = &market.last_trade else {
            return 0.0;
        };
        let age = now.timestamp() - last.timestamp;
        (1.0 - age as f64 / MAX_AGE_SECS as f64).clamp(0.0, 1.0)
    }

    /// Static per-category constant; 0.1 for uncategorized markets.
    pub fn impact_factor(&self, market: &MarketSummary) -> f64 {
        market
            .category
            .as_deref()
            .and_then(|c| self.impact.get(c).copied())
            .unwrap_or(UNCLASSIFIED_IMPACT)
    }

    /// Composite weight. `volatility` is the combined [0, 1] volatility
    /// score when the trackers have one; its factor is `1 − volatility`
    /// and is skipped entirely when no estimate exists yet.
    pub fn compute(
        &self,
        market: &MarketSummary,
        now: DateTime<Utc>,
        volatility: Option<f64>,
    ) -> f64 {
        let s = self.sensitivity;
        let mut weight = Self::volume_factor(market) * SensitivityConfig::multiplier(s.volume)
            + Self::time_factor(market, now) * SensitivityConfig::multiplier(s.recency)
            + self.impact_factor(market) * SensitivityConfig::multiplier(s.impact)
            + market_cap_factor(&market.title) * SensitivityConfig::multiplier(s.market_cap);

        if let Some(v) = volatility {
            let factor = (1.0 - v).clamp(0.0, 1.0);
            weight += factor * SensitivityConfig::multiplier(s.volatility);
        }

        weight.clamp(0.0, 1.0)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
