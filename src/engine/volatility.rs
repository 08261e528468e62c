//! Volatility estimation.
//!
//! Two inputs feed the weight calculator's volatility factor: an
//! annualized EWMA estimate over externally supplied asset closes, and
//! an internal tracker of how much each market's implied probability
//! moves between cycles. These trackers are the only engine state that
//! survives across cycles besides the index history buffer.

use std::collections::{HashMap, VecDeque};

use crate::engine::probability::asset_in_title;
use crate::types::MarketSummary;

/// RiskMetrics-style decay for the squared-log-return EWMA.
pub const EWMA_LAMBDA: f64 = 0.94;

/// Annualized asset volatility above this reads as fully volatile.
const ASSET_VOL_CAP: f64 = 2.0;

/// Probability-delta stddev at or above this reads as fully volatile.
const PROB_VOL_CAP: f64 = 0.1;

/// Annualized EWMA volatility over a daily close series.
/// Returns `None` for series too short to produce a return.
pub fn ewma_volatility(closes: &[f64], lambda: f64) -> Option<f64> {
    let mut variance = 0.0;
    let mut initialized = false;

    for pair in closes.windows(2) {
        if pair[0] <= 0.0 || pair[1] <= 0.0 {
            continue;
        }
        let log_return = (pair[1] / pair[0]).ln();
        let squared = log_return * log_return;
        if initialized {
            variance = lambda * variance + (1.0 - lambda) * squared;
        } else {
            variance = squared;
            initialized = true;
        }
    }

    initialized.then(|| (variance * 365.0).sqrt())
}

// ---------------------------------------------------------------------------
// Probability-change tracking
// ---------------------------------------------------------------------------

/// Rolling per-market history of implied probabilities (average fill
/// prices), bounded per market and pruned to the markets still active.
#[derive(Debug)]
pub struct ProbabilityVolatilityTracker {
    max_observations: usize,
    histories: HashMap<String, VecDeque<f64>>,
}

impl ProbabilityVolatilityTracker {
    pub fn new(max_observations: usize) -> Self {
        Self {
            max_observations: max_observations.max(2),
            histories: HashMap::new(),
        }
    }

    /// Record this cycle's average price for a market.
    pub fn record(&mut self, condition_id: &str, avg_price: f64) {
        if !avg_price.is_finite() {
            return;
        }
        let history = self
            .histories
            .entry(condition_id.to_string())
            .or_default();
        history.push_back(avg_price);
        while history.len() > self.max_observations {
            history.pop_front();
        }
    }

    /// Standard deviation of successive price deltas for a market.
    /// `None` until at least three observations exist.
    pub fn delta_stddev(&self, condition_id: &str) -> Option<f64> {
        let history = self.histories.get(condition_id)?;
        if history.len() < 3 {
            return None;
        }
        let prices: Vec<f64> = history.iter().copied().collect();
        let deltas: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();
        let mean = deltas.iter().sum::<f64>() / deltas.len() as f64;
        let variance =
            deltas.iter().map(|d| (d - mean) * (d - mean)).sum::<f64>() / deltas.len() as f64;
        Some(variance.sqrt())
    }

    /// Drop histories for markets no longer in the active set.
    pub fn retain_markets(&mut self, active: &dyn Fn(&str) -> bool) {
        self.histories.retain(|id, _| active(id));
    }

    pub fn tracked_markets(&self) -> usize {
        self.histories.len()
    }
}

// ---------------------------------------------------------------------------
// Combined tracker
// ---------------------------------------------------------------------------

/// Blends external asset volatility with internal probability-change
/// volatility into one [0, 1] score per market.
#[derive(Debug)]
pub struct VolatilityTracker {
    asset_vol: HashMap<String, f64>,
    prob: ProbabilityVolatilityTracker,
}

impl VolatilityTracker {
    pub fn new(max_observations: usize) -> Self {
        Self {
            asset_vol: HashMap::new(),
            prob: ProbabilityVolatilityTracker::new(max_observations),
        }
    }

    /// Store an externally computed annualized volatility for an asset.
    pub fn set_asset_volatility(&mut self, symbol: &str, annualized: f64) {
        if annualized.is_finite() && annualized >= 0.0 {
            self.asset_vol.insert(symbol.to_string(), annualized);
        }
    }

    /// Record a market's implied probability for this cycle.
    pub fn observe(&mut self, market: &MarketSummary) {
        if market.total_volume > 0.0 {
            self.prob.record(&market.condition_id, market.avg_price());
        }
    }

    /// Drop per-market histories outside the active set.
    pub fn retain_markets(&mut self, active: &dyn Fn(&str) -> bool) {
        self.prob.retain_markets(active);
    }

    /// Number of markets with a probability history.
    pub fn tracked_markets(&self) -> usize {
        self.prob.tracked_markets()
    }

    /// Combined volatility in [0, 1] for a market, averaging whichever
    /// of the two components is available. `None` when neither is.
    pub fn combined(&self, market: &MarketSummary) -> Option<f64> {
        let asset_component = asset_in_title(&market.title)
            .and_then(|a| self.asset_vol.get(a.symbol))
            .map(|v| (v / ASSET_VOL_CAP).min(1.0));

        let prob_component = self
            .prob
            .delta_stddev(&market.condition_id)
            .map(|s| (s / PROB_VOL_CAP).min(1.0));

        match (asset_component, prob_component) {
            (Some(a), Some(p)) => Some(0.5 * a + 0.5 * p),
            (Some(a), None) => Some(a),
            (None, Some(p)) => Some(p),
            (None, None) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
