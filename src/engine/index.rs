//! Category and index aggregation.
//!
//! Weighted-averages per-market probabilities into category
//! probabilities, categories into one overall probability (renormalized
//! against *active* category weight), converts to the 100-baseline
//! scale, and smooths over a rolling history window. The `IndexState`
//! is owned by the aggregator instance — injectable, never a global —
//! so tests and multiple independent indices stay cheap.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, VecDeque};

use crate::config::{AppConfig, CategoryConfig};
use crate::types::{interpret_index, IndexHistoryEntry, MarketSummary, MarketType};

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Snapshot of the current index for the API layer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentIndexReport {
    pub value: f64,
    pub interpretation: String,
    pub last_update: Option<DateTime<Utc>>,
    pub category_indices: HashMap<String, Option<f64>>,
    /// Most recent history entries, oldest first.
    pub history_tail: Vec<IndexHistoryEntry>,
}

/// Per-category breakdown entry. `index` is the category's bullish
/// probability on the [0, 100] scale; interpretation and deviation are
/// relative to the neutral 50.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryBreakdownEntry {
    pub index: Option<f64>,
    pub weight: f64,
    pub interpretation: Option<String>,
    pub deviation: Option<f64>,
}

/// Descriptive statistics over the current history buffer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatistics {
    pub min: f64,
    pub max: f64,
    pub average: f64,
    /// Standard deviation of raw index values in the buffer.
    pub volatility: f64,
    pub data_points: usize,
    pub time_range_secs: i64,
}

/// Raw per-market diagnostics from the latest cycle, for the export
/// endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketDiagnostic {
    pub condition_id: String,
    pub title: String,
    pub category: Option<String>,
    pub market_type: MarketType,
    pub bullish_probability: Option<f64>,
    pub weight: f64,
    pub total_volume: f64,
    pub trade_count: usize,
}

// ---------------------------------------------------------------------------
// Category aggregation
// ---------------------------------------------------------------------------

/// Weighted mean of bullish probabilities over a category's markets.
/// Only markets with positive weight and an extracted probability
/// qualify; `None` when none do (the category drops out of the index
/// for this cycle — it is not treated as zero).
pub fn aggregate_category<'a, I>(markets: I) -> Option<f64>
where
    I: IntoIterator<Item = &'a MarketSummary>,
{
    let mut weighted_sum = 0.0;
    let mut weight_sum = 0.0;
    for market in markets {
        let Some(probability) = market.bullish_probability else {
            continue;
        };
        if market.weight <= 0.0 {
            continue;
        }
        weighted_sum += probability * market.weight;
        weight_sum += market.weight;
    }
    (weight_sum > 0.0).then(|| weighted_sum / weight_sum)
}

// ---------------------------------------------------------------------------
// Index state
// ---------------------------------------------------------------------------

/// Process-wide index state, owned by one `IndexAggregator`.
#[derive(Debug)]
pub struct IndexState {
    current_value: f64,
    history: VecDeque<IndexHistoryEntry>,
    category_indices: HashMap<String, Option<f64>>,
    last_update: Option<DateTime<Utc>>,
    diagnostics: Vec<MarketDiagnostic>,
}

impl IndexState {
    fn new(baseline: f64) -> Self {
        Self {
            current_value: baseline,
            history: VecDeque::new(),
            category_indices: HashMap::new(),
            last_update: None,
            diagnostics: Vec::new(),
        }
    }
}

/// Top-level aggregator: category probabilities → overall probability →
/// baseline-scale index → smoothed history.
pub struct IndexAggregator {
    baseline: f64,
    window: Duration,
    history_tail: usize,
    categories: Vec<CategoryConfig>,
    state: IndexState,
}

impl IndexAggregator {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            baseline: config.index.baseline,
            window: Duration::seconds(config.index.smoothing_window_secs as i64),
            history_tail: config.index.history_tail,
            categories: config.categories.clone(),
            state: IndexState::new(config.index.baseline),
        }
    }

    /// Run one aggregation cycle over fully enriched market summaries
    /// (classified, probability-extracted, weighted).
    ///
    /// Returns the new smoothed index, or `None` when no category had
    /// qualifying data — in which case the state is left completely
    /// untouched and the index keeps its last smoothed value.
    pub fn update(
        &mut self,
        markets: &HashMap<String, MarketSummary>,
        now: DateTime<Utc>,
    ) -> Option<f64> {
        // Step 1: per-category probabilities
        let mut category_probs: HashMap<String, Option<f64>> = HashMap::new();
        for cat in &self.categories {
            let members = markets
                .values()
                .filter(|m| m.category.as_deref() == Some(cat.name.as_str()));
            category_probs.insert(cat.name.clone(), aggregate_category(members));
        }

        // Step 2: overall probability over *active* categories only.
        // An absent category shrinks the denominator — it never dilutes
        // the categories that do have data.
        let mut weighted_sum = 0.0;
        let mut active_weight = 0.0;
        for cat in &self.categories {
            if let Some(prob) = category_probs.get(&cat.name).copied().flatten() {
                weighted_sum += prob * cat.weight;
                active_weight += cat.weight;
            }
        }
        if active_weight <= 0.0 {
            return None;
        }
        let overall = weighted_sum / active_weight;

        // Step 3: baseline conversion
        let raw_index = self.baseline + (overall - 50.0);

        // Steps 4–5: history append, window prune, moving average
        self.state.history.push_back(IndexHistoryEntry {
            timestamp: now,
            value: raw_index,
            probability: overall,
        });
        let cutoff = now - self.window;
        while self
            .state
            .history
            .front()
            .map_or(false, |e| e.timestamp < cutoff)
        {
            self.state.history.pop_front();
        }
        let smoothed = self.state.history.iter().map(|e| e.value).sum::<f64>()
            / self.state.history.len() as f64;

        // Step 6: publish
        self.state.current_value = smoothed;
        self.state.category_indices = category_probs;
        self.state.last_update = Some(now);
        self.state.diagnostics = markets
            .values()
            .map(|m| MarketDiagnostic {
                condition_id: m.condition_id.clone(),
                title: m.title.clone(),
                category: m.category.clone(),
                market_type: m.market_type,
                bullish_probability: m.bullish_probability,
                weight: m.weight,
                total_volume: m.total_volume,
                trade_count: m.trades.len(),
            })
            .collect();

        Some(smoothed)
    }

    // -- Read side ---------------------------------------------------------

    pub fn baseline(&self) -> f64 {
        self.baseline
    }

    pub fn current_value(&self) -> f64 {
        self.state.current_value
    }

    pub fn last_update(&self) -> Option<DateTime<Utc>> {
        self.state.last_update
    }

    pub fn history(&self) -> impl Iterator<Item = &IndexHistoryEntry> {
        self.state.history.iter()
    }

    pub fn diagnostics(&self) -> &[MarketDiagnostic] {
        &self.state.diagnostics
    }

    /// Current index snapshot with the recent history tail.
    pub fn current_index(&self) -> CurrentIndexReport {
        let skip = self.state.history.len().saturating_sub(self.history_tail);
        CurrentIndexReport {
            value: self.state.current_value,
            interpretation: interpret_index(self.state.current_value, self.baseline).to_string(),
            last_update: self.state.last_update,
            category_indices: self.state.category_indices.clone(),
            history_tail: self.state.history.iter().skip(skip).cloned().collect(),
        }
    }

    /// Per-category breakdown against the neutral 50 mark.
    pub fn category_breakdown(&self) -> HashMap<String, CategoryBreakdownEntry> {
        self.categories
            .iter()
            .map(|cat| {
                let index = self
                    .state
                    .category_indices
                    .get(&cat.name)
                    .copied()
                    .flatten();
                (
                    cat.name.clone(),
                    CategoryBreakdownEntry {
                        index,
                        weight: cat.weight,
                        interpretation: index
                            .map(|i| interpret_index(i, 50.0).to_string()),
                        deviation: index.map(|i| i - 50.0),
                    },
                )
            })
            .collect()
    }

    /// Statistics over the history buffer; `None` while it is empty.
    pub fn statistics(&self) -> Option<IndexStatistics> {
        if self.state.history.is_empty() {
            return None;
        }
        let values: Vec<f64> = self.state.history.iter().map(|e| e.value).collect();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let average = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values
            .iter()
            .map(|v| (v - average) * (v - average))
            .sum::<f64>()
            / values.len() as f64;
        let first = self.state.history.front().map(|e| e.timestamp);
        let last = self.state.history.back().map(|e| e.timestamp);
        let time_range_secs = match (first, last) {
            (Some(f), Some(l)) => (l - f).num_seconds(),
            _ => 0,
        };

        Some(IndexStatistics {
            min,
            max,
            average,
            volatility: variance.sqrt(),
            data_points: values.len(),
            time_range_secs,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
