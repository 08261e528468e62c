//! Core engine — the classify → extract → weigh → aggregate pipeline.
//!
//! `IndexEngine` owns every piece of cross-cycle state (the index
//! history and the volatility trackers) and exposes one synchronous
//! entry point, `compute_cycle`, so tests can drive full cycles without
//! timers or I/O. Fetching lives in the scheduler.

pub mod aggregator;
pub mod classifier;
pub mod index;
pub mod probability;
pub mod scheduler;
pub mod volatility;
pub mod weights;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{AppConfig, CategoryConfig, SensitivityConfig};
use crate::sources::Ticker;
use crate::types::{CpmiError, TradeRecord};

use classifier::Classifier;
use index::{
    CategoryBreakdownEntry, CurrentIndexReport, IndexAggregator, IndexStatistics,
    MarketDiagnostic,
};
use probability::ProbabilityExtractor;
use volatility::{ewma_volatility, VolatilityTracker, EWMA_LAMBDA};
use weights::WeightCalculator;

/// Observations kept per market for probability-change volatility.
const PROB_VOL_OBSERVATIONS: usize = 24;

/// Tracker histories are pruned back to the active market set once this
/// many markets have accumulated.
const MAX_TRACKED_MARKETS: usize = 1024;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// Summary of one aggregation cycle, for logging.
#[derive(Debug, Clone)]
pub struct CycleSummary {
    pub trades_in: usize,
    pub markets: usize,
    pub categorized: usize,
    /// New smoothed index, or `None` when no category had data.
    pub index: Option<f64>,
}

/// Configuration echo included in the export snapshot.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportConfiguration {
    pub baseline: f64,
    pub smoothing_window_secs: u64,
    pub update_interval_secs: u64,
    pub sensitivity: SensitivityConfig,
    pub categories: Vec<CategoryConfig>,
}

/// Full diagnostic snapshot: index, breakdown, statistics, the active
/// configuration, and raw per-market numbers from the latest cycle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportReport {
    pub index: CurrentIndexReport,
    pub categories: HashMap<String, CategoryBreakdownEntry>,
    pub statistics: Option<IndexStatistics>,
    pub configuration: ExportConfiguration,
    pub markets: Vec<MarketDiagnostic>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// One index instance: classifier, extractor, weight calculator,
/// volatility trackers, and the aggregator that owns `IndexState`.
pub struct IndexEngine {
    config: AppConfig,
    classifier: Classifier,
    extractor: ProbabilityExtractor,
    weights: WeightCalculator,
    volatility: VolatilityTracker,
    aggregator: IndexAggregator,
}

impl IndexEngine {
    /// Build an engine from validated configuration. Misconfiguration
    /// surfaces here, eagerly — never mid-cycle.
    pub fn new(config: AppConfig) -> Result<Self, CpmiError> {
        config.validate()?;
        Ok(Self {
            classifier: Classifier::from_categories(&config.categories),
            extractor: ProbabilityExtractor::new(),
            weights: WeightCalculator::new(config.sensitivity, &config.categories),
            volatility: VolatilityTracker::new(PROB_VOL_OBSERVATIONS),
            aggregator: IndexAggregator::new(&config),
            config,
        })
    }

    /// Run one full aggregation cycle over a trade batch.
    ///
    /// Synchronous and infallible: bad titles and missing numbers have
    /// already degraded to neutral values by the time aggregation runs.
    pub fn compute_cycle(&mut self, trades: Vec<TradeRecord>, now: DateTime<Utc>) -> CycleSummary {
        let trades_in = trades.len();
        let mut markets = aggregator::aggregate(trades);

        for market in markets.values_mut() {
            let (slug, event_slug) = market
                .trades
                .first()
                .map(|t| (t.slug.clone(), t.event_slug.clone()))
                .unwrap_or_default();
            let (category, market_type) =
                self.classifier.classify(&market.title, &slug, &event_slug);
            market.category = category.map(String::from);
            market.market_type = market_type;

            market.bullish_probability = Some(self.extractor.extract(market));

            self.volatility.observe(market);
            let combined = self.volatility.combined(market);
            market.weight = self.weights.compute(market, now, combined);

            debug!(
                condition_id = %market.condition_id,
                category = market.category.as_deref().unwrap_or("uncategorized"),
                market_type = %market.market_type,
                probability = market.bullish_probability,
                weight = market.weight,
                "Market enriched"
            );
        }

        if self.volatility.tracked_markets() > MAX_TRACKED_MARKETS {
            self.volatility
                .retain_markets(&|id| markets.contains_key(id));
        }

        let categorized = markets.values().filter(|m| m.category.is_some()).count();
        let index = self.aggregator.update(&markets, now);

        CycleSummary {
            trades_in,
            markets: markets.len(),
            categorized,
            index,
        }
    }

    /// Feed a fresh reference price and close series for an asset.
    pub fn apply_ticker(&mut self, symbol: &str, ticker: &Ticker) {
        self.extractor.set_reference_price(symbol, ticker.price);
        if let Some(vol) = ewma_volatility(&ticker.closes, EWMA_LAMBDA) {
            self.volatility.set_asset_volatility(symbol, vol);
        }
    }

    // -- Read side ---------------------------------------------------------

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn current_index(&self) -> CurrentIndexReport {
        self.aggregator.current_index()
    }

    pub fn category_breakdown(&self) -> HashMap<String, CategoryBreakdownEntry> {
        self.aggregator.category_breakdown()
    }

    pub fn statistics(&self) -> Option<IndexStatistics> {
        self.aggregator.statistics()
    }

    /// Full history buffer, oldest first.
    pub fn history(&self) -> Vec<crate::types::IndexHistoryEntry> {
        self.aggregator.history().cloned().collect()
    }

    pub fn export(&self) -> ExportReport {
        ExportReport {
            index: self.aggregator.current_index(),
            categories: self.aggregator.category_breakdown(),
            statistics: self.aggregator.statistics(),
            configuration: ExportConfiguration {
                baseline: self.config.index.baseline,
                smoothing_window_secs: self.config.index.smoothing_window_secs,
                update_interval_secs: self.config.index.update_interval_secs,
                sensitivity: self.config.sensitivity,
                categories: self.config.categories.clone(),
            },
            markets: self.aggregator.diagnostics().to_vec(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
