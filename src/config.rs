//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Validation is eager: category weights or sensitivity values outside
//! their documented ranges fail at load time with `CpmiError::Config` —
//! misconfiguration is the one error class allowed to surface, since it
//! indicates an operator mistake rather than runtime data variance.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::types::CpmiError;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub index: IndexConfig,
    pub sensitivity: SensitivityConfig,
    pub sources: SourcesConfig,
    pub api: ApiConfig,
    pub categories: Vec<CategoryConfig>,
}

/// Index computation parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Index value at perfect bullish/bearish balance.
    #[serde(default = "default_baseline")]
    pub baseline: f64,
    /// Rolling window for moving-average smoothing.
    #[serde(default = "default_smoothing_window_secs")]
    pub smoothing_window_secs: u64,
    /// Interval between recomputation ticks.
    #[serde(default = "default_update_interval_secs")]
    pub update_interval_secs: u64,
    /// How many recent history entries the API returns.
    #[serde(default = "default_history_tail")]
    pub history_tail: usize,
}

fn default_baseline() -> f64 {
    100.0
}
fn default_smoothing_window_secs() -> u64 {
    3600
}
fn default_update_interval_secs() -> u64 {
    300
}
fn default_history_tail() -> usize {
    20
}

/// Per-factor sensitivity, 0–10. Each factor's contribution to a market's
/// weight is scaled by `value / 10`.
#[derive(Debug, Deserialize, Serialize, Clone, Copy)]
pub struct SensitivityConfig {
    pub volume: u8,
    pub recency: u8,
    pub impact: u8,
    pub market_cap: u8,
    pub volatility: u8,
}

impl SensitivityConfig {
    /// Convert a 0–10 sensitivity value to a [0, 1] multiplier.
    pub fn multiplier(value: u8) -> f64 {
        f64::from(value) / 10.0
    }
}

impl Default for SensitivityConfig {
    fn default() -> Self {
        Self {
            volume: 8,
            recency: 6,
            impact: 7,
            market_cap: 5,
            volatility: 4,
        }
    }
}

/// One configured category: name, fixed aggregation weight, the ordered
/// keyword list the classifier matches against titles, and the impact
/// constant used by the weight calculator.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CategoryConfig {
    pub name: String,
    /// Fixed aggregation weight in [0, 1]. All category weights together
    /// must sum to at most 1.
    pub weight: f64,
    pub keywords: Vec<String>,
    /// Impact factor in [0, 1] for markets in this category.
    pub impact: f64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    /// Max trade records fetched per cycle.
    #[serde(default = "default_trade_limit")]
    pub trade_limit: u32,
    /// Whether to refresh reference prices / asset volatility each cycle.
    #[serde(default = "default_true")]
    pub prices_enabled: bool,
}

fn default_trade_limit() -> u32 {
    500
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all configured values are inside their documented ranges.
    pub fn validate(&self) -> Result<(), CpmiError> {
        if self.index.baseline <= 0.0 {
            return Err(CpmiError::Config(format!(
                "baseline must be positive, got {}",
                self.index.baseline
            )));
        }
        if self.index.smoothing_window_secs == 0 {
            return Err(CpmiError::Config(
                "smoothing window must be non-zero".to_string(),
            ));
        }
        if self.categories.is_empty() {
            return Err(CpmiError::Config("no categories configured".to_string()));
        }

        let mut weight_sum = 0.0;
        for cat in &self.categories {
            if !(0.0..=1.0).contains(&cat.weight) {
                return Err(CpmiError::Config(format!(
                    "category '{}' weight {} outside [0, 1]",
                    cat.name, cat.weight
                )));
            }
            if !(0.0..=1.0).contains(&cat.impact) {
                return Err(CpmiError::Config(format!(
                    "category '{}' impact {} outside [0, 1]",
                    cat.name, cat.impact
                )));
            }
            if cat.keywords.is_empty() {
                return Err(CpmiError::Config(format!(
                    "category '{}' has no keywords",
                    cat.name
                )));
            }
            weight_sum += cat.weight;
        }
        // Small tolerance for float accumulation
        if weight_sum > 1.0 + 1e-9 {
            return Err(CpmiError::Config(format!(
                "category weights sum to {weight_sum:.4}, must be ≤ 1"
            )));
        }

        for (name, value) in [
            ("volume", self.sensitivity.volume),
            ("recency", self.sensitivity.recency),
            ("impact", self.sensitivity.impact),
            ("market_cap", self.sensitivity.market_cap),
            ("volatility", self.sensitivity.volatility),
        ] {
            if value > 10 {
                return Err(CpmiError::Config(format!(
                    "sensitivity '{name}' is {value}, must be 0–10"
                )));
            }
        }

        Ok(())
    }
}

impl Default for AppConfig {
    /// The standard CPMI configuration: five crypto categories with
    /// weights summing to 1.0 and default engine parameters. Used by
    /// tests and as a fallback when no config file is present.
    fn default() -> Self {
        let cat = |name: &str, weight: f64, impact: f64, keywords: &[&str]| CategoryConfig {
            name: name.to_string(),
            weight,
            impact,
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        };

        Self {
            index: IndexConfig {
                baseline: default_baseline(),
                smoothing_window_secs: default_smoothing_window_secs(),
                update_interval_secs: default_update_interval_secs(),
                history_tail: default_history_tail(),
            },
            sensitivity: SensitivityConfig::default(),
            sources: SourcesConfig {
                trade_limit: default_trade_limit(),
                prices_enabled: true,
            },
            api: ApiConfig {
                enabled: true,
                port: 3000,
            },
            categories: vec![
                cat("bitcoin-price", 0.35, 1.0, &["bitcoin", "btc"]),
                cat("ethereum-price", 0.25, 0.8, &["ethereum", "$eth"]),
                cat(
                    "altcoin-price",
                    0.10,
                    0.6,
                    &["solana", "xrp", "dogecoin", "doge", "cardano"],
                ),
                cat(
                    "crypto-regulation",
                    0.15,
                    0.7,
                    &["regulat", "etf", "lawsuit", "legislation", "stablecoin bill"],
                ),
                cat(
                    "crypto-adoption",
                    0.15,
                    0.5,
                    &["adoption", "institutional", "reserve", "halving", "mining"],
                ),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
