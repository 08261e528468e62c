//! Bullish-probability extraction.
//!
//! Produces one scalar in [0, 100] per market using market-type-specific
//! logic. The fragile string heuristics (price parsing, range parsing,
//! outcome polarity) are kept as independent pure functions so each can
//! be unit-tested against a literal corpus of titles.
//!
//! Every branch clamps its output and degrades to 50 (neutral) on any
//! unparseable numeric input — this module never returns NaN and never
//! errors.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::types::{MarketSummary, MarketType};

// ---------------------------------------------------------------------------
// Asset table
// ---------------------------------------------------------------------------

/// A crypto asset the engine recognizes in market titles.
pub struct AssetInfo {
    /// Canonical symbol, also the price-source identifier.
    pub symbol: &'static str,
    pub keywords: &'static [&'static str],
    /// Fallback reference price used until a live price arrives.
    pub default_price: f64,
    /// Fixed market-cap ranking factor in [0, 1].
    pub market_cap_factor: f64,
}

/// Fixed asset ranking table, largest cap first.
pub const KNOWN_ASSETS: &[AssetInfo] = &[
    AssetInfo {
        symbol: "bitcoin",
        keywords: &["bitcoin", "btc"],
        default_price: 95_000.0,
        market_cap_factor: 1.0,
    },
    AssetInfo {
        symbol: "ethereum",
        keywords: &["ethereum", "$eth", "eth price"],
        default_price: 3_300.0,
        market_cap_factor: 0.9,
    },
    AssetInfo {
        symbol: "solana",
        keywords: &["solana", "$sol"],
        default_price: 180.0,
        market_cap_factor: 0.7,
    },
    AssetInfo {
        symbol: "xrp",
        keywords: &["xrp", "ripple"],
        default_price: 2.2,
        market_cap_factor: 0.6,
    },
    AssetInfo {
        symbol: "dogecoin",
        keywords: &["dogecoin", "doge"],
        default_price: 0.32,
        market_cap_factor: 0.5,
    },
    AssetInfo {
        symbol: "cardano",
        keywords: &["cardano", "$ada"],
        default_price: 0.95,
        market_cap_factor: 0.4,
    },
];

/// Market-cap factor for markets referencing no known asset.
pub const DEFAULT_MARKET_CAP_FACTOR: f64 = 0.2;

/// First known asset referenced by a title, in ranking order.
pub fn asset_in_title(title: &str) -> Option<&'static AssetInfo> {
    let t = title.to_lowercase();
    KNOWN_ASSETS
        .iter()
        .find(|asset| asset.keywords.iter().any(|k| t.contains(k)))
}

/// Market-cap factor for whichever asset a title references.
pub fn market_cap_factor(title: &str) -> f64 {
    asset_in_title(title)
        .map(|a| a.market_cap_factor)
        .unwrap_or(DEFAULT_MARKET_CAP_FACTOR)
}

// ---------------------------------------------------------------------------
// Reference prices
// ---------------------------------------------------------------------------

/// Current reference price per asset symbol.
///
/// Seeded from the static table; refreshed from the price source when
/// one is configured. Lookup failure is a normal outcome — extraction
/// degrades to neutral, it never errors.
#[derive(Debug, Clone)]
pub struct ReferencePrices {
    prices: HashMap<String, f64>,
}

impl ReferencePrices {
    pub fn from_defaults() -> Self {
        let prices = KNOWN_ASSETS
            .iter()
            .map(|a| (a.symbol.to_string(), a.default_price))
            .collect();
        Self { prices }
    }

    pub fn set(&mut self, symbol: &str, price: f64) {
        if price.is_finite() && price > 0.0 {
            self.prices.insert(symbol.to_string(), price);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<f64> {
        self.prices.get(symbol).copied()
    }

    /// Reference price for whichever asset a title mentions.
    pub fn price_for_title(&self, title: &str) -> Option<f64> {
        asset_in_title(title).and_then(|a| self.get(a.symbol))
    }
}

// ---------------------------------------------------------------------------
// Title parsers
// ---------------------------------------------------------------------------

const PRICE_PATTERN: &str = r"\$\s*([0-9][0-9,]*(?:\.[0-9]+)?)\s*([kKmM])?";

fn price_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(PRICE_PATTERN).expect("price pattern compiles"))
}

fn range_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(r"{PRICE_PATTERN}\s+and\s+{PRICE_PATTERN}"))
            .expect("range pattern compiles")
    })
}

fn scale_suffix(suffix: Option<&str>) -> f64 {
    match suffix.map(|s| s.to_lowercase()) {
        Some(s) if s == "k" => 1_000.0,
        Some(s) if s == "m" => 1_000_000.0,
        _ => 1.0,
    }
}

fn parse_number(digits: &str, suffix: Option<&str>) -> Option<f64> {
    let cleaned = digits.replace(',', "");
    cleaned.parse::<f64>().ok().map(|n| n * scale_suffix(suffix))
}

/// Parse the first `$<number>[k|m]` price from a title.
pub fn parse_price_target(title: &str) -> Option<f64> {
    let caps = price_re().captures(title)?;
    parse_number(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))
}

/// Parse a `$<min> and $<max>` pair from a title. Bounds are returned
/// low-to-high regardless of the order they appear in.
pub fn parse_range(title: &str) -> Option<(f64, f64)> {
    let caps = range_re().captures(title)?;
    let a = parse_number(caps.get(1)?.as_str(), caps.get(2).map(|m| m.as_str()))?;
    let b = parse_number(caps.get(3)?.as_str(), caps.get(4).map(|m| m.as_str()))?;
    Some((a.min(b), a.max(b)))
}

// ---------------------------------------------------------------------------
// Outcome polarity
// ---------------------------------------------------------------------------

const BULLISH_KEYWORDS: &[&str] = &[
    "up", "higher", "rise", "increase", "bull", "positive", "yes", "above", "reach",
];
const BEARISH_KEYWORDS: &[&str] = &[
    "down", "lower", "fall", "decrease", "bear", "negative", "no", "below", "crash",
];

/// Count keyword hits among a title's tokens. Keywords of four letters
/// or more match as token prefixes so inflected forms count; shorter
/// keywords match exact tokens only.
fn keyword_hits(title: &str, keywords: &[&str]) -> usize {
    let lowered = title.to_lowercase();
    lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .filter(|token| {
            keywords.iter().any(|k| {
                if k.len() >= 4 {
                    token.starts_with(k)
                } else {
                    token == k
                }
            })
        })
        .count()
}

/// Whether the outcome described by the title is the bullish case.
/// Ties count as bearish: the bullish probability is then the
/// complement of the market-implied price.
pub fn outcome_is_bullish(title: &str) -> bool {
    keyword_hits(title, BULLISH_KEYWORDS) > keyword_hits(title, BEARISH_KEYWORDS)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

/// Clamp to [0, 100]; any non-finite value collapses to neutral.
fn clamp_pct(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        50.0
    }
}

const NEUTRAL: f64 = 50.0;

/// Market-type-keyed bullish-probability extraction.
pub struct ProbabilityExtractor {
    refs: ReferencePrices,
}

impl ProbabilityExtractor {
    pub fn new() -> Self {
        Self {
            refs: ReferencePrices::from_defaults(),
        }
    }

    pub fn reference_prices(&self) -> &ReferencePrices {
        &self.refs
    }

    pub fn set_reference_price(&mut self, symbol: &str, price: f64) {
        self.refs.set(symbol, price);
    }

    /// Extract a bullish probability in [0, 100] for a market summary.
    pub fn extract(&self, market: &MarketSummary) -> f64 {
        match market.market_type {
            MarketType::Binary => self.binary(market),
            MarketType::PriceTarget => self.price_target(market),
            MarketType::Range => self.range(market),
            MarketType::Directional => self.directional(market),
            MarketType::Sentiment => Self::sentiment(market),
        }
    }

    /// `avg_price` is the market-implied probability of the literal
    /// resolution condition; when that condition is itself the bearish
    /// case, the bullish probability is its complement.
    fn binary(&self, market: &MarketSummary) -> f64 {
        let p = market.avg_price();
        if outcome_is_bullish(&market.title) {
            clamp_pct(p * 100.0)
        } else {
            clamp_pct((1.0 - p) * 100.0)
        }
    }

    fn price_target(&self, market: &MarketSummary) -> f64 {
        let Some(target) = parse_price_target(&market.title) else {
            return NEUTRAL;
        };
        let Some(current) = self.refs.price_for_title(&market.title) else {
            return NEUTRAL;
        };
        let p = market.avg_price();
        if target > current {
            // Market resolves YES on an upward move
            clamp_pct(p * 100.0)
        } else {
            clamp_pct((1.0 - p) * 100.0)
        }
    }

    /// The price reflects the probability of staying in range. The same
    /// value is used when the current price sits outside the stated
    /// bounds — a known simplification carried over from the original
    /// behavior, pending a product decision on inverted logic.
    fn range(&self, market: &MarketSummary) -> f64 {
        let Some((_low, _high)) = parse_range(&market.title) else {
            return NEUTRAL;
        };
        if self.refs.price_for_title(&market.title).is_none() {
            return NEUTRAL;
        }
        clamp_pct(market.avg_price() * 100.0)
    }

    fn directional(&self, market: &MarketSummary) -> f64 {
        let t = market.title.to_lowercase();
        let bullish = t.contains("up") || t.contains("higher") || t.contains("rise");
        let p = market.avg_price();
        if bullish {
            clamp_pct(p * 100.0)
        } else {
            clamp_pct((1.0 - p) * 100.0)
        }
    }

    /// Trade-flow sentiment: 60% trade-count ratio, 40% volume ratio.
    /// The ratios themselves are 0.5-neutral on empty denominators.
    fn sentiment(market: &MarketSummary) -> f64 {
        let sentiment = 0.6 * market.buy_trade_ratio() + 0.4 * market.buy_volume_ratio();
        clamp_pct(sentiment * 100.0)
    }
}

impl Default for ProbabilityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
