//! Market classification from free-text titles.
//!
//! Two independent pure functions over the (case-folded) title text:
//! category assignment via ordered keyword containment, and market-type
//! tagging via ordered structural rules. Both are deterministic and
//! total — every title maps to exactly one type, with `Sentiment` as
//! the universal fallback, and to at most one category.

use crate::config::CategoryConfig;
use crate::types::MarketType;

// ---------------------------------------------------------------------------
// Market type
// ---------------------------------------------------------------------------

const PRICE_TARGET_VERBS: &[&str] =
    &["reach", "hit", "above", "below", "exceed", "dip to", "drop to"];

const BINARY_VERBS: &[&str] = &["happen", "pass", "win", "say"];

/// Tag a market title with its structural type. First rule wins:
/// range → price-target → directional → binary → sentiment.
pub fn market_type_of(title: &str) -> MarketType {
    let t = title.to_lowercase();
    let has_price_context = t.contains('$') || t.contains("price");

    if t.contains("between") && t.contains(" and ") && has_price_context {
        return MarketType::Range;
    }
    if has_price_context && PRICE_TARGET_VERBS.iter().any(|v| t.contains(v)) {
        return MarketType::PriceTarget;
    }
    if t.contains("up or down") || t.contains("bullish") || t.contains("bearish") {
        return MarketType::Directional;
    }
    if t.contains("will") && (t.contains('?') || BINARY_VERBS.iter().any(|v| t.contains(v))) {
        return MarketType::Binary;
    }
    MarketType::Sentiment
}

// ---------------------------------------------------------------------------
// Category
// ---------------------------------------------------------------------------

/// Ordered category keyword matcher built from configuration.
///
/// Keywords are lowercased once at construction; matching is plain
/// substring containment against the title plus slugs.
pub struct Classifier {
    rules: Vec<CategoryRule>,
}

struct CategoryRule {
    name: String,
    keywords: Vec<String>,
}

impl Classifier {
    pub fn from_categories(categories: &[CategoryConfig]) -> Self {
        let rules = categories
            .iter()
            .map(|c| CategoryRule {
                name: c.name.clone(),
                keywords: c.keywords.iter().map(|k| k.to_lowercase()).collect(),
            })
            .collect();
        Self { rules }
    }

    /// First configured category whose keyword list hits the title (or
    /// either slug). `None` means uncategorized — the market is excluded
    /// from category and index aggregation, not defaulted.
    pub fn category_of(&self, title: &str, slug: &str, event_slug: &str) -> Option<&str> {
        let haystack = format!(
            "{} {} {}",
            title.to_lowercase(),
            slug.to_lowercase(),
            event_slug.to_lowercase()
        );
        self.rules
            .iter()
            .find(|rule| rule.keywords.iter().any(|k| haystack.contains(k.as_str())))
            .map(|rule| rule.name.as_str())
    }

    /// Full classification: category (if any) plus market type.
    pub fn classify(&self, title: &str, slug: &str, event_slug: &str) -> (Option<&str>, MarketType) {
        (
            self.category_of(title, slug, event_slug),
            market_type_of(title),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    fn classifier() -> Classifier {
        Classifier::from_categories(&AppConfig::default().categories)
    }

    // -- Market type tests --

    #[test]
    fn test_type_range() {
        assert_eq!(
            market_type_of("Will BTC trade between $90,000 and $110,000 in March?"),
            MarketType::Range
        );
        assert_eq!(
            market_type_of("ETH price between 3000 and 4000 by June?"),
            MarketType::Range
        );
    }

    #[test]
    fn test_type_price_target() {
        assert_eq!(
            market_type_of("Will Bitcoin reach $100k?"),
            MarketType::PriceTarget
        );
        assert_eq!(
            market_type_of("Will Ethereum dip to $2,000 this year?"),
            MarketType::PriceTarget
        );
        assert_eq!(
            market_type_of("Solana above $250 by Friday?"),
            MarketType::PriceTarget
        );
    }

    #[test]
    fn test_type_range_beats_price_target() {
        // "between ... and ..." has both range and target markers; range wins
        assert_eq!(
            market_type_of("Will BTC stay between $90,000 and $110,000?"),
            MarketType::Range
        );
    }

    #[test]
    fn test_type_directional() {
        assert_eq!(
            market_type_of("Bitcoin up or down this week"),
            MarketType::Directional
        );
        assert_eq!(
            market_type_of("Will traders stay bullish on Ethereum?"),
            MarketType::Directional
        );
    }

    #[test]
    fn test_type_binary() {
        assert_eq!(
            market_type_of("Will the Ethereum upgrade happen in Q2?"),
            MarketType::Binary
        );
        assert_eq!(
            market_type_of("Will Congress pass the stablecoin bill"),
            MarketType::Binary
        );
    }

    #[test]
    fn test_type_sentiment_fallback() {
        assert_eq!(market_type_of("Crypto winter vibes"), MarketType::Sentiment);
        assert_eq!(market_type_of(""), MarketType::Sentiment);
    }

    #[test]
    fn test_type_case_insensitive() {
        assert_eq!(
            market_type_of("WILL BITCOIN REACH $100K?"),
            MarketType::PriceTarget
        );
    }

    #[test]
    fn test_type_is_pure() {
        let title = "Will Bitcoin reach $100k?";
        assert_eq!(market_type_of(title), market_type_of(title));
    }

    // -- Category tests --

    #[test]
    fn test_category_bitcoin() {
        let c = classifier();
        assert_eq!(
            c.category_of("Will Bitcoin reach $100k?", "", ""),
            Some("bitcoin-price")
        );
        assert_eq!(
            c.category_of("BTC above $95,000 today?", "", ""),
            Some("bitcoin-price")
        );
    }

    #[test]
    fn test_category_ethereum() {
        let c = classifier();
        assert_eq!(
            c.category_of("Will Ethereum flip Bitcoin?", "", ""),
            // Ordered match: bitcoin-price is configured first
            Some("bitcoin-price")
        );
        assert_eq!(
            c.category_of("Ethereum above $4,000 by July?", "", ""),
            Some("ethereum-price")
        );
    }

    #[test]
    fn test_category_from_slug() {
        let c = classifier();
        assert_eq!(
            c.category_of("Will it reach $100k?", "btc-100k-2026", ""),
            Some("bitcoin-price")
        );
        assert_eq!(
            c.category_of("Will it reach $5k?", "", "ethereum-price-targets"),
            Some("ethereum-price")
        );
    }

    #[test]
    fn test_category_regulation_and_adoption() {
        let c = classifier();
        assert_eq!(
            c.category_of("Will the SEC approve a new regulation on exchanges?", "", ""),
            Some("crypto-regulation")
        );
        assert_eq!(
            c.category_of("Will institutional adoption accelerate in 2026?", "", ""),
            Some("crypto-adoption")
        );
    }

    #[test]
    fn test_category_uncategorized() {
        let c = classifier();
        assert_eq!(c.category_of("Will it rain in Sydney tomorrow?", "", ""), None);
        assert_eq!(c.category_of("", "", ""), None);
    }

    #[test]
    fn test_category_first_match_wins() {
        let c = classifier();
        // Mentions both bitcoin and solana; bitcoin-price is listed first
        assert_eq!(
            c.category_of("Will Solana outperform Bitcoin?", "", ""),
            Some("bitcoin-price")
        );
    }

    #[test]
    fn test_classify_is_idempotent() {
        let c = classifier();
        let title = "Will Bitcoin reach $100k?";
        let first = c.classify(title, "", "");
        let second = c.classify(title, "", "");
        assert_eq!(first.0, second.0);
        assert_eq!(first.1, second.1);
    }
}
