//! Trade aggregation.
//!
//! Groups a flat batch of trade records by market identifier into
//! per-market summaries in a single pass. No filtering happens here —
//! crypto-relevance filtering is the trade source's job, upstream.

use std::collections::HashMap;

use crate::types::{MarketSummary, TradeRecord, TradeSide};

/// Group a trade batch by `condition_id`, accumulating volume, value,
/// per-side splits, and the most recent trade by timestamp.
pub fn aggregate(trades: Vec<TradeRecord>) -> HashMap<String, MarketSummary> {
    let mut markets: HashMap<String, MarketSummary> = HashMap::new();

    for trade in trades {
        let summary = markets
            .entry(trade.condition_id.clone())
            .or_insert_with(|| MarketSummary::new(&trade.condition_id, &trade.title));

        summary.total_volume += trade.size;
        summary.total_value += trade.value();
        match trade.side {
            TradeSide::Buy => {
                summary.buy_volume += trade.size;
                summary.buy_trades += 1;
            }
            TradeSide::Sell => {
                summary.sell_volume += trade.size;
                summary.sell_trades += 1;
            }
        }

        let is_newer = summary
            .last_trade
            .as_ref()
            .map_or(true, |last| trade.timestamp > last.timestamp);
        if is_newer {
            summary.last_trade = Some(trade.clone());
        }

        summary.trades.push(trade);
    }

    markets
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
