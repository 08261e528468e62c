//! Mock sources for integration testing.
//!
//! Deterministic `TradeSource` and `PriceSource` implementations backed
//! by in-memory state — batches and failures are fully controllable
//! from test code.

use async_trait::async_trait;
use std::sync::Mutex;

use cpmi::sources::{PriceSource, Ticker, TradeSource};
use cpmi::types::{CpmiError, TradeRecord, TradeSide};

/// A mock trade feed. Each call to `recent_trades` serves the current
/// batch; `set_batch` and `set_error` steer the next call.
pub struct MockTradeSource {
    batch: Mutex<Vec<TradeRecord>>,
    force_error: Mutex<Option<String>>,
}

impl MockTradeSource {
    pub fn new(batch: Vec<TradeRecord>) -> Self {
        Self {
            batch: Mutex::new(batch),
            force_error: Mutex::new(None),
        }
    }

    pub fn set_batch(&self, batch: Vec<TradeRecord>) {
        *self.batch.lock().unwrap() = batch;
    }

    /// Force all subsequent fetches to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }
}

#[async_trait]
impl TradeSource for MockTradeSource {
    async fn recent_trades(&self, limit: u32) -> Result<Vec<TradeRecord>, CpmiError> {
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(CpmiError::fetch("mock", msg));
        }
        let batch = self.batch.lock().unwrap();
        Ok(batch.iter().take(limit as usize).cloned().collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock price feed serving fixed tickers.
pub struct MockPriceSource {
    pub bitcoin: f64,
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn ticker(&self, symbol: &str) -> Result<Ticker, CpmiError> {
        if symbol == "bitcoin" {
            Ok(Ticker {
                price: self.bitcoin,
                closes: vec![self.bitcoin * 0.98, self.bitcoin * 1.01, self.bitcoin],
            })
        } else {
            Err(CpmiError::fetch("mock-prices", format!("no ticker for {symbol}")))
        }
    }

    fn name(&self) -> &str {
        "mock-prices"
    }
}

/// Shorthand trade constructor used across the integration tests.
pub fn make_trade(
    condition_id: &str,
    title: &str,
    side: TradeSide,
    size: f64,
    price: f64,
    timestamp: i64,
) -> TradeRecord {
    TradeRecord {
        condition_id: condition_id.to_string(),
        title: title.to_string(),
        slug: String::new(),
        event_slug: String::new(),
        side,
        size,
        price,
        timestamp,
    }
}

#[test]
fn test_mock_source_error_injection() {
    tokio_test::block_on(async {
        let source = MockTradeSource::new(vec![make_trade(
            "m1",
            "Will Bitcoin reach $100k?",
            TradeSide::Buy,
            1.0,
            0.5,
            1_700_000_000,
        )]);

        assert_eq!(source.recent_trades(10).await.unwrap().len(), 1);

        source.set_error("venue down");
        assert!(matches!(
            source.recent_trades(10).await,
            Err(CpmiError::Fetch { .. })
        ));

        source.clear_error();
        assert_eq!(source.recent_trades(10).await.unwrap().len(), 1);
    });
}

#[test]
fn test_mock_source_respects_limit() {
    tokio_test::block_on(async {
        let batch: Vec<TradeRecord> = (0..10)
            .map(|i| {
                make_trade(
                    &format!("m{i}"),
                    "Will Bitcoin reach $100k?",
                    TradeSide::Buy,
                    1.0,
                    0.5,
                    1_700_000_000 + i,
                )
            })
            .collect();
        let source = MockTradeSource::new(batch);
        assert_eq!(source.recent_trades(3).await.unwrap().len(), 3);
    });
}
