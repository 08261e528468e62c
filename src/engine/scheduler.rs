//! Periodic recomputation.
//!
//! Wraps the engine in an explicit ticking task with start/stop and an
//! `is_running` re-entrancy guard, instead of a raw timer callback.
//! `run_once` is the complete tick — tests call it directly and never
//! wait on wall clock.

use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, RwLock};
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::engine::probability::KNOWN_ASSETS;
use crate::engine::{CycleSummary, IndexEngine};
use crate::sources::{PriceSource, TradeSource};
use crate::types::CpmiError;

/// Drives the engine on a fixed interval.
///
/// A tick is atomic over the index state: the trade fetch happens
/// before any mutation, so a failed fetch leaves the last good index
/// standing. Reference-price refresh failures are non-fatal — the
/// engine keeps its previous table.
pub struct IndexScheduler {
    engine: Arc<RwLock<IndexEngine>>,
    trades: Arc<dyn TradeSource>,
    prices: Option<Arc<dyn PriceSource>>,
    trade_limit: u32,
    interval: Duration,
    is_running: AtomicBool,
    stopped: AtomicBool,
    shutdown: Notify,
}

impl IndexScheduler {
    pub fn new(
        engine: Arc<RwLock<IndexEngine>>,
        trades: Arc<dyn TradeSource>,
        prices: Option<Arc<dyn PriceSource>>,
        config: &AppConfig,
    ) -> Self {
        Self {
            engine,
            trades,
            prices,
            trade_limit: config.sources.trade_limit,
            interval: Duration::from_secs(config.index.update_interval_secs),
            is_running: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            shutdown: Notify::new(),
        }
    }

    /// Run one complete tick. Returns `Ok(None)` when a previous tick
    /// is still in flight — the invocation is skipped, never queued.
    pub async fn run_once(&self) -> Result<Option<CycleSummary>, CpmiError> {
        if self.is_running.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        let result = self.tick().await;
        self.is_running.store(false, Ordering::SeqCst);
        result.map(Some)
    }

    async fn tick(&self) -> Result<CycleSummary, CpmiError> {
        // The tick's single atomic failure point: abort before any
        // engine mutation.
        let trades = self.trades.recent_trades(self.trade_limit).await?;

        if let Some(prices) = &self.prices {
            for asset in KNOWN_ASSETS {
                match prices.ticker(asset.symbol).await {
                    Ok(ticker) => {
                        self.engine
                            .write()
                            .await
                            .apply_ticker(asset.symbol, &ticker);
                    }
                    Err(e) => warn!(
                        symbol = asset.symbol,
                        error = %e,
                        "Reference price refresh failed; keeping last value"
                    ),
                }
            }
        }

        let summary = self.engine.write().await.compute_cycle(trades, Utc::now());
        Ok(summary)
    }

    /// Signal the ticking task to exit.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.shutdown.notify_one();
    }

    /// Start the ticking task. Runs until `stop` is called.
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.interval);
            info!(interval_secs = self.interval.as_secs(), "Scheduler started");
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        if self.stopped.load(Ordering::SeqCst) {
                            break;
                        }
                        match self.run_once().await {
                            Ok(Some(summary)) => info!(
                                trades = summary.trades_in,
                                markets = summary.markets,
                                categorized = summary.categorized,
                                index = summary.index,
                                "Cycle complete"
                            ),
                            Ok(None) => warn!("Previous tick still running; skipping"),
                            Err(e) => error!(
                                error = %e,
                                "Cycle aborted; index unchanged until next tick"
                            ),
                        }
                    }
                    _ = self.shutdown.notified() => break,
                }
            }
            info!("Scheduler stopped");
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::Ticker;
    use crate::types::{TradeRecord, TradeSide};
    use async_trait::async_trait;

    struct MockTradeSource {
        trades: Vec<TradeRecord>,
        fail: bool,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl TradeSource for MockTradeSource {
        async fn recent_trades(&self, _limit: u32) -> Result<Vec<TradeRecord>, CpmiError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(CpmiError::fetch("mock", "forced failure"));
            }
            Ok(self.trades.clone())
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    struct FailingPriceSource;

    #[async_trait]
    impl PriceSource for FailingPriceSource {
        async fn ticker(&self, _symbol: &str) -> Result<Ticker, CpmiError> {
            Err(CpmiError::fetch("mock-prices", "down"))
        }

        fn name(&self) -> &str {
            "mock-prices"
        }
    }

    fn btc_trade() -> TradeRecord {
        TradeRecord {
            condition_id: "btc-100k".to_string(),
            title: "Will Bitcoin reach $100k?".to_string(),
            slug: String::new(),
            event_slug: String::new(),
            side: TradeSide::Buy,
            size: 10.0,
            price: 0.6,
            timestamp: Utc::now().timestamp(),
        }
    }

    fn scheduler_with(source: MockTradeSource) -> (IndexScheduler, Arc<RwLock<IndexEngine>>) {
        let config = AppConfig::default();
        let engine = Arc::new(RwLock::new(IndexEngine::new(config.clone()).unwrap()));
        let scheduler = IndexScheduler::new(engine.clone(), Arc::new(source), None, &config);
        (scheduler, engine)
    }

    #[tokio::test]
    async fn test_run_once_updates_index() {
        let (scheduler, engine) = scheduler_with(MockTradeSource {
            trades: vec![btc_trade()],
            fail: false,
            delay: None,
        });

        let summary = scheduler.run_once().await.unwrap().unwrap();
        assert_eq!(summary.markets, 1);
        assert!(summary.index.is_some());
        assert!(engine.read().await.current_index().last_update.is_some());
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_state_unchanged() {
        let (scheduler, engine) = scheduler_with(MockTradeSource {
            trades: Vec::new(),
            fail: true,
            delay: None,
        });

        let err = scheduler.run_once().await.unwrap_err();
        assert!(matches!(err, CpmiError::Fetch { .. }));

        let report = engine.read().await.current_index();
        assert_eq!(report.value, 100.0);
        assert!(report.last_update.is_none());

        // The guard must have been released for the next tick
        assert!(scheduler.run_once().await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_tick_is_skipped() {
        let (scheduler, _engine) = scheduler_with(MockTradeSource {
            trades: vec![btc_trade()],
            fail: false,
            delay: Some(Duration::from_millis(50)),
        });

        let (first, second) = tokio::join!(scheduler.run_once(), scheduler.run_once());
        let results = [first.unwrap(), second.unwrap()];
        assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_none()).count(), 1);
    }

    #[tokio::test]
    async fn test_price_source_failure_is_non_fatal() {
        let config = AppConfig::default();
        let engine = Arc::new(RwLock::new(IndexEngine::new(config.clone()).unwrap()));
        let scheduler = IndexScheduler::new(
            engine.clone(),
            Arc::new(MockTradeSource {
                trades: vec![btc_trade()],
                fail: false,
                delay: None,
            }),
            Some(Arc::new(FailingPriceSource)),
            &config,
        );

        let summary = scheduler.run_once().await.unwrap().unwrap();
        assert!(summary.index.is_some());
    }

    #[tokio::test]
    async fn test_spawn_and_stop() {
        let (scheduler, _engine) = scheduler_with(MockTradeSource {
            trades: vec![btc_trade()],
            fail: false,
            delay: None,
        });
        let scheduler = Arc::new(scheduler);
        let handle = scheduler.clone().spawn();
        scheduler.stop();
        handle.await.unwrap();
    }
}
