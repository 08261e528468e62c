//! End-to-end pipeline tests: trades in, smoothed index and API out.

use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower::ServiceExt;

use cpmi::api;
use cpmi::config::AppConfig;
use cpmi::engine::scheduler::IndexScheduler;
use cpmi::engine::IndexEngine;
use cpmi::types::{CpmiError, TradeSide};

use crate::mock_source::{make_trade, MockPriceSource, MockTradeSource};

fn t0() -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
}

#[test]
fn test_mixed_batch_end_to_end() {
    let mut engine = IndexEngine::new(AppConfig::default()).unwrap();
    let ts = t0().timestamp();

    let trades = vec![
        // bitcoin-price: price target above the $95k reference, avg 0.6 → 60
        make_trade("btc-100k", "Will Bitcoin reach $100k?", TradeSide::Buy, 10.0, 0.6, ts),
        make_trade("btc-100k", "Will Bitcoin reach $100k?", TradeSide::Sell, 5.0, 0.6, ts),
        // ethereum-price: binary with a bullish outcome, avg 0.5 → 50
        make_trade(
            "eth-high",
            "Will Ethereum rise to a new high this year?",
            TradeSide::Buy,
            10.0,
            0.5,
            ts,
        ),
        // No crypto category: must be excluded, not defaulted
        make_trade("rain", "Will it rain in Paris tomorrow?", TradeSide::Buy, 100.0, 0.9, ts),
    ];

    let summary = engine.compute_cycle(trades, t0());
    assert_eq!(summary.markets, 3);
    assert_eq!(summary.categorized, 2);

    // Active weights 0.35 + 0.25; the rain market contributes nothing
    let expected = 100.0 + ((60.0 * 0.35 + 50.0 * 0.25) / 0.60 - 50.0);
    assert!((summary.index.unwrap() - expected).abs() < 1e-6);

    let breakdown = engine.category_breakdown();
    assert_eq!(breakdown["bitcoin-price"].index, Some(60.0));
    assert_eq!(breakdown["bitcoin-price"].deviation, Some(10.0));
    assert_eq!(breakdown["bitcoin-price"].interpretation.as_deref(), Some("Bullish"));
    assert_eq!(breakdown["ethereum-price"].index, Some(50.0));
    assert!(breakdown["altcoin-price"].index.is_none());
}

#[test]
fn test_repeated_cycles_smooth_and_stay_stable() {
    let mut engine = IndexEngine::new(AppConfig::default()).unwrap();
    let base = t0();

    for i in 0..3 {
        let now = base + Duration::minutes(5 * i);
        let trades = vec![make_trade(
            "btc-100k",
            "Will Bitcoin reach $100k?",
            TradeSide::Buy,
            10.0,
            0.6,
            now.timestamp(),
        )];
        let summary = engine.compute_cycle(trades, now);
        // Identical input each cycle → identical raw value → flat smoothing
        assert!((summary.index.unwrap() - 110.0).abs() < 1e-9);
    }

    assert_eq!(engine.history().len(), 3);
    let stats = engine.statistics().unwrap();
    assert_eq!(stats.data_points, 3);
    assert!(stats.volatility.abs() < 1e-9);
}

#[tokio::test]
async fn test_scheduler_failure_preserves_last_value() {
    let config = AppConfig::default();
    let engine = Arc::new(RwLock::new(IndexEngine::new(config.clone()).unwrap()));
    let source = Arc::new(MockTradeSource::new(vec![make_trade(
        "btc-100k",
        "Will Bitcoin reach $100k?",
        TradeSide::Buy,
        10.0,
        0.6,
        Utc::now().timestamp(),
    )]));
    let scheduler = IndexScheduler::new(engine.clone(), source.clone(), None, &config);

    // First tick succeeds
    let summary = scheduler.run_once().await.unwrap().unwrap();
    assert!(summary.index.is_some());
    let good_value = engine.read().await.current_index().value;
    let good_update = engine.read().await.current_index().last_update;

    // Venue goes down: the tick aborts, nothing mutates
    source.set_error("venue down");
    let err = scheduler.run_once().await.unwrap_err();
    assert!(matches!(err, CpmiError::Fetch { .. }));

    let report = engine.read().await.current_index();
    assert_eq!(report.value, good_value);
    assert_eq!(report.last_update, good_update); // staleness is visible

    // Recovery on the next scheduled tick, no backoff loop in between
    source.clear_error();
    source.set_batch(vec![make_trade(
        "eth-high",
        "Will Ethereum rise to a new high this year?",
        TradeSide::Buy,
        10.0,
        0.5,
        Utc::now().timestamp(),
    )]);
    let recovered = scheduler.run_once().await.unwrap().unwrap();
    assert!(recovered.index.is_some());
    assert_eq!(engine.read().await.history().len(), 2);
}

#[tokio::test]
async fn test_live_reference_price_steers_extraction() {
    let config = AppConfig::default();
    let engine = Arc::new(RwLock::new(IndexEngine::new(config.clone()).unwrap()));
    let source = Arc::new(MockTradeSource::new(vec![make_trade(
        "btc-100k",
        "Will Bitcoin reach $100k?",
        TradeSide::Buy,
        10.0,
        0.6,
        Utc::now().timestamp(),
    )]));
    // Live price above the target flips the market to a downward bet
    let prices = Arc::new(MockPriceSource { bitcoin: 120_000.0 });
    let scheduler = IndexScheduler::new(engine.clone(), source, Some(prices), &config);

    let summary = scheduler.run_once().await.unwrap().unwrap();
    // Probability 40 → only-active-category overall 40 → index 90
    assert!((summary.index.unwrap() - 90.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_api_serves_computed_index() {
    let config = AppConfig::default();
    let engine = Arc::new(RwLock::new(IndexEngine::new(config.clone()).unwrap()));
    let source = Arc::new(MockTradeSource::new(vec![make_trade(
        "btc-100k",
        "Will Bitcoin reach $100k?",
        TradeSide::Buy,
        10.0,
        0.6,
        Utc::now().timestamp(),
    )]));
    let scheduler = IndexScheduler::new(engine.clone(), source, None, &config);
    scheduler.run_once().await.unwrap().unwrap();

    let app = api::build_router(engine);

    let resp = app
        .clone()
        .oneshot(
            axum::http::Request::builder()
                .uri("/api/cpmi/current")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), axum::http::StatusCode::OK);
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["success"], true);
    assert!((json["data"]["index"]["value"].as_f64().unwrap() - 110.0).abs() < 1e-9);
    assert_eq!(json["data"]["index"]["interpretation"], "Bullish");
    assert!(!json["data"]["index"]["lastUpdate"].is_null());

    let resp = app
        .oneshot(
            axum::http::Request::builder()
                .uri("/api/cpmi/export")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(resp.into_body(), 1_000_000).await.unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    let markets = json["data"]["markets"].as_array().unwrap();
    assert_eq!(markets.len(), 1);
    assert_eq!(markets[0]["conditionId"], "btc-100k");
}

#[test]
fn test_classification_is_stable_across_cycles() {
    let mut engine = IndexEngine::new(AppConfig::default()).unwrap();
    let base = t0();

    let batch = |ts: i64| {
        vec![
            make_trade("btc-100k", "Will Bitcoin reach $100k?", TradeSide::Buy, 10.0, 0.6, ts),
            make_trade(
                "reg-bill",
                "Will Congress pass the stablecoin bill?",
                TradeSide::Buy,
                20.0,
                0.7,
                ts,
            ),
        ]
    };

    let first = engine.compute_cycle(batch(base.timestamp()), base);
    let second = engine.compute_cycle(
        batch((base + Duration::minutes(5)).timestamp()),
        base + Duration::minutes(5),
    );

    // Same titles, same classification, same category probabilities
    assert_eq!(first.categorized, second.categorized);
    let breakdown = engine.category_breakdown();
    assert_eq!(breakdown["bitcoin-price"].index, Some(60.0));
    assert!(breakdown["crypto-regulation"].index.is_some());
}
