//! Market Pipeline Integration Tests
//!
//! Drives the feed through real HTTP adapters against mock upstreams:
//! fallback order, throttling and the history cache.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coin_pulse::application::services::SourceHandle;
use coin_pulse::infrastructure::sources::{
    BINANCE, BinanceSource, COINGECKO, CRYPTOCOMPARE, CoinGeckoSource, CryptoCompareSource,
};
use coin_pulse::{FeedSettings, MarketDataFeed, RateLimitRegistry, TimeRange};

fn twelve_hours() -> serde_json::Value {
    let rows: Vec<_> = (0..12)
        .map(|i| json!({ "time": i, "close": 100.0 + f64::from(i), "open": 100.0 }))
        .collect();
    json!({ "Response": "Success", "Message": "", "Data": { "Data": rows } })
}

/// Mock upstreams in the default priority order.
struct Upstreams {
    binance: MockServer,
    coingecko: MockServer,
    cryptocompare: MockServer,
}

impl Upstreams {
    async fn start() -> Self {
        Self {
            binance: MockServer::start().await,
            coingecko: MockServer::start().await,
            cryptocompare: MockServer::start().await,
        }
    }
}

async fn feed_over(upstreams: &Upstreams) -> (MarketDataFeed, Arc<RateLimitRegistry>) {
    let sources: Vec<SourceHandle> = vec![
        Arc::new(BinanceSource::new(&upstreams.binance.uri()).unwrap()),
        Arc::new(CoinGeckoSource::new(&upstreams.coingecko.uri()).unwrap()),
        Arc::new(CryptoCompareSource::new(&upstreams.cryptocompare.uri()).unwrap()),
    ];
    let registry = Arc::new(RateLimitRegistry::new());
    let feed = MarketDataFeed::new(sources, Arc::clone(&registry), FeedSettings::default())
        .with_symbols(vec!["BTCUSDT".to_string()]);
    (feed, registry)
}

#[tokio::test]
async fn failing_sources_fall_through_and_are_throttled() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/klines"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&upstreams.binance)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/bitcoin/market_chart"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&upstreams.coingecko)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/v2/histohour"))
        .respond_with(ResponseTemplate::new(200).set_body_json(twelve_hours()))
        .expect(1)
        .mount(&upstreams.cryptocompare)
        .await;

    let (feed, registry) = feed_over(&upstreams).await;

    let result = feed.get_historical_series("BTCUSDT", TimeRange::OneDay, false).await;
    assert!(result.success);
    assert_eq!(result.source, CRYPTOCOMPARE);
    assert_eq!(result.series.len(), 12);

    assert!(registry.is_limited(BINANCE));
    assert!(registry.is_limited(COINGECKO));
    assert!(!registry.is_limited(CRYPTOCOMPARE));
    let remaining = registry.remaining(BINANCE).unwrap();
    assert!(remaining > Duration::from_secs(25) && remaining <= Duration::from_secs(30));
    let remaining = registry.remaining(COINGECKO).unwrap();
    assert!(remaining > Duration::from_secs(55) && remaining <= Duration::from_secs(60));

    // Cached: neither upstream sees a second request.
    let again = feed.get_historical_series("BTCUSDT", TimeRange::OneDay, false).await;
    assert_eq!(again, result);
}

#[tokio::test]
async fn all_sources_throttled_is_unavailable_without_requests() {
    let upstreams = Upstreams::start().await;
    for server in [&upstreams.binance, &upstreams.coingecko, &upstreams.cryptocompare] {
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(server)
            .await;
    }

    let (feed, registry) = feed_over(&upstreams).await;
    for source in [BINANCE, COINGECKO, CRYPTOCOMPARE] {
        registry.mark_limited(source, Duration::from_secs(30));
    }

    let started = std::time::Instant::now();
    let result = feed.get_historical_series("BTCUSDT", TimeRange::OneWeek, true).await;
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!result.success);
    assert!(result.series.is_empty());
    assert!(result.source.is_empty());
}

#[tokio::test]
async fn snapshot_refresh_uses_first_healthy_source() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ticker/24hr"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&upstreams.binance)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/coins/markets"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&upstreams.coingecko)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/pricemultifull"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "RAW": { "BTC": { "USD": {
                "PRICE": 43000.0,
                "CHANGEPCT24HOUR": 1.5,
                "HIGH24HOUR": 44000.0,
                "LOW24HOUR": 42000.0,
                "VOLUME24HOURTO": 1.0e9
            }}}
        })))
        .mount(&upstreams.cryptocompare)
        .await;

    let (feed, registry) = feed_over(&upstreams).await;

    assert_eq!(feed.refresh_snapshots().await.as_deref(), Some(CRYPTOCOMPARE));
    let btc = feed.get_snapshot("BTCUSDT").unwrap();
    assert!((btc.last_price - 43_000.0).abs() < f64::EPSILON);
    assert!(registry.is_limited(BINANCE));
    assert!(registry.is_limited(COINGECKO));
}

#[tokio::test]
async fn unmapped_asset_keeps_coingecko_available() {
    let upstreams = Upstreams::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&upstreams.coingecko)
        .await;
    Mock::given(method("GET"))
        .and(path("/data/v2/histohour"))
        .respond_with(ResponseTemplate::new(200).set_body_json(twelve_hours()))
        .expect(1)
        .mount(&upstreams.cryptocompare)
        .await;

    let (feed, registry) = feed_over(&upstreams).await;
    registry.mark_limited(BINANCE, Duration::from_secs(30));

    let result = feed.get_historical_series("FOOUSDT", TimeRange::OneDay, false).await;
    assert!(result.success);
    assert_eq!(result.source, CRYPTOCOMPARE);
    assert!(!registry.is_limited(COINGECKO));
}
