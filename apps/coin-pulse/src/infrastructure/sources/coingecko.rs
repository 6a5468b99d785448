//! CoinGecko Source
//!
//! CoinGecko keys coins by id, not ticker, so only assets in the id table
//! below are served. Prices are USD; the pair's quote asset is assumed to
//! track it.
//!
//! - Snapshots: `GET /api/v3/coins/markets?vs_currency=usd&ids=`
//! - History: `GET /api/v3/coins/{id}/market_chart?vs_currency=usd&days=`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::SourceHttpClient;
use crate::application::ports::{MarketDataSource, SourceError};
use crate::domain::market::{ChartSeries, CoinSnapshot, SupportedRange, split_pair};

/// Rate-limit key and source name.
pub const COINGECKO: &str = "coingecko";

const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("BNB", "binancecoin"),
    ("SOL", "solana"),
    ("XRP", "ripple"),
    ("ADA", "cardano"),
    ("DOGE", "dogecoin"),
    ("DOT", "polkadot"),
    ("AVAX", "avalanche-2"),
    ("LINK", "chainlink"),
    ("LTC", "litecoin"),
    ("TRX", "tron"),
    ("SHIB", "shiba-inu"),
    ("ATOM", "cosmos"),
    ("UNI", "uniswap"),
    ("XLM", "stellar"),
    ("NEAR", "near"),
    ("TON", "the-open-network"),
    ("PEPE", "pepe"),
    ("MATIC", "matic-network"),
];

/// CoinGecko id for a base asset.
#[must_use]
pub fn coin_id(base_asset: &str) -> Option<&'static str> {
    let base_asset = base_asset.to_uppercase();
    COIN_IDS
        .iter()
        .find(|(asset, _)| *asset == base_asset)
        .map(|(_, id)| *id)
}

#[derive(Debug, Deserialize)]
struct MarketRow {
    id: String,
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    high_24h: Option<f64>,
    low_24h: Option<f64>,
    total_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

/// CoinGecko market data adapter.
#[derive(Debug, Clone)]
pub struct CoinGeckoSource {
    http: SourceHttpClient,
}

impl CoinGeckoSource {
    /// Create an adapter for `base_url`, e.g. `https://api.coingecko.com`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Transport` if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        Ok(Self {
            http: SourceHttpClient::new(base_url)?,
        })
    }
}

#[async_trait]
impl MarketDataSource for CoinGeckoSource {
    fn name(&self) -> &str {
        COINGECKO
    }

    async fn fetch_snapshots(&self, symbols: &[String]) -> Result<Vec<CoinSnapshot>, SourceError> {
        // id -> pair symbol
        let wanted: HashMap<&'static str, &String> = symbols
            .iter()
            .filter_map(|symbol| coin_id(&split_pair(symbol).0).map(|id| (id, symbol)))
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids: Vec<&str> = wanted.keys().copied().collect();
        ids.sort_unstable();
        let rows: Vec<MarketRow> = self
            .http
            .get_json(
                "/api/v3/coins/markets",
                &[("vs_currency", "usd".to_string()), ("ids", ids.join(","))],
            )
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let symbol = wanted.get(row.id.as_str())?;
                Some(CoinSnapshot::new(
                    symbol.as_str(),
                    row.current_price?,
                    row.price_change_percentage_24h.unwrap_or(0.0),
                    row.high_24h.unwrap_or(0.0),
                    row.low_24h.unwrap_or(0.0),
                    row.total_volume.unwrap_or(0.0),
                ))
            })
            .collect())
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        range: SupportedRange,
    ) -> Result<ChartSeries, SourceError> {
        let id = coin_id(&split_pair(symbol).0).ok_or_else(|| SourceError::UnsupportedSymbol {
            symbol: symbol.to_string(),
        })?;
        let chart: MarketChart = self
            .http
            .get_json(
                &format!("/api/v3/coins/{id}/market_chart"),
                &[
                    ("vs_currency", "usd".to_string()),
                    ("days", range.days().to_string()),
                ],
            )
            .await?;
        Ok(chart.prices.into_iter().map(|(_, price)| price).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test_case("BTC", Some("bitcoin"))]
    #[test_case("avax", Some("avalanche-2"))]
    #[test_case("WIF", None)]
    fn id_lookup(asset: &str, expected: Option<&str>) {
        assert_eq!(coin_id(asset), expected);
    }

    #[tokio::test]
    async fn markets_map_back_to_pairs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/coins/markets"))
            .and(query_param("ids", "bitcoin,solana"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "id": "bitcoin",
                    "current_price": 65000.0,
                    "price_change_percentage_24h": 1.5,
                    "high_24h": 66000.0,
                    "low_24h": 64000.0,
                    "total_volume": 1.0e9
                },
                {
                    "id": "solana",
                    "current_price": null,
                    "price_change_percentage_24h": null,
                    "high_24h": null,
                    "low_24h": null,
                    "total_volume": null
                }
            ])))
            .mount(&server)
            .await;

        let source = CoinGeckoSource::new(&server.uri()).unwrap();
        let snapshots = source
            .fetch_snapshots(&[
                "BTCUSDT".to_string(),
                "SOLUSDT".to_string(),
                "WIFUSDT".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].symbol, "BTCUSDT");
        assert!((snapshots[0].last_price - 65_000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn market_chart_yields_prices() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/coins/ethereum/market_chart"))
            .and(query_param("days", "7"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "prices": [[1.0, 3000.0], [2.0, 3050.5], [3.0, 2990.25]],
                "market_caps": [],
                "total_volumes": []
            })))
            .mount(&server)
            .await;

        let source = CoinGeckoSource::new(&server.uri()).unwrap();
        let series = source
            .fetch_history("ETHUSDT", SupportedRange::OneWeek)
            .await
            .unwrap();
        assert_eq!(series.values(), &[3000.0, 3050.5, 2990.25]);
    }

    #[tokio::test]
    async fn unknown_asset_is_unsupported_without_request() {
        let server = MockServer::start().await;
        let source = CoinGeckoSource::new(&server.uri()).unwrap();
        let err = source
            .fetch_history("WIFUSDT", SupportedRange::OneDay)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedSymbol { .. }));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
