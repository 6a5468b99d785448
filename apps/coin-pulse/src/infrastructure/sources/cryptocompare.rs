//! CryptoCompare Source
//!
//! - Snapshots: `GET /data/pricemultifull?fsyms=BTC,ETH&tsyms=USD`
//! - History: `GET /data/v2/histohour|histoday?fsym=&tsym=USD&limit=`
//!
//! Errors, including throttling, arrive as HTTP 200 with
//! `"Response": "Error"` and a message.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::http::SourceHttpClient;
use crate::application::ports::{MarketDataSource, SourceError};
use crate::domain::market::{ChartSeries, CoinSnapshot, SupportedRange, split_pair};

/// Rate-limit key and source name.
pub const CRYPTOCOMPARE: &str = "cryptocompare";

const QUOTE: &str = "USD";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
struct RawQuote {
    price: f64,
    #[serde(rename = "CHANGEPCT24HOUR", default)]
    change_pct_24h: f64,
    #[serde(rename = "HIGH24HOUR", default)]
    high_24h: f64,
    #[serde(rename = "LOW24HOUR", default)]
    low_24h: f64,
    #[serde(rename = "VOLUME24HOURTO", default)]
    volume_24h_to: f64,
}

#[derive(Debug, Deserialize)]
struct PriceMultiFull {
    #[serde(rename = "RAW", default)]
    raw: HashMap<String, HashMap<String, RawQuote>>,
    #[serde(rename = "Response")]
    response: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HistoPoint {
    close: f64,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data", default)]
    data: Vec<HistoPoint>,
}

#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message", default)]
    message: String,
    #[serde(rename = "Data")]
    data: Option<HistoData>,
}

/// Endpoint and limit covering `range`.
const fn histo_params(range: SupportedRange) -> (&'static str, u32) {
    match range {
        SupportedRange::OneDay => ("/data/v2/histohour", 24),
        SupportedRange::OneWeek => ("/data/v2/histohour", 168),
        SupportedRange::OneMonth => ("/data/v2/histoday", 30),
        SupportedRange::ThreeMonths => ("/data/v2/histoday", 90),
        SupportedRange::OneYear => ("/data/v2/histoday", 365),
    }
}

fn api_error(message: &str) -> SourceError {
    if message.to_lowercase().contains("rate limit") {
        SourceError::RateLimited {
            retry_after_secs: None,
        }
    } else {
        SourceError::Malformed {
            message: message.to_string(),
        }
    }
}

/// CryptoCompare market data adapter.
#[derive(Debug, Clone)]
pub struct CryptoCompareSource {
    http: SourceHttpClient,
}

impl CryptoCompareSource {
    /// Create an adapter for `base_url`, e.g. `https://min-api.cryptocompare.com`.
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
impl MarketDataSource for CryptoCompareSource {
    fn name(&self) -> &str {
        CRYPTOCOMPARE
    }

    async fn fetch_snapshots(&self, symbols: &[String]) -> Result<Vec<CoinSnapshot>, SourceError> {
        // base asset -> pair symbol
        let wanted: HashMap<String, &String> = symbols
            .iter()
            .map(|symbol| (split_pair(symbol).0, symbol))
            .collect();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }

        let mut bases: Vec<&str> = wanted.keys().map(String::as_str).collect();
        bases.sort_unstable();
        let payload: PriceMultiFull = self
            .http
            .get_json(
                "/data/pricemultifull",
                &[("fsyms", bases.join(",")), ("tsyms", QUOTE.to_string())],
            )
            .await?;
        if payload.response.as_deref() == Some("Error") {
            return Err(api_error(payload.message.as_deref().unwrap_or("unknown error")));
        }

        Ok(payload
            .raw
            .into_iter()
            .filter_map(|(base, mut quotes)| {
                let symbol = wanted.get(&base)?;
                let quote = quotes.remove(QUOTE)?;
                Some(CoinSnapshot::new(
                    symbol.as_str(),
                    quote.price,
                    quote.change_pct_24h,
                    quote.high_24h,
                    quote.low_24h,
                    quote.volume_24h_to,
                ))
            })
            .collect())
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        range: SupportedRange,
    ) -> Result<ChartSeries, SourceError> {
        let (endpoint, limit) = histo_params(range);
        let (base, _) = split_pair(symbol);
        let payload: HistoResponse = self
            .http
            .get_json(
                endpoint,
                &[
                    ("fsym", base),
                    ("tsym", QUOTE.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        if payload.response != "Success" {
            return Err(api_error(&payload.message));
        }
        Ok(payload
            .data
            .map(|d| d.data)
            .unwrap_or_default()
            .into_iter()
            .map(|p| p.close)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn pricemultifull_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/pricemultifull"))
            .and(query_param("fsyms", "BTC,ETH"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "RAW": {
                    "BTC": { "USD": {
                        "PRICE": 65000.0, "CHANGEPCT24HOUR": -0.5,
                        "HIGH24HOUR": 66000.0, "LOW24HOUR": 64000.0, "VOLUME24HOURTO": 1.0e9
                    }},
                    "ETH": { "USD": { "PRICE": 3100.0 } }
                }
            })))
            .mount(&server)
            .await;

        let source = CryptoCompareSource::new(&server.uri()).unwrap();
        let mut snapshots = source
            .fetch_snapshots(&["ETHUSDT".to_string(), "BTCUSDT".to_string()])
            .await
            .unwrap();
        snapshots.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        assert_eq!(snapshots.len(), 2);
        assert_eq!(snapshots[0].symbol, "BTCUSDT");
        assert!((snapshots[0].price_change_percent + 0.5).abs() < 1e-9);
        assert_eq!(snapshots[1].symbol, "ETHUSDT");
        assert!((snapshots[1].price_change_percent).abs() < 1e-9);
    }

    #[tokio::test]
    async fn histohour_yields_closes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v2/histohour"))
            .and(query_param("fsym", "SOL"))
            .and(query_param("limit", "24"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "Success",
                "Message": "",
                "Data": { "Data": [
                    { "time": 1, "close": 140.0, "open": 1.0 },
                    { "time": 2, "close": 141.5, "open": 1.0 }
                ]}
            })))
            .mount(&server)
            .await;

        let source = CryptoCompareSource::new(&server.uri()).unwrap();
        let series = source
            .fetch_history("SOLUSDT", SupportedRange::OneDay)
            .await
            .unwrap();
        assert_eq!(series.values(), &[140.0, 141.5]);
    }

    #[tokio::test]
    async fn rate_limit_message_maps_to_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/v2/histoday"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Response": "Error",
                "Message": "You are over your rate limit please upgrade your account!",
                "Data": {}
            })))
            .mount(&server)
            .await;

        let source = CryptoCompareSource::new(&server.uri()).unwrap();
        let err = source
            .fetch_history("BTCUSDT", SupportedRange::OneYear)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                retry_after_secs: None
            }
        );
    }
}
