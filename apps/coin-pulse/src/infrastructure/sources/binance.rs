//! Binance REST Source
//!
//! - Snapshots: `GET /api/v3/ticker/24hr?symbols=["BTCUSDT",...]`
//! - History: `GET /api/v3/klines?symbol=&interval=&limit=`, close prices
//!
//! Binance sends every decimal as a JSON string.

use async_trait::async_trait;
use serde::Deserialize;

use super::http::{SourceHttpClient, parse_decimal};
use crate::application::ports::{MarketDataSource, SourceError};
use crate::domain::market::{ChartSeries, CoinSnapshot, SupportedRange};

/// Rate-limit key and source name.
pub const BINANCE: &str = "binance";

/// Close price column in a kline row.
const KLINE_CLOSE: usize = 4;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Ticker24h {
    symbol: String,
    last_price: String,
    price_change_percent: String,
    high_price: String,
    low_price: String,
    quote_volume: String,
}

impl Ticker24h {
    fn into_snapshot(self) -> Result<CoinSnapshot, SourceError> {
        Ok(CoinSnapshot::new(
            self.symbol,
            parse_decimal("lastPrice", &self.last_price)?,
            parse_decimal("priceChangePercent", &self.price_change_percent)?,
            parse_decimal("highPrice", &self.high_price)?,
            parse_decimal("lowPrice", &self.low_price)?,
            parse_decimal("quoteVolume", &self.quote_volume)?,
        ))
    }
}

/// Kline interval and row count covering `range`.
const fn kline_params(range: SupportedRange) -> (&'static str, u32) {
    match range {
        SupportedRange::OneDay => ("15m", 96),
        SupportedRange::OneWeek => ("1h", 168),
        SupportedRange::OneMonth => ("4h", 180),
        SupportedRange::ThreeMonths => ("1d", 90),
        SupportedRange::OneYear => ("1d", 365),
    }
}

/// Binance market data adapter.
#[derive(Debug, Clone)]
pub struct BinanceSource {
    http: SourceHttpClient,
}

impl BinanceSource {
    /// Create an adapter for `base_url`, e.g. `https://api.binance.com`.
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
impl MarketDataSource for BinanceSource {
    fn name(&self) -> &str {
        BINANCE
    }

    async fn fetch_snapshots(&self, symbols: &[String]) -> Result<Vec<CoinSnapshot>, SourceError> {
        if symbols.is_empty() {
            return Ok(Vec::new());
        }
        let encoded = serde_json::to_string(symbols).map_err(|e| SourceError::Malformed {
            message: e.to_string(),
        })?;
        let tickers: Vec<Ticker24h> = self
            .http
            .get_json("/api/v3/ticker/24hr", &[("symbols", encoded)])
            .await?;
        tickers.into_iter().map(Ticker24h::into_snapshot).collect()
    }

    async fn fetch_history(
        &self,
        symbol: &str,
        range: SupportedRange,
    ) -> Result<ChartSeries, SourceError> {
        let (interval, limit) = kline_params(range);
        let rows: Vec<Vec<serde_json::Value>> = self
            .http
            .get_json(
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_uppercase()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        rows.iter()
            .map(|row| match row.get(KLINE_CLOSE) {
                Some(serde_json::Value::String(close)) => parse_decimal("close", close),
                Some(serde_json::Value::Number(close)) => close.as_f64().ok_or_else(|| SourceError::Malformed {
                    message: "close out of range".into(),
                }),
                _ => Err(SourceError::Malformed {
                    message: "kline row without close price".into(),
                }),
            })
            .collect()
    }
}
