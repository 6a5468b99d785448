//! Binance Mini-Ticker Stream
//!
//! Push feed of 24h rolling tickers. Applied snapshots go through the same
//! `MarketDataFeed::apply_snapshots` path as polled ones, so widgets never
//! know which channel a price arrived on.
//!
//! # Stream URL
//!
//! - All markets: `wss://stream.binance.com:9443/ws/!miniTicker@arr`
//! - One market: `wss://stream.binance.com:9443/ws/btcusdt@miniTicker`
//!
//! # Protocol
//!
//! The all-markets stream sends a JSON array of tickers about once a
//! second; single-market streams send one object. Every decimal is a
//! string. There is no percentage field, so the change is derived from the
//! open and close.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use super::http::parse_decimal;
use super::reconnect::{Backoff, ReconnectState};
use crate::application::ports::SourceError;
use crate::application::services::SharedMarketDataFeed;
use crate::domain::market::CoinSnapshot;
use crate::infrastructure::config::StreamSettings;
use crate::infrastructure::metrics;

/// Source name recorded for pushed snapshots.
pub const BINANCE_STREAM: &str = "binance-stream";

// =============================================================================
// Error Type
// =============================================================================

/// Errors that can occur in the stream client.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Frame did not decode as ticker JSON.
    #[error("Undecodable ticker frame: {0}")]
    Decode(#[from] serde_json::Error),

    /// A ticker field held an unusable value.
    #[error("Invalid ticker: {0}")]
    InvalidTicker(#[from] SourceError),

    /// No frame arrived within the idle timeout.
    #[error("No data for {0:?}")]
    Idle(Duration),

    /// Connection closed by the server.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Maximum reconnection attempts exceeded.
    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectAttemptsExceeded,
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct MiniTicker {
    #[serde(rename = "s")]
    symbol: String,
    #[serde(rename = "c")]
    close: String,
    #[serde(rename = "o")]
    open: String,
    #[serde(rename = "h")]
    high: String,
    #[serde(rename = "l")]
    low: String,
    #[serde(rename = "q")]
    quote_volume: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TickerFrame {
    Many(Vec<MiniTicker>),
    One(MiniTicker),
}

impl MiniTicker {
    fn into_snapshot(self) -> Result<CoinSnapshot, SourceError> {
        let close = parse_decimal("c", &self.close)?;
        let open = parse_decimal("o", &self.open)?;
        let change_percent = if open > 0.0 {
            (close - open) / open * 100.0
        } else {
            0.0
        };
        Ok(CoinSnapshot::new(
            self.symbol,
            close,
            change_percent,
            parse_decimal("h", &self.high)?,
            parse_decimal("l", &self.low)?,
            parse_decimal("q", &self.quote_volume)?,
        ))
    }
}

/// Decode one stream frame, keeping only `tracked` symbols.
///
/// # Errors
///
/// Returns `StreamError::Decode` for non-ticker JSON and
/// `StreamError::InvalidTicker` when a tracked ticker has a bad decimal.
pub fn decode_tickers(text: &str, tracked: &HashSet<String>) -> Result<Vec<CoinSnapshot>, StreamError> {
    let tickers = match serde_json::from_str::<TickerFrame>(text)? {
        TickerFrame::Many(tickers) => tickers,
        TickerFrame::One(ticker) => vec![ticker],
    };
    tickers
        .into_iter()
        .filter(|t| tracked.is_empty() || tracked.contains(&t.symbol))
        .map(|t| t.into_snapshot().map_err(StreamError::from))
        .collect()
}

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the stream client.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL.
    pub url: String,
    /// Delay schedule between connections.
    pub backoff: Backoff,
    /// Reconnect when nothing arrives for this long.
    pub idle_timeout: Duration,
}

impl StreamConfig {
    /// Create configuration from `StreamSettings`.
    #[must_use]
    pub fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            url: settings.url.clone(),
            backoff: Backoff::from_stream_settings(settings),
            idle_timeout: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Client
// =============================================================================

/// Mini-ticker client feeding pushed snapshots into the market data feed.
pub struct TickerStreamClient {
    config: StreamConfig,
    feed: SharedMarketDataFeed,
    tracked: HashSet<String>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for TickerStreamClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerStreamClient")
            .field("url", &self.config.url)
            .field("tracked", &self.tracked.len())
            .finish_non_exhaustive()
    }
}

impl TickerStreamClient {
    /// Create a client for the feed's tracked symbols.
    #[must_use]
    pub fn new(config: StreamConfig, feed: SharedMarketDataFeed, cancel: CancellationToken) -> Self {
        let tracked = feed.symbols().iter().map(|s| s.to_uppercase()).collect();
        Self {
            config,
            feed,
            tracked,
            cancel,
        }
    }

    /// Run the client with automatic reconnection.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::MaxReconnectAttemptsExceeded` after too many
    /// consecutive connections end without a usable frame. Cancellation returns `Ok`.
    pub async fn run(self: Arc<Self>) -> Result<(), StreamError> {
        let mut reconnect = ReconnectState::new(self.config.backoff);

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Ticker stream cancelled");
                return Ok(());
            }

            match self.connect_and_run(&mut reconnect).await {
                Ok(()) => {
                    metrics::set_stream_connected(false);
                    tracing::info!("Ticker stream closed");
                    return Ok(());
                }
                Err(e) => {
                    metrics::set_stream_connected(false);
                    tracing::warn!(source = BINANCE_STREAM, error = %e, "Ticker stream error");

                    let Some(delay) = reconnect.connection_lost() else {
                        return Err(StreamError::MaxReconnectAttemptsExceeded);
                    };
                    metrics::record_stream_reconnect();
                    tracing::info!(
                        source = BINANCE_STREAM,
                        attempt = reconnect.failures(),
                        delay_ms = delay.as_millis(),
                        "Reconnecting to ticker stream"
                    );

                    tokio::select! {
                        () = self.cancel.cancelled() => {
                            tracing::info!("Ticker stream cancelled during reconnect delay");
                            return Ok(());
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    /// Connect and pump frames until error or cancellation.
    async fn connect_and_run(&self, reconnect: &mut ReconnectState) -> Result<(), StreamError> {
        tracing::info!(url = %self.config.url, "Connecting to ticker stream");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        metrics::set_stream_connected(true);
        tracing::info!("Ticker stream connected");

        loop {
            let idle = tokio::time::sleep(self.config.idle_timeout);
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                () = idle => {
                    return Err(StreamError::Idle(self.config.idle_timeout));
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if self.handle_text(&text) > 0 {
                                reconnect.frame_received();
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(_))) => {
                            tracing::info!("Server sent close frame");
                            return Err(StreamError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(StreamError::ConnectionClosed),
                    }
                }
            }
        }
    }

    /// Apply one frame. Bad frames are logged and skipped; the connection
    /// stays up.
    fn handle_text(&self, text: &str) -> usize {
        match decode_tickers(text, &self.tracked) {
            Ok(snapshots) if snapshots.is_empty() => 0,
            Ok(snapshots) => self.feed.apply_snapshots(snapshots, BINANCE_STREAM),
            Err(e) => {
                tracing::debug!(error = %e, "Skipping ticker frame");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::services::{FeedSettings, MarketDataFeed};
    use crate::domain::rate_limit::RateLimitRegistry;

    fn tracked(symbols: &[&str]) -> HashSet<String> {
        symbols.iter().map(|s| (*s).to_string()).collect()
    }

    const FRAME: &str = r#"[
        {"e":"24hrMiniTicker","E":1700000000000,"s":"BTCUSDT","c":"44000.00","o":"40000.00","h":"45000.00","l":"39000.00","v":"1000","q":"44000000"},
        {"e":"24hrMiniTicker","E":1700000000000,"s":"DOGEUSDT","c":"0.1","o":"0.1","h":"0.1","l":"0.1","v":"1","q":"1"}
    ]"#;

    #[test]
    fn array_frame_is_filtered_to_tracked_symbols() {
        let snapshots = decode_tickers(FRAME, &tracked(&["BTCUSDT"])).unwrap();
        assert_eq!(snapshots.len(), 1);
        let btc = &snapshots[0];
        assert_eq!(btc.symbol, "BTCUSDT");
        assert_eq!(btc.base_asset, "BTC");
        assert!((btc.last_price - 44_000.0).abs() < f64::EPSILON);
        assert!((btc.price_change_percent - 10.0).abs() < 1e-9);
        assert!((btc.quote_volume - 44_000_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn single_object_frame_decodes() {
        let text = r#"{"e":"24hrMiniTicker","s":"ETHUSDT","c":"1900","o":"2000","h":"2010","l":"1880","v":"5","q":"9500"}"#;
        let snapshots = decode_tickers(text, &tracked(&[])).unwrap();
        assert_eq!(snapshots.len(), 1);
        assert!((snapshots[0].price_change_percent + 5.0).abs() < 1e-9);
    }

    #[test]
    fn zero_open_reports_flat_change() {
        let text = r#"{"s":"NEWUSDT","c":"1.5","o":"0","h":"1.5","l":"0","q":"10"}"#;
        let snapshots = decode_tickers(text, &tracked(&[])).unwrap();
        assert!(snapshots[0].price_change_percent.abs() < f64::EPSILON);
    }

    #[test]
    fn bad_decimal_is_rejected() {
        let text = r#"{"s":"BTCUSDT","c":"abc","o":"1","h":"1","l":"1","q":"1"}"#;
        assert!(matches!(
            decode_tickers(text, &tracked(&[])),
            Err(StreamError::InvalidTicker(_))
        ));
    }

    #[test]
    fn non_ticker_json_is_a_decode_error() {
        assert!(matches!(
            decode_tickers(r#"{"result":null,"id":1}"#, &tracked(&[])),
            Err(StreamError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn frames_are_applied_to_the_feed() {
        let feed = Arc::new(
            MarketDataFeed::new(Vec::new(), Arc::new(RateLimitRegistry::new()), FeedSettings::default())
                .with_symbols(vec!["BTCUSDT".to_string()]),
        );
        let client = TickerStreamClient::new(
            StreamConfig::from_stream_settings(&StreamSettings::default()),
            Arc::clone(&feed),
            CancellationToken::new(),
        );

        assert_eq!(client.handle_text(FRAME), 1);
        assert_eq!(client.handle_text("not json"), 0);

        let btc = feed.get_snapshot("BTCUSDT").unwrap();
        assert!((btc.last_price - 44_000.0).abs() < f64::EPSILON);
        assert!(feed.get_snapshot("DOGEUSDT").is_none());
        assert_eq!(feed.last_snapshot_source().as_deref(), Some(BINANCE_STREAM));
    }
}
