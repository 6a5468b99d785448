//! Market Data Sources
//!
//! REST adapters implementing `MarketDataSource`, plus the Binance push
//! stream.
//!
//! # Sources
//!
//! | Kind            | Snapshots               | History                 |
//! |-----------------|-------------------------|-------------------------|
//! | `binance`       | `/api/v3/ticker/24hr`   | `/api/v3/klines`        |
//! | `coingecko`     | `/api/v3/coins/markets` | `/coins/{id}/market_chart` |
//! | `cryptocompare` | `/data/pricemultifull`  | `/data/v2/histo*`       |

mod binance;
mod coingecko;
mod cryptocompare;
mod http;
mod reconnect;
mod stream;

use std::sync::Arc;

pub use binance::{BINANCE, BinanceSource};
pub use coingecko::{COINGECKO, CoinGeckoSource, coin_id};
pub use cryptocompare::{CRYPTOCOMPARE, CryptoCompareSource};
pub use http::SourceHttpClient;
pub use reconnect::{Backoff, ReconnectState};
pub use stream::{BINANCE_STREAM, StreamConfig, StreamError, TickerStreamClient, decode_tickers};

use crate::application::ports::SourceError;
use crate::application::services::SourceHandle;
use crate::infrastructure::config::{EndpointSettings, SourceKind};

/// Build the configured sources in priority order.
///
/// # Errors
///
/// Returns `SourceError::Transport` if an HTTP client cannot be built.
pub fn build_sources(kinds: &[SourceKind], endpoints: &EndpointSettings) -> Result<Vec<SourceHandle>, SourceError> {
    kinds
        .iter()
        .map(|kind| {
            let source: SourceHandle = match kind {
                SourceKind::Binance => Arc::new(BinanceSource::new(&endpoints.binance)?),
                SourceKind::CoinGecko => Arc::new(CoinGeckoSource::new(&endpoints.coingecko)?),
                SourceKind::CryptoCompare => Arc::new(CryptoCompareSource::new(&endpoints.cryptocompare)?),
            };
            Ok::<_, SourceError>(source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sources_follow_configured_order() {
        let sources = build_sources(
            &[SourceKind::CryptoCompare, SourceKind::Binance],
            &EndpointSettings::default(),
        )
        .unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec![CRYPTOCOMPARE, BINANCE]);
    }
}
