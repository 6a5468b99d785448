//! Market Data Port (Driven Port)
//!
//! Interface for fetching snapshots and historical series from an upstream
//! provider. Each adapter normalizes its own payload shape into
//! `CoinSnapshot` and `ChartSeries`.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::market::{ChartSeries, CoinSnapshot, SupportedRange};
use crate::domain::rate_limit::cooldown_for;

/// Upstream failure. The feed always moves on to the next source; see
/// [`SourceError::throttles_source`] for which variants also start a
/// cool-down.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Network unreachable, TLS failure, connection reset.
    #[error("Transport error: {message}")]
    Transport {
        /// Error details.
        message: String,
    },

    /// Non-success HTTP status.
    #[error("HTTP status {status}")]
    Status {
        /// Status code.
        status: u16,
    },

    /// The source said it is throttling us.
    #[error("Rate limited by source")]
    RateLimited {
        /// Seconds the source asked us to wait, when it said.
        retry_after_secs: Option<u64>,
    },

    /// Payload did not have the expected shape or content.
    #[error("Malformed payload: {message}")]
    Malformed {
        /// Error details.
        message: String,
    },

    /// The attempt took too long.
    #[error("Timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The source has no mapping for the symbol.
    #[error("Unsupported symbol: {symbol}")]
    UnsupportedSymbol {
        /// The symbol.
        symbol: String,
    },

    /// Too few usable samples to draw.
    #[error("Insufficient data: {samples} samples")]
    InsufficientData {
        /// Samples received.
        samples: usize,
    },
}

impl SourceError {
    /// Timeout error for a duration.
    #[must_use]
    pub fn timeout(after: Duration) -> Self {
        Self::Timeout {
            timeout_ms: u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
        }
    }

    /// Whether the failure says something about the source's health.
    ///
    /// `UnsupportedSymbol` only concerns one symbol, so the source stays
    /// available for every other symbol. A short series is a parse failure
    /// and does throttle.
    #[must_use]
    pub const fn throttles_source(&self) -> bool {
        !matches!(self, Self::UnsupportedSymbol { .. })
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Status { .. } => "status",
            Self::RateLimited { .. } => "rate_limited",
            Self::Malformed { .. } => "malformed",
            Self::Timeout { .. } => "timeout",
            Self::UnsupportedSymbol { .. } => "unsupported_symbol",
            Self::InsufficientData { .. } => "insufficient_data",
        }
    }
}

/// Port for one upstream market data provider.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Stable source name, used as the rate-limit key.
    fn name(&self) -> &str;

    /// Cool-down applied after a failure.
    fn cooldown(&self) -> Duration {
        cooldown_for(self.name())
    }

    /// Current snapshots for `symbols`. Symbols the source does not know are
    /// skipped.
    async fn fetch_snapshots(&self, symbols: &[String]) -> Result<Vec<CoinSnapshot>, SourceError>;

    /// Close prices for `symbol` over `range`, oldest first.
    async fn fetch_history(
        &self,
        symbol: &str,
        range: SupportedRange,
    ) -> Result<ChartSeries, SourceError>;
}
