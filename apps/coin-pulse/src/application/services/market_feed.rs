//! Market Data Feed
//!
//! Produces coin snapshots for the tracked universe and serves historical
//! series, falling back through an ordered list of sources.
//!
//! # Design
//!
//! - Every request walks the sources in priority order. Sources the
//!   rate-limit registry reports as limited are skipped without a request.
//! - Any failure (transport, status, malformed payload, per-source timeout,
//!   too few samples) marks the source limited for its cool-down and the
//!   next source is tried. A symbol the source cannot map only moves on to
//!   the next source; the source stays available for other symbols.
//! - Exhausting the chain yields `HistoricalSeries::unavailable()`. History
//!   is never synthesized.
//! - The whole historical request is bounded by an overall timeout.
//! - Snapshots are replaced wholesale per symbol. A failed refresh keeps the
//!   last-known-good snapshots.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::fallback::try_in_order;
use crate::application::ports::{
    MarketDataSource, NoOpSnapshotPublisher, SnapshotPublisher, SourceError,
};
use crate::domain::market::{ChartSeries, CoinSnapshot, HistoricalSeries, SupportedRange, TimeRange};
use crate::domain::rate_limit::SharedRateLimitRegistry;
use crate::infrastructure::metrics::{self, SourceOperation};

// =============================================================================
// Settings
// =============================================================================

/// Timing knobs for the feed.
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Bound on one source attempt.
    pub source_timeout: Duration,
    /// Bound on a whole historical request across all sources.
    pub history_timeout: Duration,
    /// How long a served historical series is reused.
    pub history_cache_ttl: Duration,
    /// Snapshot polling interval for `run`.
    pub refresh_interval: Duration,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            source_timeout: Duration::from_secs(5),
            history_timeout: Duration::from_secs(10),
            history_cache_ttl: Duration::from_secs(60),
            refresh_interval: Duration::from_secs(30),
        }
    }
}

// =============================================================================
// Feed
// =============================================================================

/// A market data source shared between the feed and its tasks.
pub type SourceHandle = Arc<dyn MarketDataSource>;

#[derive(Debug, Clone)]
struct CachedHistory {
    result: HistoricalSeries,
    stored_at: Instant,
}

/// Shared handle to a feed.
pub type SharedMarketDataFeed = Arc<MarketDataFeed>;

/// Multi-source snapshot and history provider.
pub struct MarketDataFeed {
    sources: Vec<SourceHandle>,
    registry: SharedRateLimitRegistry,
    publisher: Arc<dyn SnapshotPublisher>,
    settings: FeedSettings,
    symbols: Vec<String>,
    snapshots: RwLock<HashMap<String, CoinSnapshot>>,
    history_cache: RwLock<HashMap<(String, SupportedRange), CachedHistory>>,
    last_snapshot_source: RwLock<Option<String>>,
}

impl std::fmt::Debug for MarketDataFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataFeed")
            .field("sources", &self.source_names())
            .field("symbols", &self.symbols)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl MarketDataFeed {
    /// Create a feed over `sources`, highest priority first.
    #[must_use]
    pub fn new(
        sources: Vec<SourceHandle>,
        registry: SharedRateLimitRegistry,
        settings: FeedSettings,
    ) -> Self {
        Self {
            sources,
            registry,
            publisher: Arc::new(NoOpSnapshotPublisher),
            settings,
            symbols: Vec::new(),
            snapshots: RwLock::new(HashMap::new()),
            history_cache: RwLock::new(HashMap::new()),
            last_snapshot_source: RwLock::new(None),
        }
    }

    /// Track `symbols` in the snapshot refresh.
    #[must_use]
    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols.into_iter().map(|s| s.to_uppercase()).collect();
        self
    }

    /// Publish applied snapshots through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn SnapshotPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Source names in priority order.
    #[must_use]
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    /// Tracked symbols.
    #[must_use]
    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    /// Feed settings.
    #[must_use]
    pub const fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    // -------------------------------------------------------------------------
    // Snapshots
    // -------------------------------------------------------------------------

    /// Latest snapshot for `symbol`, absent until the first tick.
    #[must_use]
    pub fn get_snapshot(&self, symbol: &str) -> Option<CoinSnapshot> {
        self.snapshots.read().get(&symbol.to_uppercase()).cloned()
    }

    /// Every known snapshot, sorted by symbol.
    #[must_use]
    pub fn snapshots(&self) -> Vec<CoinSnapshot> {
        let mut all: Vec<CoinSnapshot> = self.snapshots.read().values().cloned().collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }

    /// Source that served the most recent snapshot refresh or push.
    #[must_use]
    pub fn last_snapshot_source(&self) -> Option<String> {
        self.last_snapshot_source.read().clone()
    }

    /// Replace snapshots wholesale and publish them. Invalid snapshots are
    /// dropped. Returns how many were applied.
    pub fn apply_snapshots(&self, snapshots: Vec<CoinSnapshot>, source: &str) -> usize {
        let valid: Vec<CoinSnapshot> = snapshots.into_iter().filter(CoinSnapshot::is_valid).collect();
        if valid.is_empty() {
            return 0;
        }
        {
            let mut current = self.snapshots.write();
            for snapshot in &valid {
                current.insert(snapshot.symbol.clone(), snapshot.clone());
            }
        }
        *self.last_snapshot_source.write() = Some(source.to_string());
        for snapshot in &valid {
            self.publisher.publish(snapshot);
        }
        metrics::record_snapshots_applied(source, valid.len() as u64);
        valid.len()
    }

    /// Poll the source chain once for the tracked symbols.
    ///
    /// Returns the serving source's name, or `None` when every source failed
    /// or was limited. Existing snapshots are kept on failure.
    pub async fn refresh_snapshots(&self) -> Option<String> {
        if self.symbols.is_empty() {
            return None;
        }
        let outcome = try_in_order(
            self.sources.iter(),
            |source: &SourceHandle| self.is_available(source, SourceOperation::Snapshots),
            |source| self.attempt_snapshots(source),
            |source: &SourceHandle, error: SourceError| {
                self.on_source_failure(source, SourceOperation::Snapshots, &error);
            },
        )
        .await;

        match outcome.served {
            Some((source, snapshots)) => {
                let applied = self.apply_snapshots(snapshots, source.name());
                tracing::debug!(source = source.name(), applied, "Snapshots refreshed");
                Some(source.name().to_string())
            }
            None => {
                tracing::warn!(
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    limited = ?self.registry.limited_sources(),
                    "Snapshot refresh failed, keeping last known prices"
                );
                None
            }
        }
    }

    /// Refresh snapshots every `refresh_interval` until cancelled.
    pub async fn run(self: Arc<Self>, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.settings.refresh_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            symbols = self.symbols.len(),
            interval_secs = self.settings.refresh_interval.as_secs(),
            "Market data feed started"
        );

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    tracing::info!("Market data feed cancelled");
                    return;
                }
                _ = ticker.tick() => {
                    self.refresh_snapshots().await;
                }
            }
        }
    }

    // -------------------------------------------------------------------------
    // History
    // -------------------------------------------------------------------------

    /// Historical series for `symbol` over `range`.
    ///
    /// `force_refresh` bypasses the result cache but not the rate limits.
    /// Never fails: exhausted sources or the overall timeout yield
    /// `success: false` with an empty series.
    pub async fn get_historical_series(
        &self,
        symbol: &str,
        range: TimeRange,
        force_refresh: bool,
    ) -> HistoricalSeries {
        let supported = range.supported();
        let key = (symbol.to_uppercase(), supported);

        if !force_refresh && let Some(cached) = self.cached_history(&key) {
            metrics::record_history_cache(true);
            return cached;
        }
        metrics::record_history_cache(false);

        let fetch = self.fetch_history_chain(&key.0, supported);
        let result = match tokio::time::timeout(self.settings.history_timeout, fetch).await {
            Ok(Some(result)) => result,
            Ok(None) => HistoricalSeries::unavailable(),
            Err(_) => {
                tracing::warn!(
                    symbol = %key.0,
                    range = range.as_str(),
                    timeout_ms = self.settings.history_timeout.as_millis(),
                    "Historical request timed out"
                );
                HistoricalSeries::unavailable()
            }
        };

        if result.success {
            self.history_cache.write().insert(
                key,
                CachedHistory {
                    result: result.clone(),
                    stored_at: Instant::now(),
                },
            );
        } else {
            metrics::record_history_unavailable();
        }
        result
    }

    fn cached_history(&self, key: &(String, SupportedRange)) -> Option<HistoricalSeries> {
        let cache = self.history_cache.read();
        let entry = cache.get(key)?;
        (entry.stored_at.elapsed() < self.settings.history_cache_ttl).then(|| entry.result.clone())
    }

    async fn fetch_history_chain(&self, symbol: &str, range: SupportedRange) -> Option<HistoricalSeries> {
        let outcome = try_in_order(
            self.sources.iter(),
            |source: &SourceHandle| self.is_available(source, SourceOperation::History),
            |source| self.attempt_history(source, symbol, range),
            |source: &SourceHandle, error: SourceError| {
                self.on_source_failure(source, SourceOperation::History, &error);
            },
        )
        .await;

        match outcome.served {
            Some((source, series)) => {
                tracing::debug!(
                    symbol,
                    range = range.as_str(),
                    source = source.name(),
                    samples = series.len(),
                    "Historical series served"
                );
                Some(HistoricalSeries::served(series, source.name()))
            }
            None => {
                tracing::warn!(
                    symbol,
                    range = range.as_str(),
                    skipped = outcome.skipped,
                    failed = outcome.failed,
                    limited = ?self.registry.limited_sources(),
                    "No source could serve historical series"
                );
                None
            }
        }
    }

    // -------------------------------------------------------------------------
    // Source bookkeeping
    // -------------------------------------------------------------------------

    async fn attempt_snapshots(&self, source: &SourceHandle) -> Result<Vec<CoinSnapshot>, SourceError> {
        let timeout = self.settings.source_timeout;
        metrics::record_source_attempt(source.name(), SourceOperation::Snapshots);
        let snapshots = tokio::time::timeout(timeout, source.fetch_snapshots(&self.symbols))
            .await
            .map_err(|_| SourceError::timeout(timeout))??;
        if snapshots.is_empty() {
            return Err(SourceError::Malformed {
                message: "no snapshots in response".into(),
            });
        }
        Ok(snapshots)
    }

    async fn attempt_history(
        &self,
        source: &SourceHandle,
        symbol: &str,
        range: SupportedRange,
    ) -> Result<ChartSeries, SourceError> {
        let timeout = self.settings.source_timeout;
        metrics::record_source_attempt(source.name(), SourceOperation::History);
        let series = tokio::time::timeout(timeout, source.fetch_history(symbol, range))
            .await
            .map_err(|_| SourceError::timeout(timeout))??;
        validate_series(series)
    }

    fn is_available(&self, source: &SourceHandle, operation: SourceOperation) -> bool {
        if self.registry.is_limited(source.name()) {
            tracing::debug!(source = source.name(), "Skipping rate limited source");
            metrics::record_source_skipped(source.name(), operation);
            return false;
        }
        true
    }

    fn on_source_failure(&self, source: &SourceHandle, operation: SourceOperation, error: &SourceError) {
        metrics::record_source_failure(source.name(), operation, error.kind());
        if !error.throttles_source() {
            tracing::debug!(source = source.name(), error = %error, "Source cannot serve symbol, falling back");
            return;
        }
        let cooldown = match error {
            SourceError::RateLimited {
                retry_after_secs: Some(secs),
            } => Duration::from_secs(*secs).max(source.cooldown()),
            _ => source.cooldown(),
        };
        tracing::warn!(
            source = source.name(),
            error = %error,
            cooldown_secs = cooldown.as_secs(),
            "Source failed, falling back"
        );
        metrics::record_rate_limit_mark(source.name());
        self.registry.mark_limited(source.name(), cooldown);
    }
}

fn validate_series(series: ChartSeries) -> Result<ChartSeries, SourceError> {
    let series = series.sanitized();
    if series.is_drawable() {
        Ok(series)
    } else {
        Err(SourceError::InsufficientData {
            samples: series.len(),
        })
    }
}
