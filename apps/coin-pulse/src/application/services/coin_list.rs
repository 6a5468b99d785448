//! Coin List View
//!
//! The list widget's model: every tracked snapshot with a sparkline from
//! the live price buffer, filtered, sorted and formatted for display.

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use super::bookmark_service::BookmarkService;
use super::market_feed::SharedMarketDataFeed;
use super::scheduler::ScheduledTask;
use crate::domain::live_buffer::LivePriceBuffer;
use crate::domain::market::{ChartSeries, CoinSnapshot};
use crate::domain::watchlist::{
    DisplayCurrency, SortDirection, SortKey, bookmarked_only, format_change, format_price,
    format_volume, search, sort_snapshots,
};

/// Filter and ordering applied to the list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ListQuery {
    /// Sort column.
    pub sort: SortKey,
    /// Sort direction.
    pub direction: SortDirection,
    /// Case-insensitive symbol filter; empty shows everything.
    pub search: String,
    /// Only bookmarked symbols.
    pub bookmarked_only: bool,
    /// Currency prices are shown in.
    pub currency: DisplayCurrency,
}

/// One display row.
#[derive(Debug, Clone, PartialEq)]
pub struct CoinRow {
    /// Snapshot with prices in the display currency.
    pub snapshot: CoinSnapshot,
    /// Formatted last price.
    pub price: String,
    /// Formatted 24h change.
    pub change: String,
    /// Formatted 24h volume.
    pub volume: String,
    /// Whether the symbol is bookmarked.
    pub bookmarked: bool,
    /// Mini chart: live window, or synthetic until it fills.
    pub sparkline: ChartSeries,
}

/// Sorted, filtered coin list over the feed.
pub struct CoinListView {
    feed: SharedMarketDataFeed,
    bookmarks: Arc<BookmarkService>,
    buffer: Mutex<LivePriceBuffer>,
    query: RwLock<ListQuery>,
}

impl std::fmt::Debug for CoinListView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinListView")
            .field("query", &*self.query.read())
            .field("buffered", &self.buffer.lock().len())
            .finish_non_exhaustive()
    }
}

impl CoinListView {
    /// Create a view with the default query (volume, descending).
    #[must_use]
    pub fn new(feed: SharedMarketDataFeed, bookmarks: Arc<BookmarkService>) -> Self {
        Self {
            feed,
            bookmarks,
            buffer: Mutex::new(LivePriceBuffer::new()),
            query: RwLock::new(ListQuery::default()),
        }
    }

    /// Record one tick in the live buffer.
    pub fn observe(&self, snapshot: &CoinSnapshot) {
        self.buffer.lock().push(&snapshot.symbol, snapshot.last_price);
    }

    /// Feed hub updates into the buffer until `cancel` fires.
    #[must_use]
    pub fn spawn_listener(
        self: &Arc<Self>,
        cancel: CancellationToken,
        mut updates: broadcast::Receiver<CoinSnapshot>,
    ) -> ScheduledTask {
        let view = Arc::clone(self);
        ScheduledTask::spawn(cancel, async move {
            loop {
                match updates.recv().await {
                    Ok(snapshot) => view.observe(&snapshot),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Coin list listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Current query.
    #[must_use]
    pub fn query(&self) -> ListQuery {
        self.query.read().clone()
    }

    /// Replace the query.
    pub fn set_query(&self, query: ListQuery) {
        *self.query.write() = query;
    }

    /// Sort by `key`. Choosing the current column flips the direction;
    /// a new column starts descending.
    pub fn sort_by(&self, key: SortKey) {
        let mut query = self.query.write();
        if query.sort == key {
            query.direction = query.direction.flipped();
        } else {
            query.sort = key;
            query.direction = SortDirection::Descending;
        }
    }

    /// Rows for the current snapshots and query.
    #[must_use]
    pub fn rows(&self) -> Vec<CoinRow> {
        let query = self.query.read().clone();
        let bookmarks = self.bookmarks.bookmarks();

        let mut snapshots = search(&self.feed.snapshots(), &query.search);
        if query.bookmarked_only {
            snapshots = bookmarked_only(&snapshots, &bookmarks);
        }
        sort_snapshots(&mut snapshots, query.sort, query.direction);

        let buffer = self.buffer.lock();
        snapshots
            .into_iter()
            .map(|snapshot| {
                let sparkline = buffer.series_or_synthetic(&snapshot.symbol, &snapshot);
                let shown = query.currency.convert_snapshot(&snapshot);
                CoinRow {
                    price: format_price(shown.last_price, &query.currency.sign),
                    change: format_change(shown.price_change_percent),
                    volume: format_volume(shown.quote_volume),
                    bookmarked: bookmarks.contains(&snapshot.symbol),
                    sparkline,
                    snapshot: shown,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::KeyValueStore;
    use crate::application::services::{FeedSettings, MarketDataFeed};
    use crate::domain::live_buffer::{MIN_LIVE_SAMPLES, SYNTHETIC_POINTS};
    use crate::domain::rate_limit::RateLimitRegistry;
    use crate::infrastructure::storage::MemoryStore;

    fn view() -> (CoinListView, SharedMarketDataFeed, Arc<BookmarkService>) {
        let feed = Arc::new(MarketDataFeed::new(
            Vec::new(),
            Arc::new(RateLimitRegistry::new()),
            FeedSettings::default(),
        ));
        feed.apply_snapshots(
            vec![
                CoinSnapshot::new("BTCUSDT", 65_000.0, 2.0, 66_000.0, 64_000.0, 3.0e9),
                CoinSnapshot::new("ETHUSDT", 3_000.0, -1.0, 3_100.0, 2_900.0, 1.5e9),
                CoinSnapshot::new("SOLUSDT", 150.0, 5.0, 155.0, 140.0, 4.0e8),
            ],
            "test",
        );
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let bookmarks = Arc::new(BookmarkService::load(store));
        (
            CoinListView::new(Arc::clone(&feed), Arc::clone(&bookmarks)),
            feed,
            bookmarks,
        )
    }

    fn symbols(rows: &[CoinRow]) -> Vec<&str> {
        rows.iter().map(|r| r.snapshot.symbol.as_str()).collect()
    }

    #[test]
    fn default_order_is_volume_descending() {
        let (view, _, _) = view();
        let rows = view.rows();
        assert_eq!(symbols(&rows), vec!["BTCUSDT", "ETHUSDT", "SOLUSDT"]);
        assert_eq!(rows[0].price, "$65,000.00");
        assert_eq!(rows[0].change, "+2.00%");
        assert_eq!(rows[0].volume, "3.00B");
    }

    #[test]
    fn same_column_flips_direction() {
        let (view, _, _) = view();
        view.sort_by(SortKey::Change);
        assert_eq!(symbols(&view.rows()), vec!["SOLUSDT", "BTCUSDT", "ETHUSDT"]);
        view.sort_by(SortKey::Change);
        assert_eq!(symbols(&view.rows()), vec!["ETHUSDT", "BTCUSDT", "SOLUSDT"]);
    }

    #[test]
    fn search_and_bookmark_filters_combine() {
        let (view, _, bookmarks) = view();
        bookmarks.toggle("ETHUSDT").unwrap();
        bookmarks.toggle("SOLUSDT").unwrap();

        view.set_query(ListQuery {
            bookmarked_only: true,
            ..ListQuery::default()
        });
        assert_eq!(symbols(&view.rows()), vec!["ETHUSDT", "SOLUSDT"]);
        assert!(view.rows().iter().all(|r| r.bookmarked));

        view.set_query(ListQuery {
            bookmarked_only: true,
            search: "sol".into(),
            ..ListQuery::default()
        });
        assert_eq!(symbols(&view.rows()), vec!["SOLUSDT"]);
    }

    #[test]
    fn prices_convert_to_display_currency() {
        let (view, _, _) = view();
        view.set_query(ListQuery {
            search: "ETH".into(),
            currency: DisplayCurrency {
                code: "EUR".into(),
                sign: "€".into(),
                rate: 0.5,
            },
            ..ListQuery::default()
        });
        let rows = view.rows();
        assert_eq!(rows[0].price, "€1,500.00");
        assert!((rows[0].snapshot.quote_volume - 7.5e8).abs() < 1.0);
    }

    #[test]
    fn sparkline_turns_live_once_populated() {
        let (view, _, _) = view();
        assert_eq!(view.rows()[0].sparkline.len(), SYNTHETIC_POINTS);

        for i in 0..MIN_LIVE_SAMPLES {
            view.observe(&CoinSnapshot::new("BTCUSDT", 65_000.0 + i as f64, 2.0, 0.0, 0.0, 0.0));
        }
        let btc = &view.rows()[0];
        assert_eq!(btc.sparkline.len(), MIN_LIVE_SAMPLES);
        assert_eq!(btc.sparkline.last(), Some(65_009.0));
    }

    #[tokio::test]
    async fn listener_buffers_hub_updates() {
        let (view, _, _) = view();
        let view = Arc::new(view);
        let (tx, rx) = broadcast::channel(16);
        let cancel = CancellationToken::new();
        let task = view.spawn_listener(cancel.clone(), rx);

        tx.send(CoinSnapshot::new("ETHUSDT", 3_001.0, -1.0, 0.0, 0.0, 0.0)).unwrap();
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(view.buffer.lock().window("ETHUSDT").is_some());

        task.shutdown().await;
    }
}
