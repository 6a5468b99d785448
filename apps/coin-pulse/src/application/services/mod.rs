//! Application Services
//!
//! Services coordinate domain logic over the driven ports. The feed and the
//! widgets run background tasks; the resolver and renderer are called on
//! demand.

mod bookmark_service;
mod chart_renderer;
mod chart_widget;
mod coin_list;
mod fallback;
mod icon_resolver;
mod market_feed;
mod scheduler;

pub use bookmark_service::{BOOKMARKS_KEY, BookmarkService};
pub use chart_renderer::{BACKING_SCALE, ChartRenderer, RenderOutcome};
pub use chart_widget::{ChartMode, ChartStatus, CoinChartWidget, WidgetSettings};
pub use coin_list::{CoinListView, CoinRow, ListQuery};
pub use fallback::{FallbackOutcome, try_in_order};
pub use icon_resolver::{ICON_CACHE_KEY, IconResolver, IconResolverSettings, SharedIconResolver};
pub use market_feed::{FeedSettings, MarketDataFeed, SharedMarketDataFeed, SourceHandle};
pub use scheduler::{Debouncer, HOVER_DEBOUNCE, ScheduledTask};
