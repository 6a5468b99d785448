#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Coin Pulse - Live Market Data & Chart Pipeline
//!
//! The headless core behind a dashboard's cryptocurrency widgets: it keeps
//! prices fresh from several public sources, remembers which sources are
//! throttling us, draws animated mini charts and resolves coin icons.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Pure types and algorithms
//!   - `market`: Snapshots, time ranges, chart series
//!   - `rate_limit`: Per-source throttle registry with lazy expiry
//!   - `live_buffer`: Rolling price windows, synthetic fallback series
//!   - `chart`: Projection, smoothing, animation, hover
//!   - `icon`: Deny-list, SVG validation, fallback badges
//!   - `bookmarks`, `watchlist`: List state and formatting
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Market data, icon, storage, publisher and surface ports
//!   - `services`: Feed, icon resolver, chart renderer, chart widget
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `sources`: Binance, CoinGecko, CryptoCompare, Binance stream
//!   - `icons`: URL-template icon sources
//!   - `broadcast`: Snapshot fan-out
//!   - `storage`: File and in-memory key-value stores
//!   - `render`: RGBA pixel buffer
//!
//! # Data Flow
//!
//! ```text
//! REST sources ──► fallback ──┐
//!                             ├──► MarketDataFeed ──► SnapshotHub ──► widgets ──► renderer
//! Binance stream ─────────────┘          │
//!                                        └──► history cache ──► range charts
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Market data, chart geometry and icon rules.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{ChartSeries, CoinSnapshot, SupportedRange, TimeRange};
pub use domain::rate_limit::{RateLimitRegistry, SharedRateLimitRegistry};

// Ports
pub use application::ports::{
    IconSource, KeyValueStore, MarketDataSource, SnapshotPublisher, SourceError, StoreError,
    Surface,
};

// Services
pub use application::services::{
    BookmarkService, ChartMode, ChartRenderer, ChartStatus, CoinChartWidget, CoinListView,
    FeedSettings, IconResolver, IconResolverSettings, ListQuery, MarketDataFeed, WidgetSettings,
    try_in_order,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, PulseConfig, SourceKind};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
