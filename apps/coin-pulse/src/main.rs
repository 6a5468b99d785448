//! Coin Pulse Binary
//!
//! Runs the market data feed headless: polls the configured sources, follows
//! the Binance ticker stream, keeps one chart widget per tracked symbol and
//! periodically writes each chart as a PPM image alongside the resolved
//! coin icons.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin coin-pulse
//! ```
//!
//! # Environment Variables
//!
//! - `PULSE_SYMBOLS`: Comma-separated pairs (default: BTCUSDT,ETHUSDT,SOLUSDT,BNBUSDT,XRPUSDT)
//! - `PULSE_SOURCES`: Source priority (default: binance,coingecko,cryptocompare)
//! - `PULSE_STREAM_ENABLED`: Follow the push stream (default: true)
//! - `PULSE_CHART_DIR`: Where charts and icons are written (default: charts)
//! - `PULSE_DATA_DIR`: Durable store directory (default: .coin-pulse)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)
//!
//! Bookmarked symbols get a one-day history chart; the rest show live prices.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use coin_pulse::application::ports::{IconSource, KeyValueStore, Surface};
use coin_pulse::application::services::{
    BookmarkService, ChartMode, ChartRenderer, CoinChartWidget, CoinListView, IconResolver,
    MarketDataFeed,
};
use coin_pulse::domain::chart::{Rgba, Viewport};
use coin_pulse::domain::icon::icon_asset;
use coin_pulse::domain::market::TimeRange;
use coin_pulse::infrastructure::broadcast::SnapshotHub;
use coin_pulse::infrastructure::icons::build_icon_sources;
use coin_pulse::infrastructure::metrics::get_metrics_handle;
use coin_pulse::infrastructure::render::PixelBuffer;
use coin_pulse::infrastructure::sources::{StreamConfig, TickerStreamClient, build_sources};
use coin_pulse::infrastructure::storage::JsonFileStore;
use coin_pulse::infrastructure::telemetry;
use coin_pulse::{PulseConfig, RateLimitRegistry, init_metrics};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// How often chart images are written.
const EXPORT_INTERVAL: Duration = Duration::from_secs(5);

/// Background the transparent chart is composited onto for export.
const EXPORT_BACKGROUND: Rgba = Rgba::rgb(0x11, 0x14, 0x1a);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    load_dotenv();

    let telemetry_guard = telemetry::init();

    tracing::info!(otlp = telemetry_guard.is_exporting(), "Starting Coin Pulse");

    let _metrics_handle = init_metrics();

    let config = PulseConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Feed over the configured sources, publishing into the hub
    let hub = Arc::new(SnapshotHub::new(config.stream.channel_capacity));
    let sources = build_sources(&config.feed.sources, &config.endpoints)?;
    let feed = Arc::new(
        MarketDataFeed::new(sources, RateLimitRegistry::global(), config.feed.feed_settings())
            .with_symbols(config.feed.symbols.clone())
            .with_publisher(Arc::clone(&hub) as _),
    );

    let feed_task = tokio::spawn(Arc::clone(&feed).run(shutdown_token.child_token()));

    if config.stream.enabled {
        let stream = Arc::new(TickerStreamClient::new(
            StreamConfig::from_stream_settings(&config.stream),
            Arc::clone(&feed),
            shutdown_token.child_token(),
        ));
        tokio::spawn(async move {
            if let Err(e) = stream.run().await {
                tracing::error!(error = %e, "Ticker stream stopped");
            }
        });
    }

    // Durable state
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&config.data_dir)?);
    let bookmarks = Arc::new(BookmarkService::load(Arc::clone(&store)));
    tracing::info!(count = bookmarks.bookmarks().len(), "Bookmarks loaded");

    tokio::fs::create_dir_all(&config.chart.output_dir).await?;

    // Icons
    let icon_sources: Vec<Arc<dyn IconSource>> = build_icon_sources(&config.endpoints.icon_templates)?;
    let resolver = Arc::new(IconResolver::new(icon_sources, Arc::clone(&store), config.icons.clone()));
    for symbol in &config.feed.symbols {
        let resolver = Arc::clone(&resolver);
        let symbol = symbol.clone();
        let dir = config.chart.output_dir.clone();
        tokio::spawn(async move {
            let icon = resolver.resolve(&symbol).await;
            let path = dir.join(format!("{}.svg", icon_asset(&symbol).to_lowercase()));
            if let Err(e) = tokio::fs::write(&path, icon.to_svg()).await {
                tracing::warn!(symbol = %symbol, error = %e, "Failed to write icon");
            }
        });
    }

    // One widget per symbol
    let viewport = Viewport::new(f64::from(config.chart.width), f64::from(config.chart.height))?;
    let mut widgets = Vec::with_capacity(config.feed.symbols.len());
    for symbol in &config.feed.symbols {
        let mode = if bookmarks.is_bookmarked(symbol) {
            ChartMode::Range(TimeRange::OneDay)
        } else {
            ChartMode::Live
        };
        let mut widget = CoinChartWidget::new(
            symbol,
            mode,
            Arc::clone(&feed),
            ChartRenderer::new(PixelBuffer::default()),
            viewport,
            config.chart.widget_settings(),
        );
        widget.mount(hub.subscribe());
        widgets.push(widget);
    }

    // List view with live sparklines
    let coin_list = Arc::new(CoinListView::new(Arc::clone(&feed), Arc::clone(&bookmarks)));
    let list_task = coin_list.spawn_listener(shutdown_token.child_token(), hub.subscribe());

    tokio::spawn(await_shutdown(shutdown_token.clone()));

    tracing::info!(widgets = widgets.len(), "Coin Pulse ready");

    let mut export = tokio::time::interval(EXPORT_INTERVAL);
    loop {
        tokio::select! {
            () = shutdown_token.cancelled() => break,
            _ = export.tick() => {
                export_charts(&widgets, &config.chart.output_dir);
                log_coin_list(&coin_list);
            }
        }
    }

    for widget in &mut widgets {
        widget.unmount();
    }
    list_task.shutdown().await;
    if let Err(e) = feed_task.await {
        tracing::error!(error = %e, "Feed task failed");
    }

    if let Some(handle) = get_metrics_handle() {
        tracing::debug!(metrics = %handle.render(), "Final metrics");
    }

    tracing::info!("Coin Pulse stopped");
    Ok(())
}

/// Write every widget's current backing store as `<symbol>.ppm`.
fn export_charts(widgets: &[CoinChartWidget<PixelBuffer>], dir: &Path) {
    for widget in widgets {
        let path = dir.join(format!("{}.ppm", widget.symbol().to_lowercase()));
        let result = widget.renderer().with_surface(|surface| {
            if surface.width() == 0 {
                return Ok(false);
            }
            surface.write_ppm(&path, EXPORT_BACKGROUND).map(|()| true)
        });
        match result {
            Ok(true) => tracing::trace!(path = %path.display(), "Chart exported"),
            Ok(false) => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "Chart export failed"),
        }
    }
}

/// Log the list in its current order.
fn log_coin_list(coin_list: &CoinListView) {
    for row in coin_list.rows() {
        tracing::info!(
            symbol = %row.snapshot.symbol,
            price = %row.price,
            change = %row.change,
            volume = %row.volume,
            bookmarked = row.bookmarked,
            sparkline = row.sparkline.len(),
            "Coin"
        );
    }
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_err() {
        load_dotenv_from_ancestors();
    }
}

/// Log the parsed configuration.
fn log_config(config: &PulseConfig) {
    tracing::info!(
        symbols = ?config.feed.symbols,
        sources = ?config.feed.sources.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        refresh_secs = config.feed.refresh_interval.as_secs(),
        stream = config.stream.enabled,
        "Configuration loaded"
    );
    tracing::debug!(
        binance = %config.endpoints.binance,
        coingecko = %config.endpoints.coingecko,
        cryptocompare = %config.endpoints.cryptocompare,
        stream_url = %config.stream.url,
        "Upstream endpoints"
    );
}

/// Load .env file from any ancestor directory.
fn load_dotenv_from_ancestors() {
    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
}
