//! Live Chart Integration Tests
//!
//! Snapshots applied to the feed reach a mounted widget through the hub and
//! end up as pixels in its backing store.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::time::Duration;

use coin_pulse::application::ports::Surface;
use coin_pulse::application::services::{
    ChartMode, ChartRenderer, ChartStatus, CoinChartWidget, FeedSettings, MarketDataFeed,
    WidgetSettings,
};
use coin_pulse::domain::chart::Viewport;
use coin_pulse::domain::live_buffer::SYNTHETIC_POINTS;
use coin_pulse::infrastructure::broadcast::SnapshotHub;
use coin_pulse::infrastructure::render::PixelBuffer;
use coin_pulse::{CoinSnapshot, RateLimitRegistry};

fn feed_with(hub: &Arc<SnapshotHub>) -> Arc<MarketDataFeed> {
    Arc::new(
        MarketDataFeed::new(Vec::new(), Arc::new(RateLimitRegistry::new()), FeedSettings::default())
            .with_symbols(vec!["ETHUSDT".to_string()])
            .with_publisher(Arc::clone(hub) as _),
    )
}

fn tick(price: f64) -> CoinSnapshot {
    CoinSnapshot::new("ETHUSDT", price, 2.0, price + 10.0, price - 10.0, 5.0e8)
}

#[tokio::test(start_paused = true)]
async fn pushed_ticks_are_painted() {
    let hub = Arc::new(SnapshotHub::with_defaults());
    let feed = feed_with(&hub);
    let mut widget = CoinChartWidget::new(
        "ethusdt",
        ChartMode::Live,
        Arc::clone(&feed),
        ChartRenderer::new(PixelBuffer::default()),
        Viewport::new(160.0, 60.0).unwrap(),
        WidgetSettings::default(),
    );
    widget.mount(hub.subscribe());
    assert_eq!(widget.status(), ChartStatus::Loading);

    feed.apply_snapshots(vec![tick(3_000.0)], "test");
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(widget.status(), ChartStatus::Ready);
    assert_eq!(widget.frame().values.len(), SYNTHETIC_POINTS);

    let (width, height, painted) = widget.renderer().with_surface(|s| {
        let painted = s.pixels().iter().filter(|p| p.a > 0).count();
        (s.width(), s.height(), painted)
    });
    assert_eq!((width, height), (320, 120));
    assert!(painted > 0);

    for i in 1..12 {
        feed.apply_snapshots(vec![tick(3_000.0 + f64::from(i))], "test");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(widget.frame().values.len(), 12);
    assert!(widget.hover(80.0).is_some());

    widget.unmount();
    assert!(widget.draw_frame().is_none());
}
