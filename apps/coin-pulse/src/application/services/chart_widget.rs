//! Coin Chart Widget
//!
//! One chart on screen: either a live mini chart fed by pushed ticks, or a
//! detail chart showing a historical range.
//!
//! # Lifetime
//!
//! `mount` starts the tick listener and the frame ticker under one
//! cancellation token, plus the history load and its periodic refresh in
//! range mode. `unmount` cancels them all. A history response that arrives after
//! `unmount`, or after the range changed, is dropped.
//!
//! # Status
//!
//! `Loading` is shown only on first load and manual refresh. Background
//! refreshes keep the current chart until the new series arrives, and a
//! failed background refresh leaves it on screen. `NoData` means nothing
//! was ever loaded for the range, or a manual refresh failed.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

use super::chart_renderer::{ChartRenderer, RenderOutcome};
use super::market_feed::SharedMarketDataFeed;
use super::scheduler::ScheduledTask;
use crate::application::ports::Surface;
use crate::domain::chart::{
    ChartAnimator, ChartStyle, FrameValues, HoverSample, SeriesKey, Viewport,
};
use crate::domain::live_buffer::{LIVE_WINDOW_CAPACITY, LivePriceWindow};
use crate::domain::market::{CoinSnapshot, TimeRange};

/// Series identity used for the live window.
const LIVE_KEY: &str = "LIVE";

/// What the chart shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartMode {
    /// Rolling window of pushed ticks, synthetic until populated.
    Live,
    /// Historical series for a range.
    Range(TimeRange),
}

/// Loading state shown next to the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartStatus {
    /// First load or manual refresh in flight.
    Loading,
    /// A series is displayed.
    Ready,
    /// The historical fetch failed; nothing is drawn.
    NoData,
}

/// Widget timing.
#[derive(Debug, Clone)]
pub struct WidgetSettings {
    /// Background history refresh period in range mode.
    pub history_refresh: Duration,
    /// Animation frame period.
    pub frame_interval: Duration,
}

impl Default for WidgetSettings {
    fn default() -> Self {
        Self {
            history_refresh: Duration::from_secs(60),
            frame_interval: Duration::from_millis(16),
        }
    }
}

struct WidgetState {
    mode: ChartMode,
    status: ChartStatus,
    window: LivePriceWindow,
    latest: Option<CoinSnapshot>,
    /// Range whose series is on screen, if any.
    shown_range: Option<TimeRange>,
    animator: ChartAnimator,
    style: ChartStyle,
    dirty: bool,
}

struct WidgetInner<S> {
    symbol: String,
    feed: SharedMarketDataFeed,
    renderer: ChartRenderer<S>,
    viewport: Viewport,
    settings: WidgetSettings,
    mounted: AtomicBool,
    generation: AtomicU64,
    state: Mutex<WidgetState>,
}

/// A chart bound to one symbol.
pub struct CoinChartWidget<S> {
    inner: Arc<WidgetInner<S>>,
    cancel: Option<CancellationToken>,
    /// Tick listener and frame ticker; live for the whole mount.
    tasks: Vec<ScheduledTask>,
    /// History load and refresh; restarted when the mode changes.
    mode_tasks: Vec<ScheduledTask>,
}

impl<S> std::fmt::Debug for CoinChartWidget<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("CoinChartWidget")
            .field("symbol", &self.inner.symbol)
            .field("mode", &state.mode)
            .field("status", &state.status)
            .field("mounted", &self.inner.mounted.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

fn now() -> std::time::Instant {
    tokio::time::Instant::now().into_std()
}

impl<S: Surface + 'static> CoinChartWidget<S> {
    /// Create an unmounted widget.
    pub fn new(
        symbol: &str,
        mode: ChartMode,
        feed: SharedMarketDataFeed,
        renderer: ChartRenderer<S>,
        viewport: Viewport,
        settings: WidgetSettings,
    ) -> Self {
        let state = WidgetState {
            mode,
            status: ChartStatus::Loading,
            window: LivePriceWindow::new(LIVE_WINDOW_CAPACITY),
            latest: None,
            shown_range: None,
            animator: ChartAnimator::new(),
            style: ChartStyle::default(),
            dirty: false,
        };
        Self {
            inner: Arc::new(WidgetInner {
                symbol: symbol.to_uppercase(),
                feed,
                renderer,
                viewport,
                settings,
                mounted: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                state: Mutex::new(state),
            }),
            cancel: None,
            tasks: Vec::new(),
            mode_tasks: Vec::new(),
        }
    }

    /// Start listening, refreshing and animating.
    ///
    /// `updates` is a subscription to the snapshot hub. Mounting an already
    /// mounted widget restarts its tasks.
    pub fn mount(&mut self, updates: broadcast::Receiver<CoinSnapshot>) {
        self.unmount();
        let cancel = CancellationToken::new();
        let inner = Arc::clone(&self.inner);
        inner.mounted.store(true, Ordering::Release);

        if let Some(snapshot) = inner.feed.get_snapshot(&inner.symbol) {
            inner.apply_tick(&snapshot);
        }

        self.tasks.push(ScheduledTask::spawn(
            cancel.child_token(),
            Arc::clone(&inner).listen(updates),
        ));
        let painter = Arc::clone(&inner);
        self.tasks.push(ScheduledTask::every(
            cancel.child_token(),
            inner.settings.frame_interval,
            move || {
                painter.draw_frame();
                std::future::ready(())
            },
        ));

        self.cancel = Some(cancel);
        self.start_mode_tasks();
        tracing::debug!(symbol = %inner.symbol, mode = ?self.mode(), "Chart widget mounted");
    }

    /// Stop every task. Late responses are dropped from here on.
    pub fn unmount(&mut self) {
        if !self.inner.mounted.swap(false, Ordering::AcqRel) {
            return;
        }
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        self.mode_tasks.clear();
        self.tasks.clear();
        tracing::debug!(symbol = %self.inner.symbol, "Chart widget unmounted");
    }

    /// Switch to a range (or back to live) and load it.
    pub fn set_mode(&mut self, mode: ChartMode) {
        {
            let mut state = self.inner.state.lock();
            if state.mode == mode {
                return;
            }
            state.mode = mode;
            state.shown_range = None;
            if mode == ChartMode::Live
                && let Some(snapshot) = state.latest.clone()
            {
                state.show_live(&self.inner.symbol, &snapshot);
            }
        }
        self.inner.generation.fetch_add(1, Ordering::AcqRel);
        self.start_mode_tasks();
    }

    /// Manual refresh: shows `Loading` and bypasses the history cache.
    pub fn refresh(&mut self) {
        let Some(cancel) = &self.cancel else {
            return;
        };
        let inner = Arc::clone(&self.inner);
        if !matches!(inner.state.lock().mode, ChartMode::Range(_)) {
            return;
        }
        inner.state.lock().status = ChartStatus::Loading;
        self.mode_tasks.push(ScheduledTask::spawn(
            cancel.child_token(),
            inner.refresh_current(true),
        ));
    }

    fn start_mode_tasks(&mut self) {
        self.mode_tasks.clear();
        let Some(cancel) = &self.cancel else {
            return;
        };
        let ChartMode::Range(range) = self.mode() else {
            return;
        };
        let inner = &self.inner;
        self.mode_tasks.push(ScheduledTask::spawn(
            cancel.child_token(),
            Arc::clone(inner).load_history(range, false),
        ));
        let refresher = Arc::clone(inner);
        self.mode_tasks.push(ScheduledTask::every(
            cancel.child_token(),
            inner.settings.history_refresh,
            move || Arc::clone(&refresher).refresh_current(false),
        ));
    }

    /// Paint the next frame if anything changed. Returns `None` when idle
    /// or unmounted.
    pub fn draw_frame(&self) -> Option<RenderOutcome> {
        self.inner.draw_frame()
    }

    /// Sample under `pointer_x` in the last painted frame.
    pub fn hover(&self, pointer_x: f64) -> Option<HoverSample> {
        self.inner.renderer.on_hover(pointer_x)
    }

    /// Pointer left the chart.
    pub fn hover_leave(&self) {
        self.inner.renderer.on_hover_leave();
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> ChartStatus {
        self.inner.state.lock().status
    }

    /// Current mode.
    #[must_use]
    pub fn mode(&self) -> ChartMode {
        self.inner.state.lock().mode
    }

    /// Whether the widget is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.inner.mounted.load(Ordering::Acquire)
    }

    /// Symbol shown.
    #[must_use]
    pub fn symbol(&self) -> &str {
        &self.inner.symbol
    }

    /// Latest pushed snapshot for the symbol.
    #[must_use]
    pub fn latest_snapshot(&self) -> Option<CoinSnapshot> {
        self.inner.state.lock().latest.clone()
    }

    /// Values that would be drawn now.
    #[must_use]
    pub fn frame(&self) -> FrameValues {
        self.inner.state.lock().animator.current(now())
    }

    /// The renderer, e.g. to export the surface.
    #[must_use]
    pub fn renderer(&self) -> &ChartRenderer<S> {
        &self.inner.renderer
    }
}

impl<S> Drop for CoinChartWidget<S> {
    fn drop(&mut self) {
        self.inner.mounted.store(false, Ordering::Release);
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
    }
}

// =============================================================================
// Task bodies
// =============================================================================

impl WidgetState {
    fn show_live(&mut self, symbol: &str, snapshot: &CoinSnapshot) {
        let series = self.window.series_or_synthetic(snapshot);
        self.style = ChartStyle::for_change(snapshot.price_change_percent).without_grid();
        self.animator
            .set_series(SeriesKey::new(symbol, LIVE_KEY), series.into_values(), now());
        self.status = ChartStatus::Ready;
        self.dirty = true;
    }
}

impl<S: Surface + 'static> WidgetInner<S> {
    fn is_current(&self, generation: u64) -> bool {
        self.mounted.load(Ordering::Acquire) && self.generation.load(Ordering::Acquire) == generation
    }

    fn apply_tick(&self, snapshot: &CoinSnapshot) {
        if snapshot.symbol != self.symbol {
            return;
        }
        let mut state = self.state.lock();
        state.window.push(snapshot.last_price);
        state.latest = Some(snapshot.clone());
        if state.mode == ChartMode::Live {
            state.show_live(&self.symbol, snapshot);
        }
    }

    async fn listen(self: Arc<Self>, mut updates: broadcast::Receiver<CoinSnapshot>) {
        loop {
            match updates.recv().await {
                Ok(snapshot) => self.apply_tick(&snapshot),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(symbol = %self.symbol, skipped, "Tick listener lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    }

    async fn refresh_current(self: Arc<Self>, force_refresh: bool) {
        let mode = self.state.lock().mode;
        if let ChartMode::Range(range) = mode {
            self.load_history(range, force_refresh).await;
        }
    }

    async fn load_history(self: Arc<Self>, range: TimeRange, force_refresh: bool) {
        let generation = self.generation.load(Ordering::Acquire);
        let result = self
            .feed
            .get_historical_series(&self.symbol, range, force_refresh)
            .await;

        if !self.is_current(generation) {
            tracing::debug!(symbol = %self.symbol, range = range.as_str(), "Late history response dropped");
            return;
        }

        let mut state = self.state.lock();
        if state.mode != ChartMode::Range(range) {
            return;
        }
        if result.success {
            let values = result.series.into_values();
            let change = match (values.first(), values.last()) {
                (Some(first), Some(last)) if *first > 0.0 => (last - first) / first * 100.0,
                _ => 0.0,
            };
            state.style = ChartStyle::for_change(change);
            state
                .animator
                .set_series(SeriesKey::new(&self.symbol, range.as_str()), values, now());
            state.status = ChartStatus::Ready;
            state.shown_range = Some(range);
        } else if force_refresh || state.shown_range != Some(range) {
            state.animator.reset();
            state.status = ChartStatus::NoData;
            state.shown_range = None;
        } else {
            tracing::warn!(
                symbol = %self.symbol,
                range = range.as_str(),
                "History refresh failed, keeping last series"
            );
            return;
        }
        state.dirty = true;
    }

    fn draw_frame(&self) -> Option<RenderOutcome> {
        if !self.mounted.load(Ordering::Acquire) {
            return None;
        }
        let (frame, style) = {
            let mut state = self.state.lock();
            if !state.dirty && !state.animator.is_animating() {
                return None;
            }
            state.dirty = false;
            (state.animator.tick(now()), state.style.clone())
        };
        Some(self.renderer.render_frame(&frame, self.viewport, &style))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{MarketDataSource, SourceError};
    use crate::application::services::{FeedSettings, MarketDataFeed};
    use crate::domain::live_buffer::SYNTHETIC_POINTS;
    use crate::domain::market::{ChartSeries, SupportedRange};
    use crate::domain::rate_limit::RateLimitRegistry;
    use crate::infrastructure::render::PixelBuffer;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    struct SlowHistory {
        points: AtomicUsize,
        delay: Duration,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MarketDataSource for SlowHistory {
        fn name(&self) -> &str {
            "slow"
        }

        async fn fetch_snapshots(&self, _symbols: &[String]) -> Result<Vec<CoinSnapshot>, SourceError> {
            Ok(Vec::new())
        }

        async fn fetch_history(&self, _symbol: &str, _range: SupportedRange) -> Result<ChartSeries, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let points = self.points.load(Ordering::SeqCst);
            if points == 0 {
                return Err(SourceError::Status { status: 503 });
            }
            Ok((0..points).map(|i| 100.0 + i as f64).collect())
        }
    }

    fn source(points: usize, delay: Duration) -> Arc<SlowHistory> {
        Arc::new(SlowHistory {
            points: AtomicUsize::new(points),
            delay,
            calls: AtomicUsize::new(0),
        })
    }

    fn widget(source: Arc<SlowHistory>, mode: ChartMode) -> CoinChartWidget<PixelBuffer> {
        let feed = Arc::new(MarketDataFeed::new(
            vec![source],
            Arc::new(RateLimitRegistry::new()),
            FeedSettings::default(),
        ));
        CoinChartWidget::new(
            "btcusdt",
            mode,
            feed,
            ChartRenderer::new(PixelBuffer::default()),
            Viewport::new(120.0, 40.0).unwrap(),
            WidgetSettings::default(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn live_mode_switches_from_synthetic_to_window() {
        let (tx, rx) = broadcast::channel(128);
        let mut widget = widget(source(0, Duration::ZERO), ChartMode::Live);
        widget.mount(rx);
        assert_eq!(widget.status(), ChartStatus::Loading);

        tx.send(CoinSnapshot::new("BTCUSDT", 65_000.0, 2.0, 0.0, 0.0, 0.0)).unwrap();
        tx.send(CoinSnapshot::new("ETHUSDT", 3_000.0, 1.0, 0.0, 0.0, 0.0)).unwrap();
        settle().await;
        assert_eq!(widget.status(), ChartStatus::Ready);
        assert_eq!(widget.frame().values.len(), SYNTHETIC_POINTS);

        for i in 1..12 {
            tx.send(CoinSnapshot::new("BTCUSDT", 65_000.0 + f64::from(i), 2.0, 0.0, 0.0, 0.0))
                .unwrap();
        }
        settle().await;
        let frame = widget.frame();
        assert_eq!(frame.values.len(), 12);
        assert!((frame.values[11] - 65_011.0).abs() < 1e-9);
        assert_eq!(widget.latest_snapshot().unwrap().last_price, 65_011.0);
    }

    #[tokio::test(start_paused = true)]
    async fn range_mode_loads_history() {
        let (_tx, rx) = broadcast::channel(16);
        let mut widget = widget(source(12, Duration::ZERO), ChartMode::Range(TimeRange::OneDay));
        widget.mount(rx);
        // Long enough for the reveal to show a few points.
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(widget.status(), ChartStatus::Ready);
        assert_eq!(widget.frame().values.len(), 12);
        assert!(widget.renderer().allocations() >= 1);
        widget.hover(60.0).unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn failed_history_shows_no_data() {
        let (_tx, rx) = broadcast::channel(16);
        let mut widget = widget(source(0, Duration::ZERO), ChartMode::Range(TimeRange::OneWeek));
        widget.mount(rx);
        settle().await;

        assert_eq!(widget.status(), ChartStatus::NoData);
        assert!(widget.frame().values.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn late_response_after_unmount_is_ignored() {
        let slow = source(12, Duration::from_secs(1));
        let (_tx, rx) = broadcast::channel(16);
        let mut widget = widget(Arc::clone(&slow), ChartMode::Range(TimeRange::OneDay));
        widget.mount(rx);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(slow.calls.load(Ordering::SeqCst), 1);

        widget.unmount();
        assert!(!widget.is_mounted());
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(widget.status(), ChartStatus::Loading);
        assert!(widget.frame().values.is_empty());
        assert_eq!(widget.draw_frame(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn manual_refresh_bypasses_cache() {
        let src = source(12, Duration::from_millis(200));
        let (_tx, rx) = broadcast::channel(16);
        let mut widget = widget(Arc::clone(&src), ChartMode::Range(TimeRange::OneDay));
        widget.mount(rx);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(widget.status(), ChartStatus::Ready);

        widget.refresh();
        assert_eq!(widget.status(), ChartStatus::Loading);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(widget.status(), ChartStatus::Ready);
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn switching_range_drops_stale_response() {
        let slow = source(12, Duration::from_secs(1));
        let (_tx, rx) = broadcast::channel(16);
        let mut widget = widget(Arc::clone(&slow), ChartMode::Range(TimeRange::OneDay));
        widget.mount(rx);
        tokio::time::sleep(Duration::from_millis(100)).await;

        widget.set_mode(ChartMode::Live);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(widget.mode(), ChartMode::Live);
        assert!(widget.frame().values.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_background_refresh_keeps_last_series() {
        let src = source(12, Duration::ZERO);
        let (_tx, rx) = broadcast::channel(16);
        let mut widget = widget(Arc::clone(&src), ChartMode::Range(TimeRange::OneDay));
        widget.mount(rx);
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(widget.status(), ChartStatus::Ready);
        assert_eq!(widget.frame().values.len(), 12);

        // Next refresh fires after the history cache has expired.
        src.points.store(0, Ordering::SeqCst);
        tokio::time::sleep(WidgetSettings::default().history_refresh + Duration::from_secs(1)).await;
        assert_eq!(src.calls.load(Ordering::SeqCst), 2);
        assert_eq!(widget.status(), ChartStatus::Ready);
        assert_eq!(widget.frame().values.len(), 12);

        // A manual refresh that fails does clear the chart.
        widget.refresh();
        settle().await;
        assert_eq!(widget.status(), ChartStatus::NoData);
        assert!(widget.frame().values.is_empty());
    }
}
