//! Chart Renderer
//!
//! Paints a chart scene onto a `Surface` and answers hover queries against
//! the last painted frame.
//!
//! # Redraw discipline
//!
//! - A draw that starts while another is in progress is discarded, not
//!   queued. The guard is an `AtomicBool` released on drop.
//! - The surface is kept at twice the logical resolution and reallocated
//!   only when the logical size changes.
//! - Hover coordinates are logical pixels; the hover callback is debounced
//!   by `HOVER_DEBOUNCE`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::Mutex;

use super::scheduler::{Debouncer, HOVER_DEBOUNCE};
use crate::application::ports::Surface;
use crate::domain::chart::{
    ChartScene, ChartStyle, FrameValues, HoverResolver, HoverSample, Point, SeriesKey, Viewport,
    build_scene,
};
use crate::infrastructure::metrics;

/// Backing-store pixels per logical pixel.
pub const BACKING_SCALE: f64 = 2.0;

/// Whether a render call painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The frame was painted.
    Drawn,
    /// Another draw was in progress; this one was dropped.
    Skipped,
}

struct DrawGuard<'a>(&'a AtomicBool);

impl<'a> DrawGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for DrawGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
struct HoverFrame {
    key: Option<SeriesKey>,
    points: Vec<Point>,
    values: Vec<f64>,
    resolver: HoverResolver,
}

/// Paints frames onto a surface it owns.
pub struct ChartRenderer<S> {
    surface: Mutex<S>,
    drawing: AtomicBool,
    allocations: AtomicUsize,
    hover: Mutex<HoverFrame>,
    hover_callback: Option<Debouncer<Option<HoverSample>>>,
}

impl<S> std::fmt::Debug for ChartRenderer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChartRenderer")
            .field("drawing", &self.drawing.load(Ordering::Relaxed))
            .field("allocations", &self.allocations.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl<S: Surface> ChartRenderer<S> {
    /// Create a renderer painting onto `surface`.
    pub fn new(surface: S) -> Self {
        Self {
            surface: Mutex::new(surface),
            drawing: AtomicBool::new(false),
            allocations: AtomicUsize::new(0),
            hover: Mutex::new(HoverFrame::default()),
            hover_callback: None,
        }
    }

    /// Deliver hover results to `callback`, debounced.
    ///
    /// Hover queries must then run inside a Tokio runtime.
    #[must_use]
    pub fn with_hover_callback(
        mut self,
        callback: impl Fn(Option<HoverSample>) + Send + Sync + 'static,
    ) -> Self {
        self.hover_callback = Some(Debouncer::new(HOVER_DEBOUNCE, callback));
        self
    }

    /// Paint `series` fully revealed.
    pub fn render(&self, series: &[f64], viewport: Viewport, style: &ChartStyle) -> RenderOutcome {
        self.paint(series, 1.0, None, viewport, style)
    }

    /// Paint one animation frame.
    pub fn render_frame(
        &self,
        frame: &FrameValues,
        viewport: Viewport,
        style: &ChartStyle,
    ) -> RenderOutcome {
        self.paint(&frame.values, frame.reveal_progress, frame.key.as_ref(), viewport, style)
    }

    /// Resolve the sample under `pointer_x` (logical pixels).
    pub fn on_hover(&self, pointer_x: f64) -> Option<HoverSample> {
        let sample = {
            let mut hover = self.hover.lock();
            let HoverFrame {
                points,
                values,
                resolver,
                ..
            } = &mut *hover;
            resolver.resolve(points, values, pointer_x)
        };
        if let Some(debouncer) = &self.hover_callback {
            debouncer.call(sample);
        }
        sample
    }

    /// The pointer left the chart.
    pub fn on_hover_leave(&self) {
        self.hover.lock().resolver.clear();
        if let Some(debouncer) = &self.hover_callback {
            debouncer.call(None);
        }
    }

    /// Whether a draw is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.drawing.load(Ordering::Acquire)
    }

    /// How many times the backing store has been allocated.
    #[must_use]
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    /// Borrow the surface, e.g. to export pixels.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.surface.lock())
    }

    fn paint(
        &self,
        values: &[f64],
        reveal_progress: f64,
        key: Option<&SeriesKey>,
        viewport: Viewport,
        style: &ChartStyle,
    ) -> RenderOutcome {
        let Some(_guard) = DrawGuard::acquire(&self.drawing) else {
            tracing::trace!("Draw already in progress, frame dropped");
            metrics::record_frame_skipped();
            return RenderOutcome::Skipped;
        };
        let started = Instant::now();

        let scene = build_scene(values, viewport, style, reveal_progress);
        {
            let mut surface = self.surface.lock();
            self.ensure_backing_store(&mut *surface, viewport);
            paint_scene(&mut *surface, &scene, viewport, style);
        }

        let mut hover = self.hover.lock();
        // A highlight index only means something within one series.
        if hover.key.as_ref() != key || hover.points.len() != scene.points.len() {
            hover.resolver.clear();
            hover.key = key.cloned();
        }
        hover.values = values[..scene.points.len()].to_vec();
        hover.points = scene.points;

        metrics::record_frame_rendered(started.elapsed());
        RenderOutcome::Drawn
    }

    fn ensure_backing_store(&self, surface: &mut S, viewport: Viewport) {
        let width = (viewport.width() * BACKING_SCALE).ceil() as u32;
        let height = (viewport.height() * BACKING_SCALE).ceil() as u32;
        if surface.width() != width || surface.height() != height {
            tracing::debug!(width, height, "Reallocating chart backing store");
            surface.resize(width, height);
            self.allocations.fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn paint_scene<S: Surface>(surface: &mut S, scene: &ChartScene, viewport: Viewport, style: &ChartStyle) {
    surface.clear(style.background);

    for &y in &scene.grid {
        surface.draw_hline(y * BACKING_SCALE, style.grid, BACKING_SCALE / 2.0);
    }

    if !scene.has_line() {
        return;
    }

    let scale = |p: &Point| Point::new(p.x * BACKING_SCALE, p.y * BACKING_SCALE);
    let area: Vec<Point> = scene.area.iter().map(scale).collect();
    let line: Vec<Point> = scene.line.iter().map(scale).collect();
    let top_y = line.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let bottom_y = viewport.height() * BACKING_SCALE;

    surface.fill_polygon_gradient(&area, style.fill_top, style.fill_bottom, top_y, bottom_y);
    surface.stroke_polyline(&line, style.line, style.line_width * BACKING_SCALE);
}
