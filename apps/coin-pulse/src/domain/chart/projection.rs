//! Series projection.
//!
//! Sample `i` of `n` lands at `x = i * W / (n - 1)`. Values are scaled from
//! `[min, max]` into `[0.05H, 0.95H]` and inverted so higher prices sit
//! higher on screen. A flat series uses a range of 1.

use super::ChartError;
use crate::domain::market::min_max;

/// Fraction of the height left empty above and below the line.
pub const PADDING_RATIO: f64 = 0.05;

/// Logical drawing area in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    width: f64,
    height: f64,
}

impl Viewport {
    /// Create a viewport.
    ///
    /// # Errors
    ///
    /// Returns `ChartError::InvalidViewport` unless both dimensions are
    /// positive and finite.
    pub fn new(width: f64, height: f64) -> Result<Self, ChartError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if !valid(width) || !valid(height) {
            return Err(ChartError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    /// Width in logical pixels.
    #[must_use]
    pub const fn width(&self) -> f64 {
        self.width
    }

    /// Height in logical pixels.
    #[must_use]
    pub const fn height(&self) -> f64 {
        self.height
    }
}

/// A projected sample in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// Horizontal position.
    pub x: f64,
    /// Vertical position, 0 at the top.
    pub y: f64,
}

impl Point {
    /// Create a point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Linear value ↔ Y mapping for one series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValueScale {
    min: f64,
    range: f64,
    top: f64,
    span: f64,
}

impl ValueScale {
    /// Scale for `values` inside `viewport`. `None` for an empty slice.
    #[must_use]
    pub fn fit(values: &[f64], viewport: Viewport) -> Option<Self> {
        let (min, max) = min_max(values)?;
        let range = if (max - min).abs() > f64::EPSILON {
            max - min
        } else {
            1.0
        };
        let top = viewport.height * PADDING_RATIO;
        let span = viewport.height * PADDING_RATIO.mul_add(-2.0, 1.0);
        Some(Self {
            min,
            range,
            top,
            span,
        })
    }

    /// Y coordinate for a value.
    #[must_use]
    pub fn y(&self, value: f64) -> f64 {
        let normalized = ((value - self.min) / self.range).clamp(0.0, 1.0);
        normalized.mul_add(-self.span, self.top + self.span)
    }
}

/// Project every sample of `values` into `viewport`.
///
/// Returns no points for fewer than two samples.
#[must_use]
pub fn project(values: &[f64], viewport: Viewport) -> Vec<Point> {
    if values.len() < 2 {
        return Vec::new();
    }
    let Some(scale) = ValueScale::fit(values, viewport) else {
        return Vec::new();
    };
    let step = viewport.width / (values.len() - 1) as f64;
    values
        .iter()
        .enumerate()
        .map(|(i, v)| Point::new(i as f64 * step, scale.y(*v)))
        .collect()
}

/// Number of leading points drawn at reveal `progress`.
#[must_use]
pub fn visible_count(total: usize, progress: f64) -> usize {
    let progress = if progress.is_finite() {
        progress.clamp(0.0, 1.0)
    } else {
        1.0
    };
    ((total as f64 * progress).ceil() as usize).min(total)
}

/// Cubic bezier between two projected points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CubicSegment {
    /// Start point.
    pub from: Point,
    /// First control point.
    pub c1: Point,
    /// Second control point.
    pub c2: Point,
    /// End point.
    pub to: Point,
}

impl CubicSegment {
    /// Smooth segment with controls at 1/3 and 2/3 of the horizontal span.
    #[must_use]
    pub fn between(from: Point, to: Point) -> Self {
        let dx = to.x - from.x;
        Self {
            from,
            c1: Point::new(dx.mul_add(1.0 / 3.0, from.x), from.y),
            c2: Point::new(dx.mul_add(2.0 / 3.0, from.x), to.y),
            to,
        }
    }

    /// Point at parameter `t` in `[0, 1]`.
    #[must_use]
    pub fn at(&self, t: f64) -> Point {
        let u = 1.0 - t;
        let a = u * u * u;
        let b = 3.0 * u * u * t;
        let c = 3.0 * u * t * t;
        let d = t * t * t;
        Point::new(
            a * self.from.x + b * self.c1.x + c * self.c2.x + d * self.to.x,
            a * self.from.y + b * self.c1.y + c * self.c2.y + d * self.to.y,
        )
    }

    /// Flatten into `steps` line segments, excluding the start point.
    #[must_use]
    pub fn flatten(&self, steps: usize) -> Vec<Point> {
        let steps = steps.max(1);
        (1..=steps)
            .map(|i| self.at(i as f64 / steps as f64))
            .collect()
    }
}

/// Smooth segments joining consecutive points.
#[must_use]
pub fn smooth_segments(points: &[Point]) -> Vec<CubicSegment> {
    points
        .windows(2)
        .map(|pair| CubicSegment::between(pair[0], pair[1]))
        .collect()
}
