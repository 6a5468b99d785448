//! Pointer → nearest sample.
//!
//! The nearest projected X wins, except that the previously highlighted
//! sample is kept while it is no more than `HOVER_HYSTERESIS_PX` farther
//! from the pointer than the nearest one. This stops the highlight from
//! flickering between neighbours on mouse jitter.

use super::projection::Point;

/// Extra distance the current highlight may lose by before it moves.
pub const HOVER_HYSTERESIS_PX: f64 = 5.0;

/// The sample under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HoverSample {
    /// Index into the series.
    pub index: usize,
    /// Sample value.
    pub value: f64,
    /// Projected X.
    pub x: f64,
    /// Projected Y.
    pub y: f64,
}

/// Stateful hover lookup with hysteresis.
#[derive(Debug, Clone)]
pub struct HoverResolver {
    hysteresis: f64,
    current: Option<usize>,
}

impl Default for HoverResolver {
    fn default() -> Self {
        Self::new(HOVER_HYSTERESIS_PX)
    }
}

impl HoverResolver {
    /// Create a resolver with the given hysteresis in pixels.
    #[must_use]
    pub const fn new(hysteresis: f64) -> Self {
        Self {
            hysteresis,
            current: None,
        }
    }

    /// Resolve `pointer_x` against projected `points` and their `values`.
    ///
    /// Returns `None` for an empty projection, a non-finite pointer, or when
    /// `points` and `values` disagree in length.
    pub fn resolve(&mut self, points: &[Point], values: &[f64], pointer_x: f64) -> Option<HoverSample> {
        if points.is_empty() || points.len() != values.len() || !pointer_x.is_finite() {
            self.current = None;
            return None;
        }

        let nearest = nearest_index(points, pointer_x)?;
        let index = match self.current {
            Some(previous) if previous < points.len() && previous != nearest => {
                let keep = (points[previous].x - pointer_x).abs();
                let best = (points[nearest].x - pointer_x).abs();
                if keep <= best + self.hysteresis {
                    previous
                } else {
                    nearest
                }
            }
            _ => nearest,
        };

        self.current = Some(index);
        let point = points[index];
        Some(HoverSample {
            index,
            value: values[index],
            x: point.x,
            y: point.y,
        })
    }

    /// Index currently highlighted.
    #[must_use]
    pub const fn current(&self) -> Option<usize> {
        self.current
    }

    /// Pointer left the chart.
    pub fn clear(&mut self) {
        self.current = None;
    }
}

/// Index of the point whose X is closest to `x`. Ties go to the lower index.
#[must_use]
pub fn nearest_index(points: &[Point], x: f64) -> Option<usize> {
    points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (a.x - x).abs().total_cmp(&(b.x - x).abs()))
        .map(|(i, _)| i)
}
