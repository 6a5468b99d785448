//! Frame geometry.
//!
//! A `ChartScene` is everything a surface needs to paint one frame: grid
//! rows, the flattened smooth line and the polygon under it. Building it is
//! pure; painting happens behind the `Surface` port.

use super::projection::{Point, Viewport, project, smooth_segments, visible_count};
use super::style::ChartStyle;

/// Geometry for one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartScene {
    /// Projected samples actually revealed this frame.
    pub points: Vec<Point>,
    /// Smoothed line as a polyline.
    pub line: Vec<Point>,
    /// Closed polygon between the line and the bottom edge.
    pub area: Vec<Point>,
    /// Y coordinates of horizontal grid lines.
    pub grid: Vec<f64>,
}

impl ChartScene {
    /// Whether there is a line to draw.
    #[must_use]
    pub fn has_line(&self) -> bool {
        self.line.len() >= 2
    }
}

/// Build the scene for `values` revealed up to `reveal_progress`.
///
/// Fewer than two samples, or fewer than two revealed, yields a scene with
/// only the grid.
#[must_use]
pub fn build_scene(
    values: &[f64],
    viewport: Viewport,
    style: &ChartStyle,
    reveal_progress: f64,
) -> ChartScene {
    let grid = grid_rows(viewport, style.grid_lines);
    let projected = project(values, viewport);
    let shown = visible_count(projected.len(), reveal_progress);
    if shown < 2 {
        return ChartScene {
            grid,
            ..ChartScene::default()
        };
    }

    let points = projected[..shown].to_vec();
    let mut line = Vec::with_capacity(1 + (shown - 1) * style.smoothing_steps.max(1));
    line.push(points[0]);
    for segment in smooth_segments(&points) {
        line.extend(segment.flatten(style.smoothing_steps));
    }

    let bottom = viewport.height();
    let mut area = Vec::with_capacity(line.len() + 2);
    area.extend_from_slice(&line);
    if let (Some(first), Some(last)) = (line.first(), line.last()) {
        area.push(Point::new(last.x, bottom));
        area.push(Point::new(first.x, bottom));
    }

    ChartScene {
        points,
        line,
        area,
        grid,
    }
}

fn grid_rows(viewport: Viewport, rows: usize) -> Vec<f64> {
    if rows == 0 {
        return Vec::new();
    }
    let spacing = viewport.height() / (rows + 1) as f64;
    (1..=rows).map(|i| i as f64 * spacing).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        Viewport::new(120.0, 40.0).unwrap()
    }

    #[test]
    fn degenerate_series_draws_only_grid() {
        let style = ChartStyle::default();
        let scene = build_scene(&[1.0], viewport(), &style, 1.0);
        assert!(!scene.has_line());
        assert!(scene.area.is_empty());
        assert_eq!(scene.grid.len(), style.grid_lines);
    }

    #[test]
    fn full_reveal_covers_width() {
        let style = ChartStyle::default();
        let scene = build_scene(&[1.0, 3.0, 2.0, 4.0], viewport(), &style, 1.0);
        assert_eq!(scene.points.len(), 4);
        assert_eq!(scene.line.len(), 1 + 3 * style.smoothing_steps);
        assert!((scene.line.last().unwrap().x - 120.0).abs() < 1e-9);
        // Polygon closes along the bottom edge.
        let tail = &scene.area[scene.area.len() - 2..];
        assert!(tail.iter().all(|p| (p.y - 40.0).abs() < 1e-9));
    }

    #[test]
    fn partial_reveal_draws_leading_points() {
        let style = ChartStyle::default();
        let values: Vec<f64> = (0..10).map(f64::from).collect();
        let scene = build_scene(&values, viewport(), &style, 0.35);
        assert_eq!(scene.points.len(), 4);
        assert!(scene.line.last().unwrap().x < 120.0);
    }

    #[test]
    fn grid_can_be_disabled() {
        let style = ChartStyle::default().without_grid();
        let scene = build_scene(&[1.0, 2.0], viewport(), &style, 1.0);
        assert!(scene.grid.is_empty());
        assert!(scene.has_line());
    }
}
