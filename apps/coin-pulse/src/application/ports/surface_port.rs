//! Surface Port (Driven Port)
//!
//! A raster target the chart renderer paints into. Coordinates passed to a
//! surface are in backing-store pixels; the renderer applies the scale
//! factor before calling.

use crate::domain::chart::{Point, Rgba};

/// Pixel target for chart frames.
pub trait Surface: Send {
    /// Backing-store width in pixels.
    fn width(&self) -> u32;

    /// Backing-store height in pixels.
    fn height(&self) -> u32;

    /// Reallocate the backing store. Contents are discarded.
    fn resize(&mut self, width: u32, height: u32);

    /// Fill every pixel with `colour`.
    fn clear(&mut self, colour: Rgba);

    /// Horizontal line across the full width.
    fn draw_hline(&mut self, y: f64, colour: Rgba, thickness: f64);

    /// Stroke an open polyline.
    fn stroke_polyline(&mut self, points: &[Point], colour: Rgba, thickness: f64);

    /// Fill a polygon with a vertical gradient from `top` at `top_y` to
    /// `bottom` at `bottom_y`.
    fn fill_polygon_gradient(
        &mut self,
        polygon: &[Point],
        top: Rgba,
        bottom: Rgba,
        top_y: f64,
        bottom_y: f64,
    );
}
