//! RGBA pixel buffer with anti-aliased strokes and gradient fills.

use std::io::Write;
use std::path::Path;

use crate::application::ports::Surface;
use crate::domain::chart::{Point, Rgba};

/// Row-major straight-alpha RGBA buffer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<Rgba>,
}

impl PixelBuffer {
    /// Create a transparent buffer.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![Rgba::TRANSPARENT; width as usize * height as usize],
        }
    }

    /// Pixel at `(x, y)`, `None` when out of bounds.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get(self.index(x, y)).copied()
    }

    /// Raw pixels, row-major.
    #[must_use]
    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    /// Binary PPM (P6) of the buffer composited over `background`.
    #[must_use]
    pub fn to_ppm(&self, background: Rgba) -> Vec<u8> {
        let header = format!("P6\n{} {}\n255\n", self.width, self.height);
        let mut out = Vec::with_capacity(header.len() + self.pixels.len() * 3);
        out.extend_from_slice(header.as_bytes());
        for &px in &self.pixels {
            let c = over(background.with_alpha(255), px, 1.0);
            out.extend_from_slice(&[c.r, c.g, c.b]);
        }
        out
    }

    /// Write `to_ppm` to `path`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the file cannot be written.
    pub fn write_ppm(&self, path: &Path, background: Rgba) -> std::io::Result<()> {
        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.to_ppm(background))?;
        file.flush()
    }

    const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    fn blend(&mut self, x: i64, y: i64, colour: Rgba, coverage: f64) {
        if coverage <= 0.0 || x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return;
        }
        let idx = self.index(x as u32, y as u32);
        if let Some(dst) = self.pixels.get_mut(idx) {
            *dst = over(*dst, colour, coverage.min(1.0));
        }
    }

    /// Blend `colour` through a per-pixel coverage mask, so overlapping
    /// segments of one stroke do not darken the joints.
    fn blend_mask(&mut self, mask: &[f64], colour: Rgba) {
        let width = i64::from(self.width);
        for (i, &coverage) in mask.iter().enumerate() {
            if coverage > 0.0 {
                let i = i as i64;
                self.blend(i % width, i / width, colour, coverage);
            }
        }
    }
}

/// Source-over compositing of `src` at `coverage` onto `dst`.
fn over(dst: Rgba, src: Rgba, coverage: f64) -> Rgba {
    let sa = f64::from(src.a) / 255.0 * coverage;
    let da = f64::from(dst.a) / 255.0;
    let out_a = da.mul_add(1.0 - sa, sa);
    if out_a <= 0.0 {
        return Rgba::TRANSPARENT;
    }
    let channel = |s: u8, d: u8| {
        let v = f64::from(s).mul_add(sa, f64::from(d) * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    Rgba::new(
        channel(src.r, dst.r),
        channel(src.g, dst.g),
        channel(src.b, dst.b),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    )
}

/// Distance from `p` to segment `a`-`b`.
fn segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx.mul_add(dx, dy * dy);
    let t = if len_sq > 0.0 {
        ((p.x - a.x).mul_add(dx, (p.y - a.y) * dy) / len_sq).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let (cx, cy) = (t.mul_add(dx, a.x), t.mul_add(dy, a.y));
    (p.x - cx).hypot(p.y - cy)
}

impl Surface for PixelBuffer {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn resize(&mut self, width: u32, height: u32) {
        *self = Self::new(width, height);
    }

    fn clear(&mut self, colour: Rgba) {
        self.pixels.fill(colour);
    }

    fn draw_hline(&mut self, y: f64, colour: Rgba, thickness: f64) {
        let half = thickness.max(0.0) / 2.0;
        let (top, bottom) = (y - half, y + half);
        let first = top.floor() as i64;
        let last = bottom.ceil() as i64;
        for row in first..last {
            let row_top = row as f64;
            let coverage = bottom.min(row_top + 1.0) - top.max(row_top);
            for x in 0..i64::from(self.width) {
                self.blend(x, row, colour, coverage);
            }
        }
    }

    fn stroke_polyline(&mut self, points: &[Point], colour: Rgba, thickness: f64) {
        if points.is_empty() || self.width == 0 || self.height == 0 {
            return;
        }
        let half = thickness.max(1.0) / 2.0;
        let width = self.width as usize;
        let mut mask = vec![0.0_f64; self.pixels.len()];

        let segments: Vec<(Point, Point)> = if points.len() == 1 {
            vec![(points[0], points[0])]
        } else {
            points.windows(2).map(|w| (w[0], w[1])).collect()
        };

        for (a, b) in segments {
            let min_x = (a.x.min(b.x) - half - 1.0).floor().max(0.0) as usize;
            let max_x = ((a.x.max(b.x) + half + 1.0).ceil().max(0.0) as usize).min(width);
            let min_y = (a.y.min(b.y) - half - 1.0).floor().max(0.0) as usize;
            let max_y = ((a.y.max(b.y) + half + 1.0).ceil().max(0.0) as usize).min(self.height as usize);
            for py in min_y..max_y {
                for px in min_x..max_x {
                    let centre = Point::new(px as f64 + 0.5, py as f64 + 0.5);
                    let coverage = (half + 0.5 - segment_distance(centre, a, b)).clamp(0.0, 1.0);
                    let cell = &mut mask[py * width + px];
                    *cell = cell.max(coverage);
                }
            }
        }
        self.blend_mask(&mask, colour);
    }

    fn fill_polygon_gradient(&mut self, polygon: &[Point], top: Rgba, bottom: Rgba, top_y: f64, bottom_y: f64) {
        if polygon.len() < 3 {
            return;
        }
        let span = bottom_y - top_y;
        let min_y = polygon.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_y = polygon.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        let first_row = min_y.floor().max(0.0) as i64;
        let last_row = (max_y.ceil() as i64).min(i64::from(self.height));

        let mut crossings = Vec::with_capacity(polygon.len());
        for row in first_row..last_row {
            let yc = row as f64 + 0.5;
            crossings.clear();
            for (i, &a) in polygon.iter().enumerate() {
                let b = polygon[(i + 1) % polygon.len()];
                if (a.y <= yc && b.y > yc) || (b.y <= yc && a.y > yc) {
                    let t = (yc - a.y) / (b.y - a.y);
                    crossings.push(t.mul_add(b.x - a.x, a.x));
                }
            }
            crossings.sort_by(f64::total_cmp);

            let t = if span.abs() > f64::EPSILON {
                ((yc - top_y) / span).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let colour = top.lerp(bottom, t);

            for pair in crossings.chunks_exact(2) {
                let start = (pair[0] - 0.5).ceil().max(0.0) as i64;
                let end = (pair[1] - 0.5).floor() as i64;
                for x in start..=end {
                    self.blend(x, row, colour, 1.0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: Rgba = Rgba::rgb(255, 0, 0);
    const WHITE: Rgba = Rgba::rgb(255, 255, 255);

    #[test]
    fn default_is_empty_and_resize_allocates() {
        let mut buf = PixelBuffer::default();
        assert_eq!((buf.width(), buf.height()), (0, 0));
        buf.resize(4, 3);
        assert_eq!(buf.pixels().len(), 12);
        assert_eq!(buf.pixel(3, 2), Some(Rgba::TRANSPARENT));
        assert_eq!(buf.pixel(4, 0), None);
    }

    #[test]
    fn hline_covers_only_its_rows() {
        let mut buf = PixelBuffer::new(5, 5);
        buf.clear(WHITE);
        buf.draw_hline(2.5, RED, 1.0);
        assert_eq!(buf.pixel(0, 2), Some(RED));
        assert_eq!(buf.pixel(4, 2), Some(RED));
        assert_eq!(buf.pixel(0, 1), Some(WHITE));
        assert_eq!(buf.pixel(0, 3), Some(WHITE));
    }

    #[test]
    fn stroke_hits_pixels_on_the_line() {
        let mut buf = PixelBuffer::new(10, 10);
        buf.stroke_polyline(&[Point::new(0.0, 5.0), Point::new(10.0, 5.0)], RED, 2.0);
        assert_eq!(buf.pixel(5, 4).map(|p| p.a), Some(255));
        assert_eq!(buf.pixel(5, 0), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn gradient_interpolates_top_to_bottom() {
        let mut buf = PixelBuffer::new(4, 10);
        let square = [
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(4.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        buf.fill_polygon_gradient(&square, Rgba::rgb(0, 0, 0), WHITE, 0.0, 10.0);
        let top = buf.pixel(1, 0).unwrap();
        let bottom = buf.pixel(1, 9).unwrap();
        assert!(top.r < 30);
        assert!(bottom.r > 225);
        assert_eq!(buf.pixel(3, 5).map(|p| p.a), Some(255));
    }

    #[test]
    fn ppm_has_header_and_rgb_payload() {
        let mut buf = PixelBuffer::new(2, 1);
        buf.clear(RED);
        let ppm = buf.to_ppm(WHITE);
        let header = b"P6\n2 1\n255\n";
        assert_eq!(&ppm[..header.len()], header);
        assert_eq!(&ppm[header.len()..], &[255, 0, 0, 255, 0, 0]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chart.ppm");
        buf.write_ppm(&path, WHITE).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), ppm);
    }

    #[test]
    fn translucent_pixels_composite_over_background() {
        let mut buf = PixelBuffer::new(1, 1);
        buf.clear(Rgba::TRANSPARENT);
        let ppm = buf.to_ppm(WHITE);
        assert_eq!(&ppm[ppm.len() - 3..], &[255, 255, 255]);
    }
}
