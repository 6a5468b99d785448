//! Chart colours.

use serde::{Deserialize, Serialize};

/// Straight (non-premultiplied) RGBA colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rgba {
    /// Red.
    pub r: u8,
    /// Green.
    pub g: u8,
    /// Blue.
    pub b: u8,
    /// Alpha, 255 is opaque.
    pub a: u8,
}

impl Rgba {
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);

    /// Create a colour.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Opaque colour.
    #[must_use]
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    #[must_use]
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if !matches!(digits.len(), 6 | 8) {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        let a = if digits.len() == 8 { channel(6)? } else { 255 };
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?, a))
    }

    /// `#RRGGBB`, alpha dropped.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }

    /// Same colour with a new alpha.
    #[must_use]
    pub const fn with_alpha(self, a: u8) -> Self {
        Self::new(self.r, self.g, self.b, a)
    }

    /// Linear blend toward `other`; `t` is clamped to `[0, 1]`.
    #[must_use]
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = t.clamp(0.0, 1.0);
        let mix = |a: u8, b: u8| (f64::from(b) - f64::from(a)).mul_add(t, f64::from(a)).round() as u8;
        Self::new(
            mix(self.r, other.r),
            mix(self.g, other.g),
            mix(self.b, other.b),
            mix(self.a, other.a),
        )
    }
}

/// Stroke and fill settings for one chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartStyle {
    /// Line colour.
    pub line: Rgba,
    /// Line width in logical pixels.
    pub line_width: f64,
    /// Gradient colour at the line.
    pub fill_top: Rgba,
    /// Gradient colour at the bottom edge.
    pub fill_bottom: Rgba,
    /// Grid line colour.
    pub grid: Rgba,
    /// Number of horizontal grid lines; 0 disables the grid.
    pub grid_lines: usize,
    /// Line segments per bezier when flattening.
    pub smoothing_steps: usize,
    /// Background colour.
    pub background: Rgba,
}

const UP: Rgba = Rgba::rgb(0x16, 0xC7, 0x84);
const DOWN: Rgba = Rgba::rgb(0xEA, 0x39, 0x43);

impl ChartStyle {
    /// Style with the given line colour and defaults for everything else.
    #[must_use]
    pub const fn with_line(line: Rgba) -> Self {
        Self {
            line,
            line_width: 1.5,
            fill_top: line.with_alpha(0x55),
            fill_bottom: line.with_alpha(0),
            grid: Rgba::new(0x80, 0x80, 0x80, 0x26),
            grid_lines: 4,
            smoothing_steps: 8,
            background: Rgba::TRANSPARENT,
        }
    }

    /// Green for a non-negative change, red otherwise.
    #[must_use]
    pub fn for_change(change_percent: f64) -> Self {
        if change_percent >= 0.0 {
            Self::with_line(UP)
        } else {
            Self::with_line(DOWN)
        }
    }

    /// Same style without grid lines, for compact sparklines.
    #[must_use]
    pub const fn without_grid(mut self) -> Self {
        self.grid_lines = 0;
        self
    }
}

impl Default for ChartStyle {
    fn default() -> Self {
        Self::with_line(UP)
    }
}
