//! Coin Icons
//!
//! Domain rules for icon resolution: which asset an icon is for, which
//! assets never resolve, what a trustworthy payload looks like, and the
//! generated badge shown when nothing better exists.
//!
//! # Design
//!
//! The badge colour is a pure function of the asset code: a fixed table for
//! well-known assets, otherwise an HSL hue derived from a stable hash. The
//! same asset draws the same badge in every session.

use serde::{Deserialize, Serialize};

use crate::domain::chart::Rgba;
use crate::domain::market::base_asset;

// =============================================================================
// Asset Codes
// =============================================================================

/// Assets no icon source serves. Resolved straight to the badge.
pub const DENY_LIST: &[&str] = &[
    "1000SATS", "1000PEPE", "1000FLOKI", "1000BONK", "1MBABYDOGE", "BNSOL", "BTTC", "EURI", "LUNC",
    "USTC", "WBETH", "WBTC", "AEUR",
];

/// Base asset code used as the icon cache key.
#[must_use]
pub fn icon_asset(symbol: &str) -> String {
    base_asset(symbol)
}

/// Whether no source should be asked for this asset.
#[must_use]
pub fn is_denied(asset: &str) -> bool {
    DENY_LIST.iter().any(|denied| denied.eq_ignore_ascii_case(asset))
}

// =============================================================================
// Payload Validation
// =============================================================================

/// Largest payload accepted as an icon.
pub const MAX_SVG_BYTES: usize = 256 * 1024;

/// Whether `payload` looks like standalone SVG markup.
///
/// Accepts an optional XML prolog or comment before the root element.
/// Payloads with script elements are rejected.
#[must_use]
pub fn is_valid_svg(payload: &str) -> bool {
    if payload.len() > MAX_SVG_BYTES {
        return false;
    }
    let body = payload.trim_start_matches('\u{feff}').trim();
    let lower = body.to_ascii_lowercase();
    let Some(root) = lower.find("<svg") else {
        return false;
    };
    let preamble = &lower[..root];
    let preamble_ok = preamble.trim().is_empty()
        || preamble.trim_start().starts_with("<?xml")
        || preamble.trim_start().starts_with("<!--")
        || preamble.trim_start().starts_with("<!doctype");
    preamble_ok && lower.ends_with("</svg>") && !lower.contains("<script")
}

// =============================================================================
// Cache Entries
// =============================================================================

/// Icon cache value for one asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IconCacheEntry {
    /// Validated SVG markup.
    Resolved(String),
    /// Every source failed; do not ask again.
    Unresolvable,
}

// =============================================================================
// Fallback Badge
// =============================================================================

/// Brand colours for well-known assets.
const BADGE_COLOURS: &[(&str, &str)] = &[
    ("BTC", "#F7931A"),
    ("ETH", "#627EEA"),
    ("BNB", "#F3BA2F"),
    ("SOL", "#9945FF"),
    ("XRP", "#23292F"),
    ("ADA", "#0033AD"),
    ("DOGE", "#C2A633"),
    ("DOT", "#E6007A"),
    ("AVAX", "#E84142"),
    ("LINK", "#2A5ADA"),
    ("MATIC", "#8247E5"),
    ("POL", "#8247E5"),
    ("LTC", "#345D9D"),
    ("TRX", "#EF0027"),
    ("USDT", "#26A17B"),
    ("USDC", "#2775CA"),
];

/// Coloured circle with the asset's first letter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackBadge {
    /// Asset code the badge stands for.
    pub asset: String,
    /// Letter drawn in the circle.
    pub letter: char,
    /// Circle colour.
    pub colour: Rgba,
}

impl FallbackBadge {
    /// Badge for an asset code.
    #[must_use]
    pub fn for_asset(asset: &str) -> Self {
        let asset = asset.trim().to_uppercase();
        let letter = asset
            .chars()
            .find(char::is_ascii_alphabetic)
            .or_else(|| asset.chars().next())
            .unwrap_or('?');
        let colour = BADGE_COLOURS
            .iter()
            .find(|(code, _)| *code == asset)
            .and_then(|(_, hex)| Rgba::from_hex(hex))
            .unwrap_or_else(|| hashed_colour(&asset));
        Self {
            asset,
            letter,
            colour,
        }
    }

    /// Render as a 32x32 SVG.
    #[must_use]
    pub fn to_svg(&self) -> String {
        format!(
            concat!(
                r#"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32" viewBox="0 0 32 32">"#,
                r#"<circle cx="16" cy="16" r="16" fill="{fill}"/>"#,
                r#"<text x="16" y="21" text-anchor="middle" font-family="sans-serif" "#,
                r##"font-size="14" font-weight="bold" fill="#FFFFFF">{letter}</text></svg>"##
            ),
            fill = self.colour.to_hex(),
            letter = self.letter,
        )
    }
}

/// Stable colour from a 32-bit string hash.
fn hashed_colour(asset: &str) -> Rgba {
    let hash = asset
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));
    hsl_to_rgb(f64::from(hash % 360), 0.65, 0.50)
}

fn hsl_to_rgb(hue: f64, saturation: f64, lightness: f64) -> Rgba {
    let chroma = (1.0 - 2.0f64.mul_add(lightness, -1.0).abs()) * saturation;
    let sector = hue / 60.0;
    let x = chroma * (1.0 - (sector % 2.0 - 1.0).abs());
    let (r, g, b) = match sector as u32 {
        0 => (chroma, x, 0.0),
        1 => (x, chroma, 0.0),
        2 => (0.0, chroma, x),
        3 => (0.0, x, chroma),
        4 => (x, 0.0, chroma),
        _ => (chroma, 0.0, x),
    };
    let m = lightness - chroma / 2.0;
    let channel = |v: f64| ((v + m) * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba::rgb(channel(r), channel(g), channel(b))
}

// =============================================================================
// Resolution Results
// =============================================================================

/// Something a coin row can draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Icon {
    /// Validated SVG markup from a source or the cache.
    Svg(String),
    /// Generated badge.
    Fallback(FallbackBadge),
}

impl Icon {
    /// Markup for either variant.
    #[must_use]
    pub fn to_svg(&self) -> String {
        match self {
            Self::Svg(svg) => svg.clone(),
            Self::Fallback(badge) => badge.to_svg(),
        }
    }

    /// Whether this is the generated badge.
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Synchronous view of an icon while resolution may be in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconState {
    /// Markup is cached.
    Ready(String),
    /// Not cached yet; a lookup is needed or running.
    Pending,
    /// Badge: denied or known unresolvable.
    Fallback(FallbackBadge),
}
