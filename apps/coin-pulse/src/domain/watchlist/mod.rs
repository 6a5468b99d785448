//! Watchlist
//!
//! Ordering, filtering and display helpers for the coin list widget.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::bookmarks::BookmarkSet;
use super::market::CoinSnapshot;

/// Column a list is sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Trading pair name.
    Symbol,
    /// Last price.
    Price,
    /// 24h change.
    Change,
    /// 24h quote volume.
    #[default]
    Volume,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    #[default]
    Descending,
}

impl SortDirection {
    /// The other direction.
    #[must_use]
    pub const fn flipped(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }
}

/// Sort snapshots in place. Ties break on symbol, ascending.
pub fn sort_snapshots(snapshots: &mut [CoinSnapshot], key: SortKey, direction: SortDirection) {
    snapshots.sort_by(|a, b| {
        let primary = match key {
            SortKey::Symbol => a.symbol.cmp(&b.symbol),
            SortKey::Price => a.last_price.total_cmp(&b.last_price),
            SortKey::Change => a.price_change_percent.total_cmp(&b.price_change_percent),
            SortKey::Volume => a.quote_volume.total_cmp(&b.quote_volume),
        };
        let primary = match direction {
            SortDirection::Ascending => primary,
            SortDirection::Descending => primary.reverse(),
        };
        match primary {
            Ordering::Equal => a.symbol.cmp(&b.symbol),
            other => other,
        }
    });
}

/// Keep only bookmarked snapshots.
#[must_use]
pub fn bookmarked_only(snapshots: &[CoinSnapshot], bookmarks: &BookmarkSet) -> Vec<CoinSnapshot> {
    snapshots
        .iter()
        .filter(|s| bookmarks.contains(&s.symbol))
        .cloned()
        .collect()
}

/// Keep snapshots whose symbol or base asset contains `query`, ignoring case.
#[must_use]
pub fn search(snapshots: &[CoinSnapshot], query: &str) -> Vec<CoinSnapshot> {
    let query = query.trim().to_uppercase();
    snapshots
        .iter()
        .filter(|s| query.is_empty() || s.symbol.contains(&query) || s.base_asset.contains(&query))
        .cloned()
        .collect()
}

// =============================================================================
// Currency Conversion
// =============================================================================

/// Display currency with a rate from the quote currency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayCurrency {
    /// ISO-ish code, e.g. `EUR`.
    pub code: String,
    /// Symbol prefix, e.g. `€`.
    pub sign: String,
    /// Units of this currency per unit of quote currency.
    pub rate: f64,
}

impl DisplayCurrency {
    /// US dollars at parity with USD-pegged quotes.
    #[must_use]
    pub fn usd() -> Self {
        Self {
            code: "USD".into(),
            sign: "$".into(),
            rate: 1.0,
        }
    }

    /// Convert an amount in the quote currency. Non-positive or non-finite
    /// rates leave the amount unchanged.
    #[must_use]
    pub fn convert(&self, amount: f64) -> f64 {
        if self.rate.is_finite() && self.rate > 0.0 {
            amount * self.rate
        } else {
            amount
        }
    }

    /// Snapshot with every price field converted.
    #[must_use]
    pub fn convert_snapshot(&self, snapshot: &CoinSnapshot) -> CoinSnapshot {
        CoinSnapshot {
            last_price: self.convert(snapshot.last_price),
            high_price: self.convert(snapshot.high_price),
            low_price: self.convert(snapshot.low_price),
            quote_volume: self.convert(snapshot.quote_volume),
            ..snapshot.clone()
        }
    }
}

impl Default for DisplayCurrency {
    fn default() -> Self {
        Self::usd()
    }
}

// =============================================================================
// Formatting
// =============================================================================

/// Price with precision that scales with magnitude.
#[must_use]
pub fn format_price(price: f64, sign: &str) -> String {
    if !price.is_finite() {
        return "-".into();
    }
    let decimals = match price.abs() {
        p if p >= 1_000.0 => 2,
        p if p >= 1.0 => 4,
        p if p >= 0.01 => 6,
        _ => 8,
    };
    let body = format!("{:.*}", decimals, price.abs());
    let body = if price.abs() >= 1_000.0 {
        group_thousands(&body)
    } else {
        body
    };
    if price < 0.0 {
        format!("-{sign}{body}")
    } else {
        format!("{sign}{body}")
    }
}

/// Volume in compact form: `1.23B`, `45.60M`, `7.89K`.
#[must_use]
pub fn format_volume(volume: f64) -> String {
    if !volume.is_finite() {
        return "-".into();
    }
    let (scaled, suffix) = match volume.abs() {
        v if v >= 1e12 => (volume / 1e12, "T"),
        v if v >= 1e9 => (volume / 1e9, "B"),
        v if v >= 1e6 => (volume / 1e6, "M"),
        v if v >= 1e3 => (volume / 1e3, "K"),
        _ => (volume, ""),
    };
    format!("{scaled:.2}{suffix}")
}

/// Signed percent with two decimals.
#[must_use]
pub fn format_change(percent: f64) -> String {
    if !percent.is_finite() {
        return "-".into();
    }
    format!("{percent:+.2}%")
}

fn group_thousands(formatted: &str) -> String {
    let (int_part, frac_part) = formatted
        .split_once('.')
        .map_or((formatted, None), |(i, f)| (i, Some(f)));
    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    match frac_part {
        Some(frac) => format!("{grouped}.{frac}"),
        None => grouped,
    }
}
