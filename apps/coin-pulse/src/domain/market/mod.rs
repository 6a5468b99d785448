//! Market Data Types
//!
//! Snapshots, time ranges and chart series shared by the feed, the live
//! buffer and the chart renderer.
//!
//! # Design
//!
//! - `CoinSnapshot` is immutable per tick and replaced wholesale on the next.
//! - `TimeRange` is the UI-level range; `SupportedRange` is what sources can
//!   actually serve. The mapping between them is deliberately lossy.
//! - `ChartSeries` is index-ordered and equal-weight in time.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Trading Pair Helpers
// =============================================================================

/// Quote-currency suffixes stripped from a trading pair, longest first.
pub const QUOTE_SUFFIXES: &[&str] = &["FDUSD", "USDT", "USDC", "BUSD", "TUSD", "USD", "EUR"];

/// Split a trading pair into `(base, quote)`.
///
/// Unknown suffixes yield an empty quote.
#[must_use]
pub fn split_pair(symbol: &str) -> (String, String) {
    let upper = symbol.trim().to_uppercase();
    for suffix in QUOTE_SUFFIXES {
        if let Some(base) = upper.strip_suffix(suffix)
            && !base.is_empty()
        {
            return (base.to_string(), (*suffix).to_string());
        }
    }
    (upper, String::new())
}

/// Base asset code of a trading pair (`BTCUSDT` -> `BTC`).
#[must_use]
pub fn base_asset(symbol: &str) -> String {
    split_pair(symbol).0
}

// =============================================================================
// Coin Snapshot
// =============================================================================

/// Point-in-time reading for a trading pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinSnapshot {
    /// Trading pair, e.g. `BTCUSDT`.
    pub symbol: String,
    /// Base asset, e.g. `BTC`.
    pub base_asset: String,
    /// Quote asset, e.g. `USDT`.
    pub quote_asset: String,
    /// Last traded price.
    pub last_price: f64,
    /// 24h change in percent.
    pub price_change_percent: f64,
    /// 24h high.
    pub high_price: f64,
    /// 24h low.
    pub low_price: f64,
    /// 24h volume in quote currency.
    pub quote_volume: f64,
    /// When this snapshot was produced.
    pub updated_at: DateTime<Utc>,
}

impl CoinSnapshot {
    /// Create a snapshot, deriving base/quote assets from the symbol.
    #[must_use]
    pub fn new(
        symbol: impl Into<String>,
        last_price: f64,
        price_change_percent: f64,
        high_price: f64,
        low_price: f64,
        quote_volume: f64,
    ) -> Self {
        let symbol = symbol.into().to_uppercase();
        let (base_asset, quote_asset) = split_pair(&symbol);
        Self {
            symbol,
            base_asset,
            quote_asset,
            last_price,
            price_change_percent,
            high_price,
            low_price,
            quote_volume,
            updated_at: Utc::now(),
        }
    }

    /// Whether the 24h change is non-negative.
    #[must_use]
    pub fn is_up(&self) -> bool {
        self.price_change_percent >= 0.0
    }

    /// Check that every numeric field is finite and the price is positive.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.last_price.is_finite()
            && self.last_price > 0.0
            && self.price_change_percent.is_finite()
            && self.high_price.is_finite()
            && self.low_price.is_finite()
            && self.quote_volume.is_finite()
    }
}

// =============================================================================
// Time Ranges
// =============================================================================

/// Ranges every market data source can serve natively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SupportedRange {
    /// One day.
    OneDay,
    /// One week.
    OneWeek,
    /// One month.
    OneMonth,
    /// Three months.
    ThreeMonths,
    /// One year.
    OneYear,
}

impl SupportedRange {
    /// All supported ranges, shortest first.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::OneDay,
            Self::OneWeek,
            Self::OneMonth,
            Self::ThreeMonths,
            Self::OneYear,
        ]
    }

    /// Nominal span in days.
    #[must_use]
    pub const fn days(self) -> u32 {
        match self {
            Self::OneDay => 1,
            Self::OneWeek => 7,
            Self::OneMonth => 30,
            Self::ThreeMonths => 90,
            Self::OneYear => 365,
        }
    }

    /// Closest supported range to a span in days. Ties go to the shorter range.
    #[must_use]
    pub fn nearest(days: u32) -> Self {
        let mut best = Self::OneDay;
        for candidate in Self::all() {
            if candidate.days().abs_diff(days) < best.days().abs_diff(days) {
                best = *candidate;
            }
        }
        best
    }

    /// Short label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::OneYear => "1Y",
        }
    }
}

/// Range selectable in the detail widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimeRange {
    /// One day.
    #[default]
    OneDay,
    /// One week.
    OneWeek,
    /// One month.
    OneMonth,
    /// Three months.
    ThreeMonths,
    /// Six months (no native mapping).
    SixMonths,
    /// Year to date (no native mapping).
    YearToDate,
    /// One year.
    OneYear,
    /// Two years (no native mapping).
    TwoYears,
}

impl TimeRange {
    /// All UI ranges in display order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::OneDay,
            Self::OneWeek,
            Self::OneMonth,
            Self::ThreeMonths,
            Self::SixMonths,
            Self::YearToDate,
            Self::OneYear,
            Self::TwoYears,
        ]
    }

    /// Parse a range label, case-insensitive.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "1D" => Some(Self::OneDay),
            "1W" => Some(Self::OneWeek),
            "1M" => Some(Self::OneMonth),
            "3M" => Some(Self::ThreeMonths),
            "6M" => Some(Self::SixMonths),
            "YTD" => Some(Self::YearToDate),
            "1Y" => Some(Self::OneYear),
            "2Y" => Some(Self::TwoYears),
            _ => None,
        }
    }

    /// Short label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneDay => "1D",
            Self::OneWeek => "1W",
            Self::OneMonth => "1M",
            Self::ThreeMonths => "3M",
            Self::SixMonths => "6M",
            Self::YearToDate => "YTD",
            Self::OneYear => "1Y",
            Self::TwoYears => "2Y",
        }
    }

    /// Whether sources serve this range without remapping.
    #[must_use]
    pub const fn is_native(self) -> bool {
        !matches!(self, Self::SixMonths | Self::YearToDate | Self::TwoYears)
    }

    /// Map to the range sources will be queried with, as of `today`.
    #[must_use]
    pub fn supported_on(self, today: NaiveDate) -> SupportedRange {
        match self {
            Self::OneDay => SupportedRange::OneDay,
            Self::OneWeek => SupportedRange::OneWeek,
            Self::OneMonth => SupportedRange::OneMonth,
            Self::ThreeMonths => SupportedRange::ThreeMonths,
            Self::OneYear => SupportedRange::OneYear,
            Self::SixMonths => SupportedRange::nearest(182),
            Self::TwoYears => SupportedRange::nearest(730),
            Self::YearToDate => SupportedRange::nearest(today.ordinal()),
        }
    }

    /// Map to the supported range as of the current UTC date.
    #[must_use]
    pub fn supported(self) -> SupportedRange {
        self.supported_on(Utc::now().date_naive())
    }
}

impl From<SupportedRange> for TimeRange {
    fn from(range: SupportedRange) -> Self {
        match range {
            SupportedRange::OneDay => Self::OneDay,
            SupportedRange::OneWeek => Self::OneWeek,
            SupportedRange::OneMonth => Self::OneMonth,
            SupportedRange::ThreeMonths => Self::ThreeMonths,
            SupportedRange::OneYear => Self::OneYear,
        }
    }
}

// =============================================================================
// Chart Series
// =============================================================================

/// Minimum sample count needed to draw a line.
pub const MIN_DRAWABLE_SAMPLES: usize = 2;

/// Ordered price samples; index implies time position.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartSeries(Vec<f64>);

impl ChartSeries {
    /// Wrap samples.
    #[must_use]
    pub const fn new(samples: Vec<f64>) -> Self {
        Self(samples)
    }

    /// Empty series.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether the series has enough samples to draw a line.
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        self.0.len() >= MIN_DRAWABLE_SAMPLES
    }

    /// Borrow the samples.
    #[must_use]
    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// Consume into the raw samples.
    #[must_use]
    pub fn into_values(self) -> Vec<f64> {
        self.0
    }

    /// Last sample.
    #[must_use]
    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }

    /// Minimum and maximum sample, or `None` when empty.
    #[must_use]
    pub fn min_max(&self) -> Option<(f64, f64)> {
        min_max(&self.0)
    }

    /// Drop non-finite samples.
    #[must_use]
    pub fn sanitized(self) -> Self {
        Self(self.0.into_iter().filter(|v| v.is_finite()).collect())
    }
}

impl From<Vec<f64>> for ChartSeries {
    fn from(samples: Vec<f64>) -> Self {
        Self(samples)
    }
}

impl FromIterator<f64> for ChartSeries {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Minimum and maximum of a slice, or `None` when empty.
#[must_use]
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let first = *values.first()?;
    Some(
        values
            .iter()
            .fold((first, first), |(lo, hi), v| (lo.min(*v), hi.max(*v))),
    )
}

/// Result of a historical series request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    /// Samples, empty on failure.
    pub series: ChartSeries,
    /// Whether any source served the request.
    pub success: bool,
    /// Name of the source that served it, empty on failure.
    pub source: String,
}

impl HistoricalSeries {
    /// Successful result from `source`.
    #[must_use]
    pub fn served(series: ChartSeries, source: impl Into<String>) -> Self {
        Self {
            series,
            success: true,
            source: source.into(),
        }
    }

    /// Failed result: every source was unavailable.
    #[must_use]
    pub const fn unavailable() -> Self {
        Self {
            series: ChartSeries::empty(),
            success: false,
            source: String::new(),
        }
    }
}
