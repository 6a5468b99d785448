//! Live Price Buffer
//!
//! Rolling per-symbol windows of recent last prices, filled from feed ticks.
//! Once a window holds enough samples it is the chart series; until then a
//! deterministic synthetic series stands in.

mod synthetic;

use std::collections::{HashMap, VecDeque};

pub use synthetic::{SYNTHETIC_POINTS, synthetic_series, synthetic_seed};

use super::market::{ChartSeries, CoinSnapshot};

/// Samples kept per symbol.
pub const LIVE_WINDOW_CAPACITY: usize = 60;

/// Samples needed before the live window replaces the synthetic series.
pub const MIN_LIVE_SAMPLES: usize = 10;

// =============================================================================
// Window
// =============================================================================

/// Bounded, append-only window of prices for one symbol.
#[derive(Debug, Clone)]
pub struct LivePriceWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl Default for LivePriceWindow {
    fn default() -> Self {
        Self::new(LIVE_WINDOW_CAPACITY)
    }
}

impl LivePriceWindow {
    /// Create a window holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a price, evicting the oldest once full.
    ///
    /// Returns `false` when the price was rejected (non-finite or non-positive).
    pub fn push(&mut self, price: f64) -> bool {
        if !price.is_finite() || price <= 0.0 {
            return false;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(price);
        true
    }

    /// Number of samples held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the window is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of samples.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Whether the window has enough samples to be charted as-is.
    #[must_use]
    pub fn is_populated(&self) -> bool {
        self.samples.len() >= MIN_LIVE_SAMPLES
    }

    /// Copy out the samples in arrival order.
    #[must_use]
    pub fn to_series(&self) -> ChartSeries {
        self.samples.iter().copied().collect()
    }

    /// The live series if populated, otherwise a synthetic one for `reference`.
    #[must_use]
    pub fn series_or_synthetic(&self, reference: &CoinSnapshot) -> ChartSeries {
        if self.is_populated() {
            return self.to_series();
        }
        synthetic_series(
            &reference.symbol,
            reference.last_price,
            reference.price_change_percent,
            SYNTHETIC_POINTS,
        )
    }
}

// =============================================================================
// Buffer
// =============================================================================

/// Live windows keyed by symbol.
#[derive(Debug, Default)]
pub struct LivePriceBuffer {
    windows: HashMap<String, LivePriceWindow>,
}

impl LivePriceBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a price for `symbol` in arrival order.
    pub fn push(&mut self, symbol: &str, price: f64) -> bool {
        self.windows
            .entry(symbol.to_uppercase())
            .or_default()
            .push(price)
    }

    /// Window for `symbol`, if any ticks arrived.
    #[must_use]
    pub fn window(&self, symbol: &str) -> Option<&LivePriceWindow> {
        self.windows.get(&symbol.to_uppercase())
    }

    /// Live series for `symbol`, or a synthetic series derived from `reference`.
    #[must_use]
    pub fn series_or_synthetic(&self, symbol: &str, reference: &CoinSnapshot) -> ChartSeries {
        match self.window(symbol) {
            Some(window) => window.series_or_synthetic(reference),
            None => LivePriceWindow::default().series_or_synthetic(reference),
        }
    }

    /// Number of symbols tracked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.windows.len()
    }

    /// Whether no symbols are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reference() -> CoinSnapshot {
        CoinSnapshot::new("BTCUSDT", 65_000.0, 3.0, 66_000.0, 62_000.0, 1e9)
    }

    #[test]
    fn keeps_last_sixty_in_order() {
        let mut window = LivePriceWindow::default();
        for i in 1..=100 {
            window.push(f64::from(i));
        }
        let expected: Vec<f64> = (41..=100).map(f64::from).collect();
        assert_eq!(window.len(), LIVE_WINDOW_CAPACITY);
        assert_eq!(window.to_series().values(), expected.as_slice());
    }

    #[test]
    fn rejects_invalid_prices() {
        let mut window = LivePriceWindow::default();
        assert!(!window.push(f64::NAN));
        assert!(!window.push(0.0));
        assert!(!window.push(-1.0));
        assert!(window.is_empty());
    }

    #[test]
    fn synthetic_until_populated() {
        let mut buffer = LivePriceBuffer::new();
        for i in 0..9 {
            buffer.push("BTCUSDT", 64_000.0 + f64::from(i));
        }
        let series = buffer.series_or_synthetic("BTCUSDT", &reference());
        assert_eq!(series.len(), SYNTHETIC_POINTS);

        buffer.push("BTCUSDT", 64_100.0);
        let series = buffer.series_or_synthetic("btcusdt", &reference());
        assert_eq!(series.len(), MIN_LIVE_SAMPLES);
        assert_eq!(series.last(), Some(64_100.0));
    }

    #[test]
    fn unknown_symbol_gets_synthetic() {
        let buffer = LivePriceBuffer::new();
        let series = buffer.series_or_synthetic("BTCUSDT", &reference());
        assert!(series.is_drawable());
    }

    #[test]
    fn symbols_are_independent() {
        let mut buffer = LivePriceBuffer::new();
        buffer.push("BTCUSDT", 1.0);
        buffer.push("ETHUSDT", 2.0);
        buffer.push("ETHUSDT", 3.0);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.window("BTCUSDT").map(LivePriceWindow::len), Some(1));
        assert_eq!(buffer.window("ETHUSDT").map(LivePriceWindow::len), Some(2));
        assert!(buffer.window("SOLUSDT").is_none());
    }

    proptest! {
        #[test]
        fn never_exceeds_capacity(prices in proptest::collection::vec(0.01f64..1e6, 0..300)) {
            let mut window = LivePriceWindow::default();
            for price in &prices {
                window.push(*price);
            }
            prop_assert!(window.len() <= LIVE_WINDOW_CAPACITY);
            let keep = prices.len().min(LIVE_WINDOW_CAPACITY);
            let series = window.to_series();
            prop_assert_eq!(series.values(), &prices[prices.len() - keep..]);
        }
    }
}
