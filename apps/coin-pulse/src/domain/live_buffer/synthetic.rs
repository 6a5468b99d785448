//! Synthetic price paths for symbols without enough live samples.
//!
//! The path is a seeded random walk around the straight line from the
//! implied price 24h ago to the current price. The seed comes from the
//! symbol and the 24h change only, so repeated renders draw the same path.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::market::ChartSeries;

/// Samples in a synthetic series.
pub const SYNTHETIC_POINTS: usize = 48;

/// Pull of each step back toward the trend line.
const MEAN_REVERSION: f64 = 0.85;

/// Seed derived from the symbol's characters and the 24h change.
///
/// The change is quantised to hundredths of a percent so float noise in the
/// upstream payload does not reshuffle the path.
#[must_use]
pub fn synthetic_seed(symbol: &str, change_percent: f64) -> u64 {
    // FNV-1a over the uppercase symbol.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in symbol.to_uppercase().bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    let change_key = if change_percent.is_finite() {
        (change_percent * 100.0).round() as i64
    } else {
        0
    };
    hash ^ (change_key as u64).rotate_left(32)
}

/// Generate a deterministic price path ending at `last_price`.
///
/// Volatility per step is `|change|/10 + 0.02` percent of the trend price.
/// Returns an empty series when `last_price` is unusable.
#[must_use]
pub fn synthetic_series(
    symbol: &str,
    last_price: f64,
    change_percent: f64,
    points: usize,
) -> ChartSeries {
    if !last_price.is_finite() || last_price <= 0.0 || points == 0 {
        return ChartSeries::empty();
    }
    if points == 1 {
        return ChartSeries::new(vec![last_price]);
    }

    let change = if change_percent.is_finite() {
        change_percent
    } else {
        0.0
    };
    let growth = 1.0 + change / 100.0;
    let start_price = if growth > 0.01 {
        last_price / growth
    } else {
        last_price
    };
    let volatility = (change.abs() / 10.0 + 0.02) / 100.0;

    let mut rng = StdRng::seed_from_u64(synthetic_seed(symbol, change));
    let steps = (points - 1) as f64;
    let mut deviation = 0.0;
    let mut samples = Vec::with_capacity(points);

    for i in 0..points {
        let t = i as f64 / steps;
        let trend = (last_price - start_price).mul_add(t, start_price);
        let shock = (rng.random::<f64>() - 0.5) * 2.0 * volatility * trend;
        deviation = deviation * MEAN_REVERSION + shock;
        // Taper the wander so the path converges on the current price.
        let value = deviation.mul_add(1.0 - t, trend);
        samples.push(value.max(trend * 0.5));
    }

    if let Some(last) = samples.last_mut() {
        *last = last_price;
    }
    ChartSeries::new(samples)
}
