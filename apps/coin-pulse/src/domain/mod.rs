//! Domain Layer - Market data, chart geometry and icon rules.
//!
//! Pure types and algorithms with no I/O. Everything here is deterministic
//! given its inputs (time is passed in where it matters).

/// Snapshots, time ranges and chart series.
pub mod market;

/// Per-source throttle tracking with lazy expiry.
pub mod rate_limit;

/// Rolling live price windows and synthetic fallback series.
pub mod live_buffer;

/// Projection, smoothing, animation and hover resolution.
pub mod chart;

/// Icon asset codes, deny-list, validation and fallback badges.
pub mod icon;

/// Bookmarked symbol set.
pub mod bookmarks;

/// Sorting, filtering and formatting for coin lists.
pub mod watchlist;
