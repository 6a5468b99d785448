//! Rate-Limit Registry
//!
//! Tracks, per upstream source, whether the source is throttled and until
//! when. Consulted before every request to that source.
//!
//! # Design
//!
//! Entries expire lazily: a read past `reset_at` clears the entry as a side
//! effect and reports the source as available. Nothing needs to poll the
//! registry for a cool-down to end. Repeated marks overwrite the reset time
//! (last write wins, no compounding).
//!
//! The registry is shared by every widget in the process. A mark made on
//! behalf of one widget throttles the source for all of them.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use parking_lot::RwLock;

// =============================================================================
// Cool-down Table
// =============================================================================

/// Cool-down applied to sources missing from the table.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

/// Fixed per-source cool-downs. Lenient sources recover in 30s, strict ones in 60s.
const COOLDOWNS: &[(&str, Duration)] = &[
    ("binance", Duration::from_secs(30)),
    ("cryptocompare", Duration::from_secs(30)),
    ("coingecko", Duration::from_secs(60)),
];

/// Cool-down for a source name.
#[must_use]
pub fn cooldown_for(source: &str) -> Duration {
    COOLDOWNS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(source))
        .map_or(DEFAULT_COOLDOWN, |(_, duration)| *duration)
}

// =============================================================================
// Registry
// =============================================================================

/// Throttle state for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitEntry {
    /// Whether the source is throttled.
    pub limited: bool,
    /// When the throttle lifts.
    pub reset_at: Instant,
}

impl RateLimitEntry {
    /// Whether the entry still throttles at `now`.
    #[must_use]
    pub fn is_active_at(&self, now: Instant) -> bool {
        self.limited && now < self.reset_at
    }
}

/// Shared handle to a registry.
pub type SharedRateLimitRegistry = Arc<RateLimitRegistry>;

static GLOBAL_REGISTRY: OnceLock<SharedRateLimitRegistry> = OnceLock::new();

/// Per-source throttle table.
#[derive(Debug, Default)]
pub struct RateLimitRegistry {
    entries: RwLock<HashMap<String, RateLimitEntry>>,
}

impl RateLimitRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry shared by every widget.
    #[must_use]
    pub fn global() -> SharedRateLimitRegistry {
        Arc::clone(GLOBAL_REGISTRY.get_or_init(|| Arc::new(Self::new())))
    }

    /// Whether `source` is currently throttled.
    pub fn is_limited(&self, source: &str) -> bool {
        self.is_limited_at(source, Instant::now())
    }

    /// Whether `source` is throttled at `now`, clearing an expired entry.
    pub fn is_limited_at(&self, source: &str, now: Instant) -> bool {
        {
            let entries = self.entries.read();
            match entries.get(source) {
                None => return false,
                Some(entry) if entry.is_active_at(now) => return true,
                Some(_) => {}
            }
        }

        // Re-check under the write lock: another mark may have landed since.
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get(source) {
            if entry.is_active_at(now) {
                return true;
            }
            entries.remove(source);
            tracing::debug!(source, "Rate limit expired");
        }
        false
    }

    /// Throttle `source` for `duration` from now.
    pub fn mark_limited(&self, source: &str, duration: Duration) {
        self.mark_limited_at(source, duration, Instant::now());
    }

    /// Throttle `source` for `duration` from `now`. Overwrites any existing entry.
    pub fn mark_limited_at(&self, source: &str, duration: Duration, now: Instant) {
        let entry = RateLimitEntry {
            limited: true,
            reset_at: now + duration,
        };
        self.entries.write().insert(source.to_string(), entry);
        tracing::warn!(
            source,
            cooldown_ms = duration.as_millis(),
            "Source rate limited"
        );
    }

    /// Lift the throttle on `source` immediately.
    pub fn clear(&self, source: &str) {
        self.entries.write().remove(source);
    }

    /// Time left on the throttle for `source`, if any.
    pub fn remaining(&self, source: &str) -> Option<Duration> {
        let now = Instant::now();
        if !self.is_limited_at(source, now) {
            return None;
        }
        self.entries
            .read()
            .get(source)
            .map(|entry| entry.reset_at.saturating_duration_since(now))
    }

    /// Names of all sources throttled right now.
    #[must_use]
    pub fn limited_sources(&self) -> Vec<String> {
        let now = Instant::now();
        let mut names: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_active_at(now))
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }
}
