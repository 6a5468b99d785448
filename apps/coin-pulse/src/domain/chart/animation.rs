//! Chart Animation State Machines
//!
//! Two independent mechanics, composed by `ChartAnimator`:
//!
//! ```text
//! Reveal:     Idle → Revealing(progress) → Settled
//! Transition: Idle → Transitioning(from, to, started) → Settled
//! ```
//!
//! # Design
//!
//! Reveal restarts whenever the series identity (`SeriesKey`) changes and
//! advances a fixed `REVEAL_STEP` per frame tick. A transition starts when a
//! new series replaces the current one under the same identity; values are
//! interpolated linearly over `TRANSITION_DURATION`. Series of different
//! lengths are not interpolated: the target is shown immediately.
//!
//! Time is passed in by the caller so the machines stay deterministic under
//! test.

use std::time::{Duration, Instant};

/// Reveal progress added per frame.
pub const REVEAL_STEP: f64 = 0.05;

/// Length of a value transition.
pub const TRANSITION_DURATION: Duration = Duration::from_secs(1);

/// Identity of a displayed series, e.g. `BTCUSDT:1D` or `ETHUSDT:live`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey(String);

impl SeriesKey {
    /// Key for a symbol and a range label.
    #[must_use]
    pub fn new(symbol: &str, range: &str) -> Self {
        Self(format!("{}:{range}", symbol.to_uppercase()))
    }

    /// The key as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// Reveal
// =============================================================================

/// Left-to-right draw-in state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RevealState {
    /// Nothing to reveal yet.
    #[default]
    Idle,
    /// Revealing; `progress` in `[0, 1)`.
    Revealing {
        /// Fraction of points shown.
        progress: f64,
    },
    /// Fully revealed.
    Settled,
}

impl RevealState {
    /// Start a reveal from zero.
    #[must_use]
    pub const fn start() -> Self {
        Self::Revealing { progress: 0.0 }
    }

    /// Advance one frame.
    #[must_use]
    pub fn step(self) -> Self {
        match self {
            Self::Revealing { progress } => {
                let next = progress + REVEAL_STEP;
                if next >= 1.0 - 1e-9 {
                    Self::Settled
                } else {
                    Self::Revealing { progress: next }
                }
            }
            other => other,
        }
    }

    /// Fraction of the series to draw.
    #[must_use]
    pub const fn progress(self) -> f64 {
        match self {
            Self::Idle => 0.0,
            Self::Revealing { progress } => progress,
            Self::Settled => 1.0,
        }
    }

    /// Whether a reveal is running.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Revealing { .. })
    }
}

// =============================================================================
// Transition
// =============================================================================

/// Value morph between two series of equal length.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransitionState {
    /// No series shown yet.
    #[default]
    Idle,
    /// Interpolating from `from` to `to`.
    Transitioning {
        /// Values at the start of the transition.
        from: Vec<f64>,
        /// Target values.
        to: Vec<f64>,
        /// When the transition started.
        started: Instant,
    },
    /// Showing `values` with no motion.
    Settled {
        /// Current values.
        values: Vec<f64>,
    },
}

impl TransitionState {
    /// Values to show at `now`.
    #[must_use]
    pub fn values_at(&self, now: Instant) -> Vec<f64> {
        match self {
            Self::Idle => Vec::new(),
            Self::Settled { values } => values.clone(),
            Self::Transitioning { from, to, started } => {
                let t = transition_progress(*started, now);
                from.iter()
                    .zip(to)
                    .map(|(a, b)| (b - a).mul_add(t, *a))
                    .collect()
            }
        }
    }

    /// Move to `target`, interpolating from what is shown at `now` when the
    /// lengths match.
    #[must_use]
    pub fn retarget(self, target: Vec<f64>, now: Instant) -> Self {
        let current = self.values_at(now);
        if current.is_empty() || current.len() != target.len() {
            return Self::Settled { values: target };
        }
        if current == target {
            return Self::Settled { values: target };
        }
        Self::Transitioning {
            from: current,
            to: target,
            started: now,
        }
    }

    /// Settle a finished transition.
    #[must_use]
    pub fn advance(self, now: Instant) -> Self {
        match self {
            Self::Transitioning { to, started, .. }
                if now.saturating_duration_since(started) >= TRANSITION_DURATION =>
            {
                Self::Settled { values: to }
            }
            other => other,
        }
    }

    /// Whether values are still moving.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Transitioning { .. })
    }
}

fn transition_progress(started: Instant, now: Instant) -> f64 {
    let elapsed = now.saturating_duration_since(started).as_secs_f64();
    (elapsed / TRANSITION_DURATION.as_secs_f64()).clamp(0.0, 1.0)
}

// =============================================================================
// Animator
// =============================================================================

/// Values and reveal progress for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameValues {
    /// Samples to project.
    pub values: Vec<f64>,
    /// Reveal progress in `[0, 1]`.
    pub reveal_progress: f64,
    /// Identity of the series drawn, if any.
    pub key: Option<SeriesKey>,
}

/// Reveal and transition driven together by a frame tick.
#[derive(Debug, Default)]
pub struct ChartAnimator {
    key: Option<SeriesKey>,
    reveal: RevealState,
    transition: TransitionState,
}

impl ChartAnimator {
    /// Create an idle animator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the displayed series.
    ///
    /// A new identity restarts the reveal and shows `values` directly; the
    /// same identity morphs toward `values`.
    pub fn set_series(&mut self, key: SeriesKey, values: Vec<f64>, now: Instant) {
        let transition = std::mem::take(&mut self.transition);
        if self.key.as_ref() == Some(&key) {
            self.transition = transition.retarget(values, now);
            return;
        }
        self.key = Some(key);
        self.reveal = RevealState::start();
        self.transition = TransitionState::Settled { values };
    }

    /// Advance both machines one frame and return what to draw.
    pub fn tick(&mut self, now: Instant) -> FrameValues {
        self.transition = std::mem::take(&mut self.transition).advance(now);
        let frame = FrameValues {
            values: self.transition.values_at(now),
            reveal_progress: self.reveal.progress(),
            key: self.key.clone(),
        };
        self.reveal = self.reveal.step();
        frame
    }

    /// What would be drawn at `now`, without advancing.
    #[must_use]
    pub fn current(&self, now: Instant) -> FrameValues {
        FrameValues {
            values: self.transition.values_at(now),
            reveal_progress: self.reveal.progress(),
            key: self.key.clone(),
        }
    }

    /// Whether another frame would differ from this one.
    #[must_use]
    pub const fn is_animating(&self) -> bool {
        self.reveal.is_active() || self.transition.is_active()
    }

    /// Identity of the shown series.
    #[must_use]
    pub const fn key(&self) -> Option<&SeriesKey> {
        self.key.as_ref()
    }

    /// Reveal state.
    #[must_use]
    pub const fn reveal(&self) -> RevealState {
        self.reveal
    }

    /// Transition state.
    #[must_use]
    pub const fn transition(&self) -> &TransitionState {
        &self.transition
    }

    /// Forget the series; the next `set_series` reveals again.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
