//! Ticker Stream Backoff
//!
//! Delay schedule between ticker stream connections. A connection only
//! counts as healthy once it has delivered a usable frame: Binance will
//! complete the handshake and then drop sockets it is shedding, and
//! resetting on the handshake alone would reconnect at the floor delay
//! forever.

use std::time::Duration;

use rand::Rng;

use crate::infrastructure::config::StreamSettings;

/// Jitter band around each delay, as a fraction of it.
const JITTER: f64 = 0.1;

/// Capped exponential schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Backoff {
    /// Delay after the first failure.
    pub initial: Duration,
    /// Ceiling for any delay.
    pub max: Duration,
    /// Growth per consecutive failure.
    pub multiplier: f64,
    /// Consecutive failures tolerated before giving up (0 = unlimited).
    pub max_attempts: u32,
}

impl Backoff {
    /// Schedule from the `PULSE_RECONNECT_*` settings.
    #[must_use]
    pub const fn from_stream_settings(settings: &StreamSettings) -> Self {
        Self {
            initial: settings.reconnect_delay_initial,
            max: settings.reconnect_delay_max,
            multiplier: settings.reconnect_delay_multiplier,
            max_attempts: settings.max_reconnect_attempts,
        }
    }

    /// Un-jittered delay before attempt `attempt` (1-based).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = self.initial.as_millis() as f64 * factor;
        let capped = millis.min(self.max.as_millis() as f64);
        if capped.is_finite() {
            Duration::from_millis(capped.max(0.0) as u64)
        } else {
            self.max
        }
    }
}

/// Consecutive-failure tracking for one stream client.
#[derive(Debug)]
pub struct ReconnectState {
    backoff: Backoff,
    failures: u32,
}

impl ReconnectState {
    /// No failures yet.
    #[must_use]
    pub const fn new(backoff: Backoff) -> Self {
        Self { backoff, failures: 0 }
    }

    /// A frame arrived; the connection is healthy.
    pub const fn frame_received(&mut self) {
        self.failures = 0;
    }

    /// Connection lost. Returns the wait before the next attempt, or `None`
    /// once the failure cap is reached.
    #[must_use]
    pub fn connection_lost(&mut self) -> Option<Duration> {
        self.connection_lost_with(&mut rand::rng())
    }

    fn connection_lost_with(&mut self, rng: &mut impl Rng) -> Option<Duration> {
        if self.backoff.max_attempts != 0 && self.failures >= self.backoff.max_attempts {
            return None;
        }
        self.failures += 1;
        let base = self.backoff.delay_for(self.failures);
        let spread = base.as_millis() as f64 * JITTER;
        if spread < 1.0 {
            return Some(base);
        }
        let jittered = base.as_millis() as f64 + rng.random_range(-spread..=spread);
        Some(Duration::from_millis(jittered.max(1.0) as u64))
    }

    /// Consecutive failures since the last healthy frame.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use test_case::test_case;

    fn backoff(max_attempts: u32) -> Backoff {
        Backoff {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            max_attempts,
        }
    }

    #[test_case(1, 500 ; "first failure waits the initial delay")]
    #[test_case(3, 2_000 ; "third failure has doubled twice")]
    #[test_case(7, 30_000 ; "seventh failure hits the ceiling")]
    #[test_case(u32::MAX, 30_000 ; "huge attempt count stays at the ceiling")]
    fn schedule(attempt: u32, expected_ms: u64) {
        assert_eq!(backoff(0).delay_for(attempt), Duration::from_millis(expected_ms));
    }

    #[test]
    fn shrinking_multiplier_holds_the_initial_delay() {
        let backoff = Backoff {
            multiplier: 0.5,
            ..backoff(0)
        };
        assert_eq!(backoff.delay_for(4), Duration::from_millis(500));
    }

    #[test]
    fn default_settings_give_the_stream_schedule() {
        let backoff = Backoff::from_stream_settings(&StreamSettings::default());
        assert_eq!(backoff, self::backoff(0));
    }

    #[test]
    fn only_a_frame_resets_the_count() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = ReconnectState::new(backoff(0));

        // Handshakes that never deliver keep backing off.
        for _ in 0..3 {
            assert!(state.connection_lost_with(&mut rng).is_some());
        }
        assert_eq!(state.failures(), 3);
        let delay = state.connection_lost_with(&mut rng).unwrap();
        assert!(delay >= Duration::from_millis(3_600) && delay <= Duration::from_millis(4_400));

        state.frame_received();
        let delay = state.connection_lost_with(&mut rng).unwrap();
        assert!(delay >= Duration::from_millis(450) && delay <= Duration::from_millis(550));
    }

    #[test]
    fn gives_up_after_max_attempts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut state = ReconnectState::new(backoff(2));
        assert!(state.connection_lost_with(&mut rng).is_some());
        assert!(state.connection_lost_with(&mut rng).is_some());
        assert_eq!(state.connection_lost_with(&mut rng), None);

        state.frame_received();
        assert!(state.connection_lost_with(&mut rng).is_some());
    }
}
