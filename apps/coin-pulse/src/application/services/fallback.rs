//! Ordered Fallback
//!
//! "Try in order, skip if the precondition fails, stop at the first
//! success." Used for both market data sources and icon sources.

use std::future::Future;

/// Result of walking a fallback chain.
#[derive(Debug)]
pub struct FallbackOutcome<'a, S: ?Sized, T> {
    /// The candidate that succeeded and its value.
    pub served: Option<(&'a S, T)>,
    /// Candidates skipped because the precondition failed.
    pub skipped: usize,
    /// Candidates that were tried and failed.
    pub failed: usize,
}

impl<S: ?Sized, T> FallbackOutcome<'_, S, T> {
    /// Whether any candidate succeeded.
    #[must_use]
    pub const fn is_served(&self) -> bool {
        self.served.is_some()
    }
}

/// Walk `candidates` in order.
///
/// A candidate is attempted only if `precondition` holds. Each failure is
/// handed to `on_failure` before the next candidate is tried. Stops at the
/// first `Ok`.
pub async fn try_in_order<'a, S, T, E, I, P, A, F, Fut>(
    candidates: I,
    mut precondition: P,
    mut action: A,
    mut on_failure: F,
) -> FallbackOutcome<'a, S, T>
where
    S: ?Sized + 'a,
    I: IntoIterator<Item = &'a S>,
    P: FnMut(&S) -> bool,
    A: FnMut(&'a S) -> Fut,
    F: FnMut(&S, E),
    Fut: Future<Output = Result<T, E>>,
{
    let mut skipped = 0;
    let mut failed = 0;
    for candidate in candidates {
        if !precondition(candidate) {
            skipped += 1;
            continue;
        }
        match action(candidate).await {
            Ok(value) => {
                return FallbackOutcome {
                    served: Some((candidate, value)),
                    skipped,
                    failed,
                };
            }
            Err(e) => {
                failed += 1;
                on_failure(candidate, e);
            }
        }
    }
    FallbackOutcome {
        served: None,
        skipped,
        failed,
    }
}
