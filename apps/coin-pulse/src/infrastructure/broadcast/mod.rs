//! Broadcast Channel Adapter
//!
//! Fans applied snapshots out to every mounted widget through a tokio
//! broadcast channel. Slow widgets lag and skip ahead; they never hold up
//! the feed.

use tokio::sync::broadcast;

use crate::application::ports::SnapshotPublisher;
use crate::domain::market::CoinSnapshot;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1_024;

/// Snapshot fan-out hub.
///
/// # Example
///
/// ```rust
/// use coin_pulse::infrastructure::broadcast::SnapshotHub;
///
/// let hub = SnapshotHub::with_defaults();
/// let mut rx = hub.subscribe();
/// assert_eq!(hub.receiver_count(), 1);
/// # drop(rx.try_recv());
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotHub {
    snapshots_tx: broadcast::Sender<CoinSnapshot>,
}

impl SnapshotHub {
    /// Create a hub buffering up to `capacity` snapshots per receiver.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            snapshots_tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Create a hub with `DEFAULT_CAPACITY`.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }

    /// Send a snapshot to all subscribers.
    ///
    /// Returns the number of receivers, or `None` if there are none.
    #[must_use]
    pub fn send(&self, snapshot: CoinSnapshot) -> Option<usize> {
        self.snapshots_tx.send(snapshot).ok()
    }

    /// Get a new receiver. It sees only snapshots sent after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<CoinSnapshot> {
        self.snapshots_tx.subscribe()
    }

    /// Number of active receivers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.snapshots_tx.receiver_count()
    }
}

impl Default for SnapshotHub {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl SnapshotPublisher for SnapshotHub {
    fn publish(&self, snapshot: &CoinSnapshot) {
        if self.send(snapshot.clone()).is_none() {
            tracing::trace!(symbol = %snapshot.symbol, "No snapshot subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(symbol: &str, price: f64) -> CoinSnapshot {
        CoinSnapshot::new(symbol, price, 1.0, price, price, 1_000.0)
    }

    #[tokio::test]
    async fn every_subscriber_receives_published_snapshots() {
        let hub = SnapshotHub::new(8);
        let mut first = hub.subscribe();
        let mut second = hub.subscribe();

        hub.publish(&snapshot("BTCUSDT", 100.0));

        assert_eq!(first.recv().await.unwrap().symbol, "BTCUSDT");
        assert_eq!(second.recv().await.unwrap().symbol, "BTCUSDT");
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let hub = SnapshotHub::with_defaults();
        hub.publish(&snapshot("ETHUSDT", 10.0));
        assert_eq!(hub.send(snapshot("ETHUSDT", 11.0)), None);
    }

    #[tokio::test]
    async fn slow_receiver_lags_instead_of_blocking() {
        let hub = SnapshotHub::new(2);
        let mut rx = hub.subscribe();
        for i in 0..5 {
            hub.publish(&snapshot("BTCUSDT", 100.0 + f64::from(i)));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert!((rx.recv().await.unwrap().last_price - 103.0).abs() < f64::EPSILON);
    }
}
