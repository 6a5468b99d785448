//! Snapshot Publisher Port (Driven Port)
//!
//! Fan-out for snapshots the feed has applied.

use crate::domain::market::CoinSnapshot;

/// Port for distributing applied snapshots to widgets.
pub trait SnapshotPublisher: Send + Sync {
    /// Publish one snapshot. Must not block; dropping for slow consumers is
    /// acceptable.
    fn publish(&self, snapshot: &CoinSnapshot);
}

/// Publisher that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpSnapshotPublisher;

impl SnapshotPublisher for NoOpSnapshotPublisher {
    fn publish(&self, _snapshot: &CoinSnapshot) {}
}
