//! Application Ports (Driven)
//!
//! Interfaces the core uses to reach the outside world. Infrastructure
//! adapters implement them; tests substitute in-memory fakes.
//!
//! - `MarketDataSource`: snapshot and history provider
//! - `IconSource`: SVG icon provider
//! - `KeyValueStore`: durable string-keyed store
//! - `SnapshotPublisher`: fan-out of applied snapshots
//! - `Surface`: pixel target for the chart renderer

mod icon_source_port;
mod key_value_store_port;
mod market_data_port;
mod snapshot_publisher_port;
mod surface_port;

pub use icon_source_port::IconSource;
pub use key_value_store_port::{KeyValueStore, StoreError, load_json_or_default, save_json};
pub use market_data_port::{MarketDataSource, SourceError};
pub use snapshot_publisher_port::{NoOpSnapshotPublisher, SnapshotPublisher};
pub use surface_port::Surface;
