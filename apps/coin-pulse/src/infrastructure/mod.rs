//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the port interfaces defined in the
//! application layer, plus configuration and observability.

/// REST market data sources and the push ticker stream.
pub mod sources;

/// HTTP icon sources.
pub mod icons;

/// Broadcast channel fan-out for applied snapshots.
pub mod broadcast;

/// File and in-memory key-value stores.
pub mod storage;

/// Software raster surface.
pub mod render;

/// Environment-driven configuration.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// OpenTelemetry tracing integration.
pub mod telemetry;
