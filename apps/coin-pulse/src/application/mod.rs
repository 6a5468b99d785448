//! Application Layer - Use cases and port definitions.
//!
//! Services here orchestrate domain logic over the driven ports: market
//! data sources, icon sources, the key-value store and the pixel surface.

/// Port interfaces for external systems.
pub mod ports;

/// Feed, resolver, renderer and widget services.
pub mod services;
