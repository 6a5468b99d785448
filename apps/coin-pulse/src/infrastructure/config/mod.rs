//! Configuration Module
//!
//! Environment-driven configuration for the runner.

mod settings;

pub use settings::{
    ChartSettings, ConfigError, EndpointSettings, FeedConfig, PulseConfig, SourceKind,
    StreamSettings,
};
