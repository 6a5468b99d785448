//! Icon Source Port (Driven Port)

use async_trait::async_trait;

use super::SourceError;

/// Port for one upstream icon provider.
#[async_trait]
pub trait IconSource: Send + Sync {
    /// Source name for logs and metrics.
    fn name(&self) -> &str;

    /// Raw payload for a base asset code such as `BTC`.
    ///
    /// The resolver validates the payload; adapters only report transport
    /// and status failures.
    async fn fetch_icon(&self, asset: &str) -> Result<String, SourceError>;
}
