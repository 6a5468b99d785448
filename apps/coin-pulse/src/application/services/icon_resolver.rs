//! Icon Resolver
//!
//! Resolves a trading pair to an icon through a two-tier cache and an
//! ordered list of icon sources, falling back to a generated badge.
//!
//! # Resolution order
//!
//! 1. Deny-listed asset: badge, before any await point
//! 2. Memory tier (authoritative)
//! 3. Durable tier, copied into memory on hit
//! 4. Icon sources in order, each attempt bounded by `attempt_timeout`
//!
//! Step 4 runs on a spawned task and the caller waits at most
//! `overall_timeout`. A result that lands after the caller gave up still
//! fills both tiers for the next resolution. Concurrent resolutions of the
//! same asset share one lookup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::{Mutex, RwLock};

use super::fallback::try_in_order;
use crate::application::ports::{
    IconSource, KeyValueStore, SourceError, load_json_or_default, save_json,
};
use crate::domain::icon::{
    FallbackBadge, Icon, IconCacheEntry, IconState, icon_asset, is_denied, is_valid_svg,
};
use crate::infrastructure::metrics::{self, IconOutcome};

/// Durable store key for the icon cache.
pub const ICON_CACHE_KEY: &str = "coinIconCache";

/// Icon resolution timeouts.
#[derive(Debug, Clone)]
pub struct IconResolverSettings {
    /// Bound on one source attempt.
    pub attempt_timeout: Duration,
    /// How long a caller waits before showing the badge.
    pub overall_timeout: Duration,
}

impl Default for IconResolverSettings {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(2),
            overall_timeout: Duration::from_secs(3),
        }
    }
}

type Lookup = Shared<BoxFuture<'static, Option<String>>>;

/// Shared handle to a resolver.
pub type SharedIconResolver = Arc<IconResolver>;

/// Two-tier cached icon lookup.
pub struct IconResolver {
    sources: Vec<Arc<dyn IconSource>>,
    store: Arc<dyn KeyValueStore>,
    settings: IconResolverSettings,
    memory: RwLock<HashMap<String, IconCacheEntry>>,
    in_flight: Mutex<HashMap<String, Lookup>>,
    durable_write: Mutex<()>,
}

impl std::fmt::Debug for IconResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IconResolver")
            .field("sources", &self.sources.iter().map(|s| s.name()).collect::<Vec<_>>())
            .field("settings", &self.settings)
            .field("cached", &self.memory.read().len())
            .finish_non_exhaustive()
    }
}

impl IconResolver {
    /// Create a resolver over `sources`, highest priority first.
    #[must_use]
    pub fn new(
        sources: Vec<Arc<dyn IconSource>>,
        store: Arc<dyn KeyValueStore>,
        settings: IconResolverSettings,
    ) -> Self {
        Self {
            sources,
            store,
            settings,
            memory: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            durable_write: Mutex::new(()),
        }
    }

    /// What can be drawn right now, without any network.
    #[must_use]
    pub fn peek(&self, symbol: &str) -> IconState {
        let asset = icon_asset(symbol);
        if is_denied(&asset) {
            return IconState::Fallback(FallbackBadge::for_asset(&asset));
        }
        match self.cached(&asset) {
            Some((IconCacheEntry::Resolved(svg), _)) => IconState::Ready(svg),
            Some((IconCacheEntry::Unresolvable, _)) => {
                IconState::Fallback(FallbackBadge::for_asset(&asset))
            }
            None => IconState::Pending,
        }
    }

    /// Resolve an icon for `symbol`.
    ///
    /// Never fails: every failure mode ends in the fallback badge.
    pub async fn resolve(self: &Arc<Self>, symbol: &str) -> Icon {
        let asset = icon_asset(symbol);
        if is_denied(&asset) {
            metrics::record_icon_resolution(IconOutcome::Denied);
            return Icon::Fallback(FallbackBadge::for_asset(&asset));
        }

        if let Some((entry, outcome)) = self.cached(&asset) {
            let outcome = match entry {
                IconCacheEntry::Unresolvable => IconOutcome::Unresolvable,
                IconCacheEntry::Resolved(_) => outcome,
            };
            metrics::record_icon_resolution(outcome);
            return icon_for(&asset, entry);
        }

        let lookup = self.lookup_for(&asset);
        match tokio::time::timeout(self.settings.overall_timeout, lookup).await {
            Ok(Some(svg)) => {
                metrics::record_icon_resolution(IconOutcome::Fetched);
                Icon::Svg(svg)
            }
            Ok(None) => {
                metrics::record_icon_resolution(IconOutcome::Unresolvable);
                Icon::Fallback(FallbackBadge::for_asset(&asset))
            }
            Err(_) => {
                tracing::debug!(asset = %asset, "Icon lookup still running, showing badge");
                metrics::record_icon_resolution(IconOutcome::TimedOut);
                Icon::Fallback(FallbackBadge::for_asset(&asset))
            }
        }
    }

    /// Forget a cached entry in both tiers so the next resolution retries.
    pub fn forget(&self, symbol: &str) {
        let asset = icon_asset(symbol);
        self.memory.write().remove(&asset);
        let _guard = self.durable_write.lock();
        let mut durable: HashMap<String, IconCacheEntry> =
            load_json_or_default(self.store.as_ref(), ICON_CACHE_KEY);
        if durable.remove(&asset).is_some()
            && let Err(e) = save_json(self.store.as_ref(), ICON_CACHE_KEY, &durable)
        {
            tracing::warn!(asset = %asset, error = %e, "Failed to persist icon cache");
        }
    }

    /// Number of assets in the memory tier.
    #[must_use]
    pub fn cached_len(&self) -> usize {
        self.memory.read().len()
    }

    // -------------------------------------------------------------------------
    // Cache tiers
    // -------------------------------------------------------------------------

    /// Memory tier, then durable tier. A durable hit is copied into memory.
    fn cached(&self, asset: &str) -> Option<(IconCacheEntry, IconOutcome)> {
        if let Some(entry) = self.memory.read().get(asset) {
            return Some((entry.clone(), IconOutcome::MemoryHit));
        }
        let durable: HashMap<String, IconCacheEntry> =
            load_json_or_default(self.store.as_ref(), ICON_CACHE_KEY);
        let entry = durable.get(asset)?.clone();
        if let IconCacheEntry::Resolved(svg) = &entry
            && !is_valid_svg(svg)
        {
            return None;
        }
        self.memory.write().insert(asset.to_string(), entry.clone());
        Some((entry, IconOutcome::DurableHit))
    }

    fn store_entry(&self, asset: &str, entry: IconCacheEntry) {
        self.memory.write().insert(asset.to_string(), entry.clone());

        let _guard = self.durable_write.lock();
        let mut durable: HashMap<String, IconCacheEntry> =
            load_json_or_default(self.store.as_ref(), ICON_CACHE_KEY);
        durable.insert(asset.to_string(), entry);
        if let Err(e) = save_json(self.store.as_ref(), ICON_CACHE_KEY, &durable) {
            tracing::warn!(asset, error = %e, "Failed to persist icon cache");
        }
    }

    // -------------------------------------------------------------------------
    // Network lookup
    // -------------------------------------------------------------------------

    fn lookup_for(self: &Arc<Self>, asset: &str) -> Lookup {
        let mut in_flight = self.in_flight.lock();
        if let Some(existing) = in_flight.get(asset) {
            return existing.clone();
        }
        let task = tokio::spawn(Arc::clone(self).fetch_and_store(asset.to_string()));
        let lookup = task.map(Result::ok).map(Option::flatten).boxed().shared();
        in_flight.insert(asset.to_string(), lookup.clone());
        lookup
    }

    async fn fetch_and_store(self: Arc<Self>, asset: String) -> Option<String> {
        let attempt_timeout = self.settings.attempt_timeout;
        let asset_ref = asset.as_str();

        let outcome = try_in_order(
            self.sources.iter(),
            |_: &Arc<dyn IconSource>| true,
            |source| fetch_validated(source, asset_ref, attempt_timeout),
            |source: &Arc<dyn IconSource>, error: SourceError| {
                tracing::debug!(asset = asset_ref, source = source.name(), error = %error, "Icon source failed");
            },
        )
        .await;

        let svg = outcome.served.map(|(source, svg)| {
            tracing::debug!(asset = asset_ref, source = source.name(), "Icon resolved");
            svg
        });
        let entry = svg
            .clone()
            .map_or(IconCacheEntry::Unresolvable, IconCacheEntry::Resolved);
        self.store_entry(&asset, entry);
        self.in_flight.lock().remove(&asset);
        svg
    }
}

async fn fetch_validated(
    source: &Arc<dyn IconSource>,
    asset: &str,
    attempt_timeout: Duration,
) -> Result<String, SourceError> {
    let payload = tokio::time::timeout(attempt_timeout, source.fetch_icon(asset))
        .await
        .map_err(|_| SourceError::timeout(attempt_timeout))??;
    if is_valid_svg(&payload) {
        Ok(payload.trim().to_string())
    } else {
        Err(SourceError::Malformed {
            message: "payload is not SVG markup".into(),
        })
    }
}

fn icon_for(asset: &str, entry: IconCacheEntry) -> Icon {
    match entry {
        IconCacheEntry::Resolved(svg) => Icon::Svg(svg),
        IconCacheEntry::Unresolvable => Icon::Fallback(FallbackBadge::for_asset(asset)),
    }
}
