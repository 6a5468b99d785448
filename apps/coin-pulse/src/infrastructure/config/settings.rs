//! Runner Configuration Settings
//!
//! Configuration types for the headless runner, loaded from environment
//! variables. Unparseable numeric values fall back to their defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::application::services::{FeedSettings, IconResolverSettings, WidgetSettings};

/// Upstream market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Binance public REST API.
    Binance,
    /// CoinGecko public API.
    CoinGecko,
    /// CryptoCompare min-api.
    CryptoCompare,
}

impl SourceKind {
    /// Parse a source name.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "binance" => Some(Self::Binance),
            "coingecko" => Some(Self::CoinGecko),
            "cryptocompare" => Some(Self::CryptoCompare),
            _ => None,
        }
    }

    /// Name used for rate limiting, logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Binance => "binance",
            Self::CoinGecko => "coingecko",
            Self::CryptoCompare => "cryptocompare",
        }
    }
}

/// Market data feed settings.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Tracked trading pairs, uppercase.
    pub symbols: Vec<String>,
    /// Sources in priority order.
    pub sources: Vec<SourceKind>,
    /// Snapshot polling period.
    pub refresh_interval: Duration,
    /// Historical cache lifetime.
    pub history_cache_ttl: Duration,
    /// Bound on one source attempt.
    pub source_timeout: Duration,
    /// Bound on a whole historical request.
    pub history_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        let feed = FeedSettings::default();
        Self {
            symbols: ["BTCUSDT", "ETHUSDT", "SOLUSDT", "BNBUSDT", "XRPUSDT"]
                .into_iter()
                .map(String::from)
                .collect(),
            sources: vec![
                SourceKind::Binance,
                SourceKind::CoinGecko,
                SourceKind::CryptoCompare,
            ],
            refresh_interval: feed.refresh_interval,
            history_cache_ttl: feed.history_cache_ttl,
            source_timeout: feed.source_timeout,
            history_timeout: feed.history_timeout,
        }
    }
}

impl FeedConfig {
    /// Feed service settings.
    #[must_use]
    pub const fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            source_timeout: self.source_timeout,
            history_timeout: self.history_timeout,
            history_cache_ttl: self.history_cache_ttl,
            refresh_interval: self.refresh_interval,
        }
    }
}

/// Upstream base URLs.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Binance REST base URL.
    pub binance: String,
    /// CoinGecko base URL.
    pub coingecko: String,
    /// CryptoCompare base URL.
    pub cryptocompare: String,
    /// Icon URL templates in priority order. `{asset}` is the lowercase
    /// base asset, `{ASSET}` the uppercase one.
    pub icon_templates: Vec<String>,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            binance: "https://api.binance.com".to_string(),
            coingecko: "https://api.coingecko.com".to_string(),
            cryptocompare: "https://min-api.cryptocompare.com".to_string(),
            icon_templates: vec![
                "https://cdn.jsdelivr.net/gh/spothq/cryptocurrency-icons@master/svg/color/{asset}.svg"
                    .to_string(),
                "https://cdn.jsdelivr.net/gh/vadimmalykhin/binance-icons/crypto/{asset}.svg"
                    .to_string(),
            ],
        }
    }
}

/// Push stream settings.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Whether to connect the push stream.
    pub enabled: bool,
    /// Mini-ticker WebSocket URL.
    pub url: String,
    /// Initial reconnection delay.
    pub reconnect_delay_initial: Duration,
    /// Maximum reconnection delay.
    pub reconnect_delay_max: Duration,
    /// Reconnection delay multiplier for exponential backoff.
    pub reconnect_delay_multiplier: f64,
    /// Maximum reconnection attempts before giving up (0 = unlimited).
    pub max_reconnect_attempts: u32,
    /// Snapshot hub capacity.
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            url: "wss://stream.binance.com:9443/ws/!miniTicker@arr".to_string(),
            reconnect_delay_initial: Duration::from_millis(500),
            reconnect_delay_max: Duration::from_secs(30),
            reconnect_delay_multiplier: 2.0,
            max_reconnect_attempts: 0,
            channel_capacity: 1_024,
        }
    }
}

/// Chart output settings.
#[derive(Debug, Clone)]
pub struct ChartSettings {
    /// Background history refresh period.
    pub refresh_interval: Duration,
    /// Directory chart images are written to.
    pub output_dir: PathBuf,
    /// Logical chart width.
    pub width: u32,
    /// Logical chart height.
    pub height: u32,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            refresh_interval: WidgetSettings::default().history_refresh,
            output_dir: PathBuf::from("charts"),
            width: 320,
            height: 120,
        }
    }
}

impl ChartSettings {
    /// Widget timing.
    #[must_use]
    pub fn widget_settings(&self) -> WidgetSettings {
        WidgetSettings {
            history_refresh: self.refresh_interval,
            ..WidgetSettings::default()
        }
    }
}

/// Complete runner configuration.
#[derive(Debug, Clone)]
pub struct PulseConfig {
    /// Feed settings.
    pub feed: FeedConfig,
    /// Upstream URLs.
    pub endpoints: EndpointSettings,
    /// Push stream settings.
    pub stream: StreamSettings,
    /// Icon timeouts.
    pub icons: IconResolverSettings,
    /// Chart output.
    pub chart: ChartSettings,
    /// Directory for the durable key-value store.
    pub data_dir: PathBuf,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            feed: FeedConfig::default(),
            endpoints: EndpointSettings::default(),
            stream: StreamSettings::default(),
            icons: IconResolverSettings::default(),
            chart: ChartSettings::default(),
            data_dir: PathBuf::from(".coin-pulse"),
        }
    }
}

impl PulseConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the symbol or source list is empty, a source
    /// name is unknown, or a chart dimension is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`PulseConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let env = Env(&lookup);

        let symbols = match env.get("PULSE_SYMBOLS") {
            Some(raw) => split_list(&raw).map(|s| s.to_uppercase()).collect(),
            None => defaults.feed.symbols.clone(),
        };
        if symbols.is_empty() {
            return Err(ConfigError::EmptyValue("PULSE_SYMBOLS".to_string()));
        }

        let sources = match env.get("PULSE_SOURCES") {
            Some(raw) => split_list(&raw)
                .map(|name| {
                    SourceKind::from_str_case_insensitive(name)
                        .ok_or_else(|| ConfigError::UnknownSource(name.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.feed.sources.clone(),
        };
        if sources.is_empty() {
            return Err(ConfigError::EmptyValue("PULSE_SOURCES".to_string()));
        }

        let feed = FeedConfig {
            symbols,
            sources,
            refresh_interval: env.duration_secs(
                "PULSE_REFRESH_INTERVAL_SECS",
                defaults.feed.refresh_interval,
            ),
            history_cache_ttl: env.duration_secs(
                "PULSE_HISTORY_CACHE_TTL_SECS",
                defaults.feed.history_cache_ttl,
            ),
            source_timeout: env.duration_millis(
                "PULSE_SOURCE_TIMEOUT_MS",
                defaults.feed.source_timeout,
            ),
            history_timeout: env.duration_millis(
                "PULSE_HISTORY_TIMEOUT_MS",
                defaults.feed.history_timeout,
            ),
        };

        let endpoints = EndpointSettings {
            binance: env
                .get("BINANCE_API_URL")
                .unwrap_or(defaults.endpoints.binance),
            coingecko: env
                .get("COINGECKO_API_URL")
                .unwrap_or(defaults.endpoints.coingecko),
            cryptocompare: env
                .get("CRYPTOCOMPARE_API_URL")
                .unwrap_or(defaults.endpoints.cryptocompare),
            icon_templates: env
                .get("PULSE_ICON_URLS")
                .map(|raw| split_list(&raw).map(String::from).collect())
                .unwrap_or(defaults.endpoints.icon_templates),
        };

        let stream = StreamSettings {
            enabled: env.bool("PULSE_STREAM_ENABLED", defaults.stream.enabled),
            url: env.get("PULSE_STREAM_URL").unwrap_or(defaults.stream.url),
            reconnect_delay_initial: env.duration_millis(
                "PULSE_RECONNECT_DELAY_INITIAL_MS",
                defaults.stream.reconnect_delay_initial,
            ),
            reconnect_delay_max: env.duration_secs(
                "PULSE_RECONNECT_DELAY_MAX_SECS",
                defaults.stream.reconnect_delay_max,
            ),
            reconnect_delay_multiplier: env.parse(
                "PULSE_RECONNECT_DELAY_MULTIPLIER",
                defaults.stream.reconnect_delay_multiplier,
            ),
            max_reconnect_attempts: env.parse(
                "PULSE_MAX_RECONNECT_ATTEMPTS",
                defaults.stream.max_reconnect_attempts,
            ),
            channel_capacity: env.parse(
                "PULSE_CHANNEL_CAPACITY",
                defaults.stream.channel_capacity,
            ),
        };

        let icons = IconResolverSettings {
            attempt_timeout: env.duration_millis(
                "PULSE_ICON_ATTEMPT_TIMEOUT_MS",
                defaults.icons.attempt_timeout,
            ),
            overall_timeout: env.duration_millis(
                "PULSE_ICON_TIMEOUT_MS",
                defaults.icons.overall_timeout,
            ),
        };

        let chart = ChartSettings {
            refresh_interval: env.duration_secs(
                "PULSE_CHART_REFRESH_SECS",
                defaults.chart.refresh_interval,
            ),
            output_dir: env
                .get("PULSE_CHART_DIR")
                .map_or(defaults.chart.output_dir, PathBuf::from),
            width: env.parse("PULSE_CHART_WIDTH", defaults.chart.width),
            height: env.parse("PULSE_CHART_HEIGHT", defaults.chart.height),
        };
        if chart.width == 0 || chart.height == 0 {
            return Err(ConfigError::InvalidDimensions {
                width: chart.width,
                height: chart.height,
            });
        }

        Ok(Self {
            feed,
            endpoints,
            stream,
            icons,
            chart,
            data_dir: env
                .get("PULSE_DATA_DIR")
                .map_or(defaults.data_dir, PathBuf::from),
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A list variable is set but names nothing.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// `PULSE_SOURCES` names an unknown provider.
    #[error("unknown market data source: {0}")]
    UnknownSource(String),
    /// Chart width or height is zero.
    #[error("invalid chart dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Configured width.
        width: u32,
        /// Configured height.
        height: u32,
    },
}

struct Env<'a, F>(&'a F);

impl<F: Fn(&str) -> Option<String>> Env<'_, F> {
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn bool(&self, key: &str, default: bool) -> bool {
        self.get(key).map_or(default, |v| {
            v.eq_ignore_ascii_case("true") || v == "1"
        })
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_secs)
    }

    fn duration_millis(&self, key: &str, default: Duration) -> Duration {
        self.get(key)
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default, Duration::from_millis)
    }
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}
