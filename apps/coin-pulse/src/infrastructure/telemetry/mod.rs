//! Tracing Setup
//!
//! One `tracing` subscriber for the runner: a compact fmt layer filtered by
//! `RUST_LOG`, and an OTLP span layer when export is switched on.
//!
//! HTTP and WebSocket client crates log every connection at `info`/`debug`;
//! with a dozen sources polling and a stream reconnecting that drowns the
//! feed's own fallback warnings, so they are held at `warn` unless
//! `RUST_LOG` names them.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Extra filter directives, applied after the defaults
//! - `OTEL_ENABLED`: Set to "true" or "1" to export spans (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4317)
//! - `OTEL_SERVICE_NAME`: Service name for traces (default: coin-pulse)

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "coin-pulse";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

/// Level for this crate when `RUST_LOG` says nothing about it.
const CRATE_DIRECTIVE: &str = "coin_pulse=info";

/// Client crates kept quiet by default.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "tungstenite", "tokio_tungstenite"];

/// Keeps span export alive; flushes and shuts it down on drop.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl std::fmt::Debug for TelemetryGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryGuard")
            .field("exporting", &self.is_exporting())
            .finish()
    }
}

impl TelemetryGuard {
    /// Whether spans are being exported over OTLP.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to flush OTLP spans: {e}");
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    pub enabled: bool,
    /// OTLP gRPC endpoint.
    pub otlp_endpoint: String,
    /// Service name on exported spans.
    pub service_name: String,
    /// User directives from `RUST_LOG`, if any.
    pub log_directives: Option<String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
            log_directives: None,
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();
        Self {
            enabled: get("OTEL_ENABLED").is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint),
            service_name: get("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_directives: get("RUST_LOG"),
        }
    }

    /// Full filter: crate default, quiet client crates, then the user's
    /// directives so they win for any target they name.
    #[must_use]
    pub fn filter_directives(&self) -> String {
        let mut directives = vec![CRATE_DIRECTIVE.to_string()];
        directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
        if let Some(user) = &self.log_directives {
            directives.push(user.clone());
        }
        directives.join(",")
    }
}

/// Install the subscriber from the environment. Keep the guard alive for
/// the life of the program.
#[must_use]
pub fn init() -> TelemetryGuard {
    init_with_config(&TelemetryConfig::from_env())
}

/// Install the subscriber. An OTLP exporter that cannot be built leaves
/// local logging only.
#[must_use]
pub fn init_with_config(config: &TelemetryConfig) -> TelemetryGuard {
    // Malformed user directives are skipped rather than failing startup.
    let env_filter = EnvFilter::builder().parse_lossy(config.filter_directives());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(true)
        .with_thread_ids(false);

    let exporter = if config.enabled {
        opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(&config.otlp_endpoint)
            .build()
            .map_err(|e| eprintln!("OTLP exporter unavailable, logging locally only: {e}"))
            .ok()
    } else {
        None
    };

    let Some(exporter) = exporter else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .init();
        return TelemetryGuard {
            tracer_provider: None,
        };
    };

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build();
    let otel_layer =
        tracing_opentelemetry::layer().with_tracer(tracer_provider.tracer(config.service_name.clone()));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    TelemetryGuard {
        tracer_provider: Some(tracer_provider),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> TelemetryConfig {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect();
        TelemetryConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_logs_locally() {
        let config = config(&[]);
        assert_eq!(config, TelemetryConfig::default());
        assert_eq!(
            config.filter_directives(),
            "coin_pulse=info,hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,tungstenite=warn,tokio_tungstenite=warn"
        );
    }

    #[test]
    fn user_directives_come_last() {
        let config = config(&[("RUST_LOG", " coin_pulse=debug,reqwest=trace ")]);
        let directives = config.filter_directives();
        assert!(directives.starts_with("coin_pulse=info,"));
        assert!(directives.ends_with(",coin_pulse=debug,reqwest=trace"));
    }

    #[test]
    fn export_switch_and_endpoint() {
        let config = config(&[
            ("OTEL_ENABLED", "1"),
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4317"),
            ("OTEL_SERVICE_NAME", "  "),
        ]);
        assert!(config.enabled);
        assert_eq!(config.otlp_endpoint, "http://collector:4317");
        assert_eq!(config.service_name, "coin-pulse");

        assert!(!self::config(&[("OTEL_ENABLED", "yes")]).enabled);
    }
}
