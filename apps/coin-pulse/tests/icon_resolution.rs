//! Icon Resolution Integration Tests
//!
//! HTTP icon sources, the resolver and the file-backed cache together.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use coin_pulse::application::ports::{IconSource, KeyValueStore};
use coin_pulse::application::services::ICON_CACHE_KEY;
use coin_pulse::domain::icon::IconState;
use coin_pulse::infrastructure::icons::build_icon_sources;
use coin_pulse::infrastructure::storage::JsonFileStore;
use coin_pulse::{IconResolver, IconResolverSettings};

const SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32"><circle cx="16" cy="16" r="16" fill="#F7931A"/></svg>"##;

fn resolver_for(server: &MockServer, store: Arc<dyn KeyValueStore>) -> Arc<IconResolver> {
    let sources: Vec<Arc<dyn IconSource>> =
        build_icon_sources(&[format!("{}/icons/{{asset}}.svg", server.uri())]).unwrap();
    Arc::new(IconResolver::new(sources, store, IconResolverSettings::default()))
}

#[tokio::test]
async fn denied_asset_never_reaches_the_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SVG))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let resolver = resolver_for(&server, store);

    let icon = resolver.resolve("WBTCUSDT").await;
    assert!(icon.is_fallback());
    assert!(matches!(resolver.peek("WBTCUSDT"), IconState::Fallback(_)));
}

#[tokio::test]
async fn resolved_icon_survives_restart() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/icons/btc.svg"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SVG))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let first = resolver_for(&server, Arc::clone(&store));
    assert_eq!(first.resolve("BTCUSDT").await.to_svg(), SVG);
    assert_eq!(first.resolve("BTCUSDC").await.to_svg(), SVG);

    // Fresh process: only the durable tier is warm.
    let offline = MockServer::start().await;
    let reopened: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let second = resolver_for(&offline, reopened);
    assert_eq!(second.resolve("BTCUSDT").await.to_svg(), SVG);
    assert_eq!(second.peek("BTCUSDT"), IconState::Ready(SVG.to_string()));
}

#[tokio::test]
async fn corrupt_cache_file_reads_as_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/icons/eth.svg"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SVG))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(format!("{ICON_CACHE_KEY}.json")), "{\"ETH\": [trunc").unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let resolver = resolver_for(&server, Arc::clone(&store));

    assert_eq!(resolver.peek("ETHUSDT"), IconState::Pending);
    assert!(!resolver.resolve("ETHUSDT").await.is_fallback());

    let raw = store.get(ICON_CACHE_KEY).unwrap().unwrap();
    let repaired: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert!(repaired.get("ETH").is_some());
}

#[tokio::test]
async fn non_svg_payload_becomes_badge_and_sticks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not found</html>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(dir.path()).unwrap());
    let resolver = resolver_for(&server, store);

    assert!(resolver.resolve("NEWCOINUSDT").await.is_fallback());
    assert!(resolver.resolve("NEWCOINUSDT").await.is_fallback());
}
