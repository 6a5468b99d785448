//! HTTP Icon Sources
//!
//! Each source is a URL template with an asset placeholder:
//!
//! - `{asset}`: lowercase base asset (`btc`)
//! - `{ASSET}`: uppercase base asset (`BTC`)
//!
//! Payload validation happens in the resolver; a source only reports
//! transport and status failures.

use std::sync::Arc;

use async_trait::async_trait;

use crate::application::ports::{IconSource, SourceError};
use crate::infrastructure::sources::SourceHttpClient;

/// Icon provider defined by a URL template.
#[derive(Debug, Clone)]
pub struct HttpIconSource {
    name: String,
    http: SourceHttpClient,
    path_template: String,
}

impl HttpIconSource {
    /// Create a source from a full URL template such as
    /// `https://cdn.example.com/icons/{asset}.svg`.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Malformed` when the template has no origin or
    /// no placeholder, and `SourceError::Transport` if the HTTP client
    /// cannot be built.
    pub fn new(name: impl Into<String>, template: &str) -> Result<Self, SourceError> {
        if !template.contains("{asset}") && !template.contains("{ASSET}") {
            return Err(SourceError::Malformed {
                message: format!("icon template has no asset placeholder: {template}"),
            });
        }
        let (origin, path_template) = split_origin(template).ok_or_else(|| SourceError::Malformed {
            message: format!("icon template is not an absolute URL: {template}"),
        })?;
        Ok(Self {
            name: name.into(),
            http: SourceHttpClient::new(origin)?,
            path_template: path_template.to_string(),
        })
    }

    /// Request path for `asset`.
    #[must_use]
    pub fn path_for(&self, asset: &str) -> String {
        self.path_template
            .replace("{asset}", &asset.to_lowercase())
            .replace("{ASSET}", &asset.to_uppercase())
    }
}

/// Split `scheme://host[:port]/path` into origin and path.
fn split_origin(url: &str) -> Option<(&str, &str)> {
    let scheme_end = url.find("://")? + 3;
    let path_start = url[scheme_end..].find('/')? + scheme_end;
    (path_start > scheme_end).then(|| url.split_at(path_start))
}

#[async_trait]
impl IconSource for HttpIconSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_icon(&self, asset: &str) -> Result<String, SourceError> {
        self.http.get_text(&self.path_for(asset), &[]).await
    }
}

/// Build one source per template, named `icons-<n>` in priority order.
///
/// # Errors
///
/// Returns the first template's construction error.
pub fn build_icon_sources(templates: &[String]) -> Result<Vec<Arc<dyn IconSource>>, SourceError> {
    templates
        .iter()
        .enumerate()
        .map(|(i, template)| {
            let source: Arc<dyn IconSource> = Arc::new(HttpIconSource::new(format!("icons-{}", i + 1), template)?);
            Ok::<_, SourceError>(source)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 32 32"><circle r="16"/></svg>"#;

    #[test_case("https://cdn.example.com/icons/{asset}.svg", "BTC", "/icons/btc.svg" ; "lowercase")]
    #[test_case("https://cdn.example.com/{ASSET}/icon.svg", "eth", "/ETH/icon.svg" ; "uppercase")]
    fn placeholders_expand(template: &str, asset: &str, expected: &str) {
        let source = HttpIconSource::new("t", template).unwrap();
        assert_eq!(source.path_for(asset), expected);
    }

    #[test_case("https://cdn.example.com/icons/static.svg" ; "no placeholder")]
    #[test_case("/icons/{asset}.svg" ; "relative")]
    #[test_case("https://{asset}" ; "no path")]
    fn bad_templates_are_rejected(template: &str) {
        assert!(matches!(
            HttpIconSource::new("t", template),
            Err(SourceError::Malformed { .. })
        ));
    }

    #[tokio::test]
    async fn fetches_expanded_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svg/color/sol.svg"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SVG))
            .expect(1)
            .mount(&server)
            .await;

        let source = HttpIconSource::new("cdn", &format!("{}/svg/color/{{asset}}.svg", server.uri())).unwrap();
        assert_eq!(source.fetch_icon("SOL").await.unwrap(), SVG);
    }

    #[tokio::test]
    async fn missing_icon_is_a_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let source = HttpIconSource::new("cdn", &format!("{}/{{ASSET}}.svg", server.uri())).unwrap();
        assert_eq!(
            source.fetch_icon("pepe").await,
            Err(SourceError::Status { status: 404 })
        );
    }

    #[test]
    fn sources_are_named_in_order() {
        let sources = build_icon_sources(&[
            "https://a.example/{asset}.svg".to_string(),
            "https://b.example/{asset}.svg".to_string(),
        ])
        .unwrap();
        let names: Vec<&str> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["icons-1", "icons-2"]);
    }
}
