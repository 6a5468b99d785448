//! Shared HTTP plumbing for the REST sources.
//!
//! No retries here: a failed request is reported straight back so the feed
//! can throttle the source and move on to the next one.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use crate::application::ports::SourceError;

/// Client-side ceiling on one request. The feed applies its own, tighter,
/// per-attempt timeout on top.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// GET-only JSON client bound to one base URL.
#[derive(Debug, Clone)]
pub struct SourceHttpClient {
    client: Client,
    base_url: String,
}

impl SourceHttpClient {
    /// Create a client for `base_url` (no trailing slash needed).
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Transport` if the TLS backend cannot be
    /// initialised.
    pub fn new(base_url: &str) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("coin-pulse/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| SourceError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL requests are made against.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `path` with `query` and decode the JSON body.
    ///
    /// # Errors
    ///
    /// - `RateLimited` for 429 and 418, carrying `Retry-After` when present
    /// - `Status` for any other non-success status
    /// - `Timeout` / `Transport` when the request itself fails
    /// - `Malformed` when the body is not the expected JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        let text = self.get_text(path, query).await?;
        serde_json::from_str(&text).map_err(|e| SourceError::Malformed {
            message: e.to_string(),
        })
    }

    /// GET `path` and return the body as text.
    ///
    /// # Errors
    ///
    /// Same as [`SourceHttpClient::get_json`], minus `Malformed`.
    pub async fn get_text(&self, path: &str, query: &[(&str, String)]) -> Result<String, SourceError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after_secs = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(status_error(status, retry_after_secs));
        }

        response.text().await.map_err(|e| transport_error(&e))
    }
}

fn transport_error(e: &reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::timeout(REQUEST_TIMEOUT)
    } else {
        SourceError::Transport {
            message: e.to_string(),
        }
    }
}

fn status_error(status: StatusCode, retry_after_secs: Option<u64>) -> SourceError {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
        SourceError::RateLimited { retry_after_secs }
    } else {
        SourceError::Status {
            status: status.as_u16(),
        }
    }
}

/// Parse a decimal that upstream APIs send as a JSON string.
pub(crate) fn parse_decimal(field: &str, raw: &str) -> Result<f64, SourceError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| SourceError::Malformed {
            message: format!("{field} is not a number: {raw:?}"),
        })
}
