//! Manifest and segment retrieval
//!
//! The fetcher is a thin, retry-free layer: it reports exactly what the
//! origin did. Retry policy belongs to the playback controller.

use crate::error::{Error, Result};
use crate::types::{Profile, StreamId};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Capability that supplies the bearer token for origin requests.
///
/// Injected at construction instead of read from ambient storage, so fetch
/// behavior is deterministic and testable.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current token, or `None` for anonymous access
    async fn bearer_token(&self) -> Option<String>;
}

/// Anonymous access: no Authorization header on any request
pub struct NoAuth;

#[async_trait]
impl AuthProvider for NoAuth {
    async fn bearer_token(&self) -> Option<String> {
        None
    }
}

/// Retrieves playlist text and segment bytes from a content origin
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch one playlist document as text
    async fn fetch_manifest(&self, url: &Url) -> Result<String>;

    /// Fetch one media segment as raw bytes. Segment payloads are handed to
    /// the decoder sink and never parsed here.
    async fn fetch_segment(&self, url: &Url) -> Result<Bytes>;
}

/// Master playlist location for a stream: `{origin}/stream/{profile}/{stream_id}`
pub fn master_playlist_url(origin: &Url, profile: Profile, stream_id: &StreamId) -> Result<Url> {
    origin
        .join(&format!("stream/{}/{}", profile, stream_id))
        .map_err(|e| Error::MalformedManifest(format!("cannot derive master URL: {e}")))
}

/// HTTP fetcher backed by reqwest
pub struct HttpManifestFetcher {
    client: Client,
    auth: Arc<dyn AuthProvider>,
}

impl HttpManifestFetcher {
    pub fn new(timeout: Duration, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, auth })
    }

    pub fn with_client(client: Client, auth: Arc<dyn AuthProvider>) -> Self {
        Self { client, auth }
    }

    async fn get(&self, url: &Url) -> Result<reqwest::Response> {
        let mut request = self.client.get(url.clone());
        if let Some(token) = self.auth.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::FetchStatus {
                status: status.as_u16(),
                body: truncate(&body, 256),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ManifestFetcher for HttpManifestFetcher {
    #[instrument(skip(self))]
    async fn fetch_manifest(&self, url: &Url) -> Result<String> {
        let response = self.get(url).await?;

        // Classify by declared content type: a manifest endpoint answering
        // with a binary payload is upstream breakage, not parse input.
        if let Some(content_type) = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if is_binary_content_type(content_type) {
                return Err(Error::MalformedManifest(format!(
                    "expected playlist text, origin declared '{content_type}'"
                )));
            }
        }

        let text = response
            .text()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        debug!(bytes = text.len(), "Manifest fetched");
        Ok(text)
    }

    #[instrument(skip(self))]
    async fn fetch_segment(&self, url: &Url) -> Result<Bytes> {
        let response = self.get(url).await?;
        let data = response
            .bytes()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        debug!(bytes = data.len(), "Segment fetched");
        Ok(data)
    }
}

fn is_binary_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
        .to_ascii_lowercase();

    matches!(essence.as_str(), "application/octet-stream")
        || essence.starts_with("video/")
        || essence.starts_with("audio/")
}

fn truncate(body: &str, max: usize) -> String {
    if body.len() <= max {
        body.to_string()
    } else {
        let mut end = max;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &body[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn master_url_scheme() {
        let origin = Url::parse("https://cdn.example.com/").unwrap();
        let id = StreamId::new("movie-42").unwrap();

        let url = master_playlist_url(&origin, Profile::Web, &id).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/stream/web/movie-42");

        let url = master_playlist_url(&origin, Profile::Mobile, &id).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example.com/stream/mobile/movie-42");
    }

    #[test]
    fn binary_content_types() {
        assert!(is_binary_content_type("video/mp2t"));
        assert!(is_binary_content_type("application/octet-stream; foo=bar"));
        assert!(!is_binary_content_type("application/vnd.apple.mpegurl"));
        assert!(!is_binary_content_type("text/plain; charset=utf-8"));
    }

    #[test]
    fn body_truncation_is_bounded() {
        let long = "x".repeat(1000);
        let out = truncate(&long, 256);
        assert!(out.len() <= 259);
        assert!(out.ends_with("..."));
        assert_eq!(truncate("short", 256), "short");
    }
}
