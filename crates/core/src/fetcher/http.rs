//! `reqwest`-based fetcher implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};

use super::config::FetchConfig;
use super::error::FetchError;
use super::traits::{FetchedMedia, MediaFetcher};
use crate::metrics;

/// File name used when the URL path does not end in something file-like.
pub const DEFAULT_FILENAME: &str = "video.mp4";

/// HTTP fetcher. One request per call, redirects followed, no retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Creates a new fetcher.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self { client })
    }

    /// Creates a fetcher with default configuration.
    pub fn with_defaults() -> Result<Self, FetchError> {
        Self::new(FetchConfig::default())
    }

    async fn fetch_once(&self, url: &Url) -> Result<FetchedMedia, FetchError> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(FetchError::UnsupportedScheme {
                scheme: url.scheme().to_string(),
            });
        }

        debug!("Fetching media from {}", url);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(FetchError::Network)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !content_type.as_deref().is_some_and(is_media_content_type) {
            return Err(FetchError::NotMedia { content_type });
        }

        let bytes = Vec::from(response.bytes().await.map_err(FetchError::Body)?);
        let filename = filename_from_url(url);

        info!("Fetched {} ({} bytes) from {}", filename, bytes.len(), url);

        Ok(FetchedMedia { bytes, filename })
    }
}

#[async_trait]
impl MediaFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedMedia, FetchError> {
        let result = self.fetch_once(url).await;
        match &result {
            Ok(_) => metrics::FETCHES.with_label_values(&["success"]).inc(),
            Err(e) => {
                warn!("Fetch of {} failed: {:?}", url, e);
                metrics::FETCHES.with_label_values(&[e.label()]).inc();
            }
        }
        result
    }
}

/// Whether a `Content-Type` value denotes media: `video/*`, `audio/*` or
/// `application/octet-stream`.
pub fn is_media_content_type(content_type: &str) -> bool {
    let lower = content_type.trim().to_ascii_lowercase();
    let essence = lower.split(';').next().unwrap_or("").trim();

    essence.starts_with("video/")
        || essence.starts_with("audio/")
        || essence == "application/octet-stream"
}

/// Display name for a fetched URL: the last path segment when it contains a
/// dot, otherwise [`DEFAULT_FILENAME`].
pub fn filename_from_url(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let decoded = match urlencoding::decode(last) {
        Ok(name) if !name.contains(['/', '\\']) => name.into_owned(),
        _ => last.to_string(),
    };

    if decoded.contains('.') {
        decoded
    } else {
        DEFAULT_FILENAME.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_media_content_types() {
        assert!(is_media_content_type("video/mp4"));
        assert!(is_media_content_type("audio/mpeg"));
        assert!(is_media_content_type("Video/WebM"));
        assert!(is_media_content_type("application/octet-stream"));
        assert!(is_media_content_type("application/octet-stream; charset=binary"));
    }

    #[test]
    fn test_non_media_content_types() {
        assert!(!is_media_content_type("text/html"));
        assert!(!is_media_content_type("text/html; charset=utf-8"));
        assert!(!is_media_content_type("application/json"));
        assert!(!is_media_content_type(""));
    }

    #[test]
    fn test_filename_from_url() {
        assert_eq!(filename_from_url(&url("https://example.com/v.mp4")), "v.mp4");
        assert_eq!(
            filename_from_url(&url("https://example.com/a/b/clip.webm?sig=123")),
            "clip.webm"
        );
        assert_eq!(
            filename_from_url(&url("https://example.com/my%20trip.mov")),
            "my trip.mov"
        );
    }

    #[test]
    fn test_filename_fallback() {
        assert_eq!(filename_from_url(&url("https://example.com/")), DEFAULT_FILENAME);
        assert_eq!(
            filename_from_url(&url("https://example.com/watch?v=abc")),
            DEFAULT_FILENAME
        );
        assert_eq!(
            filename_from_url(&url("https://example.com/stream/")),
            DEFAULT_FILENAME
        );
    }

    #[test]
    fn test_filename_keeps_encoded_separator() {
        assert_eq!(
            filename_from_url(&url("https://example.com/a%2Fb.mp4")),
            "a%2Fb.mp4"
        );
    }

    #[test]
    fn test_new_fetcher() {
        assert!(HttpFetcher::with_defaults().is_ok());
    }

    #[tokio::test]
    async fn test_non_http_scheme_is_rejected_before_request() {
        let fetcher = HttpFetcher::with_defaults().unwrap();

        for target in ["file:///etc/passwd", "ftp://example.com/v.mp4"] {
            let err = fetcher.fetch(&url(target)).await.unwrap_err();
            assert!(matches!(err, FetchError::UnsupportedScheme { .. }), "{}", target);
        }
    }
}
