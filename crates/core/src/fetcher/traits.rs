//! Trait definitions for the fetcher module.

use async_trait::async_trait;
use reqwest::Url;

use super::error::FetchError;

/// Media downloaded from a URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMedia {
    /// Complete response body.
    pub bytes: Vec<u8>,
    /// Display file name derived from the URL.
    pub filename: String,
}

/// Downloads media from a URL in one attempt.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetches `url` and returns its body, or a user-facing error.
    async fn fetch(&self, url: &Url) -> Result<FetchedMedia, FetchError>;
}
