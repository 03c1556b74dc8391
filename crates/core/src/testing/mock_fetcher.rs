//! Mock media fetcher for testing.

use async_trait::async_trait;
use reqwest::Url;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::fetcher::{FetchError, FetchedMedia, MediaFetcher};

#[derive(Debug, Clone)]
enum Response {
    Media(FetchedMedia),
    Status(u16),
    NotMedia(Option<String>),
}

#[derive(Debug, Default)]
struct FetcherState {
    responses: HashMap<String, Response>,
    requests: Vec<String>,
}

/// Canned-response implementation of [`MediaFetcher`].
///
/// URLs without a configured response answer with status 404. Network
/// failures are not simulated; `reqwest` errors cannot be built by hand.
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    state: Arc<Mutex<FetcherState>>,
}

impl MockFetcher {
    /// Create a new mock fetcher.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, FetcherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, url: &str, response: Response) {
        let key = normalize(url);
        self.lock().responses.insert(key, response);
    }

    /// Serve `bytes` as `filename` for `url`.
    pub fn respond_media(&self, url: &str, bytes: Vec<u8>, filename: &str) {
        self.respond(
            url,
            Response::Media(FetchedMedia {
                bytes,
                filename: filename.to_string(),
            }),
        );
    }

    /// Answer `url` with a non-success status.
    pub fn respond_status(&self, url: &str, status: u16) {
        self.respond(url, Response::Status(status));
    }

    /// Answer `url` with a non-media content type.
    pub fn respond_not_media(&self, url: &str, content_type: &str) {
        self.respond(url, Response::NotMedia(Some(content_type.to_string())));
    }

    /// Every URL fetched so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.lock().requests.clone()
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl MediaFetcher for MockFetcher {
    async fn fetch(&self, url: &Url) -> Result<FetchedMedia, FetchError> {
        let mut state = self.lock();
        state.requests.push(url.to_string());

        match state.responses.get(url.as_str()).cloned() {
            Some(Response::Media(media)) => Ok(media),
            Some(Response::Status(status)) => Err(FetchError::Status { status }),
            Some(Response::NotMedia(content_type)) => Err(FetchError::NotMedia { content_type }),
            None => Err(FetchError::Status { status: 404 }),
        }
    }
}
