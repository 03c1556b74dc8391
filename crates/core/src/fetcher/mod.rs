//! Remote media fetcher.
//!
//! A single-shot download of a media URL into memory. There is no retry: a
//! transient network failure cannot be told apart from a cross-origin or
//! policy block, and retrying the latter is pointless, so every failure is
//! surfaced immediately with guidance to use a local file instead.

mod config;
mod error;
mod http;
mod traits;

pub use config::FetchConfig;
pub use error::FetchError;
pub use http::{filename_from_url, is_media_content_type, HttpFetcher, DEFAULT_FILENAME};
pub use traits::{FetchedMedia, MediaFetcher};
