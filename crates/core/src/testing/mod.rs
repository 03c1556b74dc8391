//! Testing utilities and mock implementations.
//!
//! Mocks for the engine and fetcher seams, so the transcoder can be driven
//! end to end without an ffmpeg binary or a network.
//!
//! # Example
//!
//! ```rust,ignore
//! use audora_core::testing::{fixtures, MockFetcher, MockLoader};
//!
//! let loader = MockLoader::new();
//! loader.engine().set_output(b"ID3".to_vec());
//!
//! let fetcher = MockFetcher::new();
//! fetcher.respond_media("https://cdn.example/a.mp4", fixtures::VIDEO_BYTES.to_vec(), "a.mp4");
//!
//! // Build a Transcoder around them...
//! ```

mod mock_engine;
mod mock_fetcher;

pub use mock_engine::{MockEngine, MockLoader};
pub use mock_fetcher::MockFetcher;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::transcoder::LocalInput;

    /// Stand-in video content. Engines under test never decode it.
    pub const VIDEO_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42fake-video-payload";

    /// Stand-in MP3 content produced by [`super::MockEngine`] by default.
    pub const AUDIO_BYTES: &[u8] = b"ID3\x04\x00\x00\x00\x00\x00\x00fake-mp3-frames";

    /// A local video input named `name`, with the MIME type its extension implies.
    pub fn video_input(name: &str) -> LocalInput {
        let mime = match name.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
            Some("mp4") | Some("m4v") => Some("video/mp4"),
            Some("mov") => Some("video/quicktime"),
            Some("webm") => Some("video/webm"),
            Some("mkv") => Some("video/x-matroska"),
            Some("avi") => Some("video/x-msvideo"),
            _ => None,
        };
        LocalInput::new(name, mime.map(str::to_string), VIDEO_BYTES.to_vec())
    }

    /// A local input that is not media.
    pub fn text_input(name: &str) -> LocalInput {
        LocalInput::new(name, Some("text/plain".to_string()), b"hello".to_vec())
    }
}
