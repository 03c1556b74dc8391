//! Error types for the fetcher module.

use thiserror::Error;

/// Errors that end a remote fetch. Display text is the user-facing guidance.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request never produced a response (unreachable host, refused
    /// connection, TLS failure, or a cross-origin block).
    #[error("This link cannot be fetched by your browser. This is usually a CORS restriction. Download the video and use Upload instead.")]
    Network(#[source] reqwest::Error),

    /// Only `http` and `https` URLs are fetched.
    #[error("URL must start with http:// or https://")]
    UnsupportedScheme { scheme: String },

    /// The server answered with a non-success status.
    #[error("Server returned {status}. Download the video and use Upload instead.")]
    Status { status: u16 },

    /// The response is not media, e.g. an HTML login page served with 200.
    #[error("The URL does not point to a media file. Try a direct .mp4 or .webm link.")]
    NotMedia { content_type: Option<String> },

    /// The response body could not be read completely.
    #[error("Failed to read the media response: {0}")]
    Body(#[source] reqwest::Error),

    /// The HTTP client could not be constructed.
    #[error("Failed to initialize HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Short label used for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Network(_) => "network",
            Self::UnsupportedScheme { .. } => "scheme",
            Self::Status { .. } => "status",
            Self::NotMedia { .. } => "content_type",
            Self::Body(_) => "body",
            Self::Client(_) => "client",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_message_includes_code() {
        let err = FetchError::Status { status: 404 };
        assert_eq!(
            err.to_string(),
            "Server returned 404. Download the video and use Upload instead."
        );
        assert_eq!(err.label(), "status");
    }

    #[test]
    fn test_unsupported_scheme_message() {
        let err = FetchError::UnsupportedScheme {
            scheme: "file".to_string(),
        };
        assert_eq!(err.to_string(), "URL must start with http:// or https://");
        assert_eq!(err.label(), "scheme");
    }

    #[test]
    fn test_not_media_message() {
        let err = FetchError::NotMedia {
            content_type: Some("text/html".to_string()),
        };
        assert!(err.to_string().contains("does not point to a media file"));
        assert_eq!(err.label(), "content_type");
    }
}
