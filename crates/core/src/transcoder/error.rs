//! Error types for the transcoder module.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::ConversionState;
use crate::engine::EngineError;
use crate::fetcher::FetchError;
use crate::validate::ValidationError;

/// Coarse failure category, stable across message wording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Local input of an unsupported type.
    Input,
    /// Malformed URL or option fields.
    Validation,
    /// Remote fetch failure of any sort.
    Network,
    /// The engine could not be loaded.
    EngineLoad,
    /// The engine failed while converting.
    EngineExec,
    /// Scratch cleanup failure. Swallowed by the transcoder, never reported.
    Cleanup,
    /// A conversion was requested outside the idle state.
    InvalidState,
}

/// Errors that end a conversion request.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The local file is not a supported video.
    #[error("Unsupported file type: {name}. Use mp4, webm, ogg, mov, avi, mkv or 3gp.")]
    UnsupportedInput { name: String },

    /// Pre-flight validation failed.
    #[error("{0}")]
    Validation(#[from] ValidationError),

    /// The remote fetch failed.
    #[error("{0}")]
    Fetch(#[from] FetchError),

    /// Loading the engine failed.
    #[error("{0}")]
    EngineLoad(#[source] EngineError),

    /// The engine run failed.
    #[error("Conversion failed: {0}")]
    EngineExec(#[source] EngineError),

    /// Moving bytes in or out of the engine failed.
    #[error("{0}")]
    Engine(#[source] EngineError),

    /// The transcoder must be reset before it can convert again.
    #[error("Cannot start a conversion while {state}; reset first")]
    InvalidState { state: ConversionState },
}

impl TranscodeError {
    /// The category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedInput { .. } => ErrorKind::Input,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Fetch(_) => ErrorKind::Network,
            Self::EngineLoad(_) => ErrorKind::EngineLoad,
            Self::EngineExec(_) | Self::Engine(_) => ErrorKind::EngineExec,
            Self::InvalidState { .. } => ErrorKind::InvalidState,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exec_failure_prefix() {
        let err = TranscodeError::EngineExec(EngineError::exec_failed(
            "ffmpeg exited with code 1",
            Some(1),
        ));
        assert_eq!(err.to_string(), "Conversion failed: ffmpeg exited with code 1");
        assert_eq!(err.kind(), ErrorKind::EngineExec);
    }

    #[test]
    fn test_kinds() {
        let err = TranscodeError::from(FetchError::Status { status: 500 });
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("500"));

        let err = TranscodeError::from(ValidationError::UrlEmpty);
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = TranscodeError::EngineLoad(EngineError::load_failed("boom"));
        assert_eq!(err.kind(), ErrorKind::EngineLoad);

        let err = TranscodeError::InvalidState {
            state: ConversionState::Done,
        };
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            err.to_string(),
            "Cannot start a conversion while done; reset first"
        );
    }
}
