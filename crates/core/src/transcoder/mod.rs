//! Transcoding orchestrator.
//!
//! [`Transcoder`] drives one conversion at a time through a small state
//! machine:
//!
//! ```text
//! idle -> loading -> ready -> converting -> done
//!            \                     \
//!             +-------> error <-----+
//! ```
//!
//! `loading` and `ready` are skipped for local files once the engine has
//! been loaded. `done` and `error` are left only through
//! [`Transcoder::reset`], which also releases the output resource.

mod error;
mod log;
mod runner;
mod types;

pub use error::{ErrorKind, TranscodeError};
pub use log::LogBuffer;
pub use runner::Transcoder;
pub use types::{
    Bitrate, ConversionState, ConvertOptions, LocalInput, TranscoderSnapshot, TranscoderUpdate,
};
