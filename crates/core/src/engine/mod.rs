//! Transcoding engine boundary.
//!
//! The orchestrator only ever talks to an engine through the
//! [`TranscodeEngine`] trait: write a named buffer into the engine's private
//! scratch namespace, execute an argument list, read the result back and
//! delete the scratch files. How the engine does the actual decoding is
//! opaque.
//!
//! - [`EngineLoader`] produces an engine; loading is the expensive step.
//! - [`EngineSlot`] memoizes the loaded engine with single-flight semantics.
//! - [`Scratch`] scopes the virtual input/output files of one conversion.
//! - [`FfmpegEngine`] is the native implementation backed by an `ffmpeg`
//!   binary and a private scratch directory.
//!
//! # Example
//!
//! ```ignore
//! use audora_core::engine::{EngineConfig, EngineSlot, FfmpegLoader};
//!
//! let slot = EngineSlot::new(FfmpegLoader::new(EngineConfig::default()));
//! let engine = slot.get_or_load().await?;
//! println!("using {}", engine.name());
//! ```

mod config;
mod error;
mod ffmpeg;
mod scratch;
mod slot;
mod traits;

pub use config::EngineConfig;
pub use error::EngineError;
pub use ffmpeg::{FfmpegEngine, FfmpegLoader};
pub use scratch::Scratch;
pub use slot::EngineSlot;
pub use traits::{EngineEvent, EngineLoader, TranscodeEngine};
