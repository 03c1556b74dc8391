//! Trait definitions for the engine module.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::error::EngineError;

/// An event emitted by an engine while executing.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Completion fraction, nominally `0.0..=1.0` but not guaranteed to be.
    Progress(f64),
    /// One raw diagnostic line.
    Log(String),
}

/// A loaded transcoding engine with a private virtual filesystem.
///
/// Virtual file names are flat; implementations reject names that contain
/// path separators.
#[async_trait]
pub trait TranscodeEngine: Send + Sync {
    /// Returns the name of this engine implementation.
    fn name(&self) -> &str;

    /// Stores `data` under `name`, replacing any previous content.
    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError>;

    /// Runs the engine with `args`.
    ///
    /// Progress and log events are pushed into `events` while the call is
    /// running. The sender is dropped when execution ends, which closes the
    /// subscription. Sending never blocks the engine.
    async fn exec(
        &self,
        args: &[String],
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError>;

    /// Reads the content stored under `name`.
    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    /// Removes `name` from the virtual filesystem.
    async fn delete_file(&self, name: &str) -> Result<(), EngineError>;
}

/// Produces a ready-to-use engine.
#[async_trait]
pub trait EngineLoader: Send + Sync {
    /// The engine type this loader produces.
    type Engine: TranscodeEngine + 'static;

    /// Loads and initializes an engine. Potentially slow.
    async fn load(&self) -> Result<Self::Engine, EngineError>;
}
