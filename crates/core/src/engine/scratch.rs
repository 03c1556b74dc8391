//! Per-conversion scratch files inside an engine's virtual filesystem.

use tokio::sync::mpsc;

use super::error::EngineError;
use super::traits::{EngineEvent, TranscodeEngine};
use crate::validate::{input_extension, output_filename};

const FALLBACK_OUTPUT_NAME: &str = "output.mp3";

/// The virtual input and output files of a single conversion.
///
/// Names are fixed per source file, which is only safe because one engine
/// never runs two conversions at a time. Call [`Scratch::remove_all`] once
/// the output has been read; removal is best-effort.
pub struct Scratch<'a, E: TranscodeEngine + ?Sized> {
    engine: &'a E,
    input_name: String,
    output_name: String,
    download_name: String,
}

impl<'a, E: TranscodeEngine + ?Sized> Scratch<'a, E> {
    /// Derives the scratch names for `source_name` (a file name, possibly with directories).
    pub fn new(engine: &'a E, source_name: &str) -> Self {
        let base = base_name(source_name);
        let input_name = format!("input.{}", input_extension(base));

        let download_name = output_filename(base);
        let output_name = if download_name == input_name {
            FALLBACK_OUTPUT_NAME.to_string()
        } else {
            download_name.clone()
        };

        Self {
            engine,
            input_name,
            output_name,
            download_name,
        }
    }

    /// Virtual name of the input file.
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    /// Virtual name of the output file.
    pub fn output_name(&self) -> &str {
        &self.output_name
    }

    /// File name offered to the user for the produced audio.
    pub fn download_name(&self) -> &str {
        &self.download_name
    }

    /// Writes the input bytes.
    pub async fn put(&self, data: &[u8]) -> Result<(), EngineError> {
        self.engine.write_file(&self.input_name, data).await
    }

    /// Runs the engine.
    pub async fn exec(
        &self,
        args: &[String],
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError> {
        self.engine.exec(args, events).await
    }

    /// Reads the produced output.
    pub async fn get(&self) -> Result<Vec<u8>, EngineError> {
        self.engine.read_file(&self.output_name).await
    }

    /// Deletes both files. Failures are swallowed without a trace.
    pub async fn remove_all(self) {
        for name in [&self.input_name, &self.output_name] {
            let _ = self.engine.delete_file(name).await;
        }
    }
}

fn base_name(source_name: &str) -> &str {
    let base = source_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(source_name);
    if base.is_empty() {
        "video.mp4"
    } else {
        base
    }
}
