//! Transcoder implementation.
//!
//! One conversion at a time, strictly sequenced:
//! fetch (URL mode) -> engine load (first run only) -> write -> exec -> read
//! -> publish output -> scratch cleanup.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info};

use super::error::{ErrorKind, TranscodeError};
use super::log::LogBuffer;
use super::types::{
    ConversionState, ConvertOptions, LocalInput, TranscoderSnapshot, TranscoderUpdate,
};
use crate::engine::{EngineEvent, EngineLoader, EngineSlot, Scratch, TranscodeEngine};
use crate::fetcher::MediaFetcher;
use crate::metrics;
use crate::output::{OutputResource, OutputStore, AUDIO_MPEG};
use crate::validate::{is_accepted_media_input, validate_url};

/// Capacity of the update channel. Slow subscribers skip ahead.
const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Drives conversions and owns the resulting output resource.
///
/// Methods that start or end a conversion take `&mut self`, so overlapping
/// conversions and a reset in the middle of one cannot be expressed. At most
/// one output resource is live per transcoder; it is released by the next
/// attempt, by [`reset`](Self::reset), or when the transcoder is dropped.
pub struct Transcoder<L: EngineLoader> {
    engine: EngineSlot<L>,
    fetcher: Arc<dyn MediaFetcher>,
    store: Arc<OutputStore>,

    state: ConversionState,
    progress: u8,
    status_text: String,
    logs: LogBuffer,
    output: Option<OutputResource>,
    error: Option<(ErrorKind, String)>,
    updates: broadcast::Sender<TranscoderUpdate>,
}

impl<L: EngineLoader> Transcoder<L> {
    /// Create a new transcoder in the idle state.
    pub fn new(engine: EngineSlot<L>, fetcher: Arc<dyn MediaFetcher>, store: Arc<OutputStore>) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);

        Self {
            engine,
            fetcher,
            store,
            state: ConversionState::Idle,
            progress: 0,
            status_text: String::new(),
            logs: LogBuffer::new(),
            output: None,
            error: None,
            updates,
        }
    }

    pub fn state(&self) -> ConversionState {
        self.state
    }

    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn status_text(&self) -> &str {
        &self.status_text
    }

    pub fn logs(&self) -> &[String] {
        self.logs.lines()
    }

    pub fn output(&self) -> Option<&OutputResource> {
        self.output.as_ref()
    }

    /// Display text of the last failure.
    pub fn error(&self) -> Option<&str> {
        self.error.as_ref().map(|(_, message)| message.as_str())
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|(kind, _)| *kind)
    }

    /// Subscribe to state, progress, status and log updates.
    pub fn subscribe(&self) -> broadcast::Receiver<TranscoderUpdate> {
        self.updates.subscribe()
    }

    pub fn snapshot(&self) -> TranscoderSnapshot {
        TranscoderSnapshot {
            state: self.state,
            progress: self.progress,
            status_text: self.status_text.clone(),
            logs: self.logs.lines().to_vec(),
            output: self.output.clone(),
            error: self.error().map(str::to_string),
            error_kind: self.error_kind(),
        }
    }

    /// Convert a local file.
    ///
    /// Unsupported files are rejected before any state change.
    pub async fn convert_file(
        &mut self,
        input: LocalInput,
        options: &ConvertOptions,
    ) -> Result<OutputResource, TranscodeError> {
        self.ensure_idle()?;

        if !is_accepted_media_input(&input.meta) {
            return Err(TranscodeError::UnsupportedInput {
                name: input.meta.name,
            });
        }

        info!(
            "Converting local file {} ({} bytes) at {} kbps",
            input.meta.name,
            input.meta.size_bytes,
            options.bitrate.kbps()
        );

        let started = self.begin_attempt();
        let result = self
            .run_conversion(&input.bytes, &input.meta.name, options)
            .await;
        self.finish(result, started)
    }

    /// Fetch `url` and convert it.
    ///
    /// A malformed URL is rejected before any state change.
    pub async fn convert_url(
        &mut self,
        url: &str,
        options: &ConvertOptions,
    ) -> Result<OutputResource, TranscodeError> {
        self.ensure_idle()?;
        let url = validate_url(url)?;

        info!("Converting remote media {} at {} kbps", url, options.bitrate.kbps());

        let started = self.begin_attempt();

        self.set_state(ConversionState::Loading);
        self.set_status("fetching media from URL...");
        self.log(format!("Fetching: {}", url));

        let fetched = self.fetcher.fetch(&url).await;
        let result = match fetched {
            Ok(media) => {
                self.log(format!(
                    "Fetched {} ({} bytes)",
                    media.filename,
                    media.bytes.len()
                ));
                self.run_conversion(&media.bytes, &media.filename, options)
                    .await
            }
            Err(e) => Err(e.into()),
        };

        self.finish(result, started)
    }

    /// Return to idle, releasing the output resource and clearing progress,
    /// status, logs and error. Safe to call repeatedly.
    pub fn reset(&mut self) {
        self.release_output();
        self.logs.clear();
        self.error = None;
        self.set_progress(0);
        self.set_status("");
        self.set_state(ConversionState::Idle);
    }

    fn ensure_idle(&self) -> Result<(), TranscodeError> {
        if self.state != ConversionState::Idle {
            return Err(TranscodeError::InvalidState { state: self.state });
        }
        Ok(())
    }

    fn begin_attempt(&mut self) -> Instant {
        self.release_output();
        self.logs.clear();
        self.error = None;
        Instant::now()
    }

    async fn load_engine(&mut self) -> Result<Arc<L::Engine>, TranscodeError> {
        if let Some(engine) = self.engine.get() {
            return Ok(engine);
        }

        self.set_state(ConversionState::Loading);
        self.set_status("loading converter...");
        self.log("Loading transcoding engine...");

        let engine = self
            .engine
            .get_or_load()
            .await
            .map_err(TranscodeError::EngineLoad)?;

        self.log(format!("Engine '{}' loaded.", engine.name()));
        self.set_state(ConversionState::Ready);
        Ok(engine)
    }

    async fn run_conversion(
        &mut self,
        bytes: &[u8],
        source_name: &str,
        options: &ConvertOptions,
    ) -> Result<OutputResource, TranscodeError> {
        let engine = self.load_engine().await?;

        self.set_state(ConversionState::Converting);
        self.set_progress(0);
        self.set_status("converting...");

        let scratch = Scratch::new(engine.as_ref(), source_name);
        let download_name = scratch.download_name().to_string();

        let result = self.execute(&scratch, bytes, options).await;
        scratch.remove_all().await;
        let audio = result?;

        self.release_output();
        let resource = self.store.create(audio, AUDIO_MPEG, download_name);
        metrics::OUTPUT_BYTES.inc_by(resource.size_bytes);

        self.output = Some(resource.clone());
        self.set_progress(100);
        self.set_status("done!");
        self.set_state(ConversionState::Done);

        Ok(resource)
    }

    async fn execute(
        &mut self,
        scratch: &Scratch<'_, L::Engine>,
        bytes: &[u8],
        options: &ConvertOptions,
    ) -> Result<Vec<u8>, TranscodeError> {
        self.log(format!("Writing input: {}", scratch.input_name()));
        scratch.put(bytes).await.map_err(TranscodeError::Engine)?;

        let args = options.engine_args(scratch.input_name(), scratch.output_name());
        self.log(format!("Running: ffmpeg {}", args.join(" ")));

        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let exec = scratch.exec(&args, events_tx);
        tokio::pin!(exec);

        let outcome = loop {
            tokio::select! {
                Some(event) = events_rx.recv() => self.handle_event(event),
                result = &mut exec => break result,
            }
        };

        // Events sent right before exec returned.
        while let Ok(event) = events_rx.try_recv() {
            self.handle_event(event);
        }

        outcome.map_err(TranscodeError::EngineExec)?;

        self.log("Reading output...");
        scratch.get().await.map_err(TranscodeError::Engine)
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::Progress(fraction) => {
                if fraction.is_finite() {
                    let percent = (fraction * 100.0).clamp(0.0, 100.0).round() as u8;
                    self.set_progress(percent);
                }
            }
            EngineEvent::Log(line) => {
                debug!(target: "audora::engine", "{}", line);
                self.log(line);
            }
        }
    }

    fn finish(
        &mut self,
        result: Result<OutputResource, TranscodeError>,
        started: Instant,
    ) -> Result<OutputResource, TranscodeError> {
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(resource) => {
                info!(
                    "Conversion finished: {} ({} bytes) in {:.1}s",
                    resource.filename, resource.size_bytes, elapsed
                );
                metrics::CONVERSIONS.with_label_values(&["success"]).inc();
                metrics::CONVERSION_DURATION
                    .with_label_values(&["success"])
                    .observe(elapsed);
            }
            Err(e) => {
                error!("Conversion failed ({:?}): {}", e.kind(), e);
                metrics::CONVERSIONS.with_label_values(&["failed"]).inc();
                metrics::CONVERSION_DURATION
                    .with_label_values(&["failed"])
                    .observe(elapsed);

                let message = e.to_string();
                self.log(format!("ERROR: {}", message));
                self.error = Some((e.kind(), message));
                self.set_status("error");
                self.set_state(ConversionState::Error);
            }
        }

        result
    }

    fn release_output(&mut self) {
        if let Some(output) = self.output.take() {
            self.store.revoke(&output.reference);
        }
    }

    fn set_state(&mut self, state: ConversionState) {
        if self.state != state {
            debug!("Transcoder state {} -> {}", self.state, state);
            self.state = state;
            let _ = self.updates.send(TranscoderUpdate::State(state));
        }
    }

    fn set_progress(&mut self, progress: u8) {
        if self.progress != progress {
            self.progress = progress;
            let _ = self.updates.send(TranscoderUpdate::Progress(progress));
        }
    }

    fn set_status(&mut self, text: &str) {
        if self.status_text != text {
            self.status_text = text.to_string();
            let _ = self.updates.send(TranscoderUpdate::Status(self.status_text.clone()));
        }
    }

    fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        let _ = self.updates.send(TranscoderUpdate::Log(line.clone()));
        self.logs.push(line);
    }
}

impl<L: EngineLoader> Drop for Transcoder<L> {
    fn drop(&mut self) {
        self.release_output();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{fixtures, MockFetcher, MockLoader};

    fn transcoder(loader: &MockLoader) -> Transcoder<MockLoader> {
        Transcoder::new(
            EngineSlot::new(loader.clone()),
            Arc::new(MockFetcher::new()),
            Arc::new(OutputStore::new()),
        )
    }

    #[tokio::test]
    async fn test_progress_is_clamped() {
        let loader = MockLoader::new();
        loader
            .engine()
            .set_events(vec![EngineEvent::Progress(-0.5), EngineEvent::Progress(1.7)]);
        let mut t = transcoder(&loader);
        let mut rx = t.subscribe();

        t.convert_file(fixtures::video_input("a.mp4"), &ConvertOptions::default())
            .await
            .unwrap();

        let mut seen = Vec::new();
        while let Ok(update) = rx.try_recv() {
            if let TranscoderUpdate::Progress(p) = update {
                seen.push(p);
            }
        }
        assert!(seen.iter().all(|p| *p <= 100));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_nan_progress_is_ignored() {
        let loader = MockLoader::new();
        loader.engine().set_events(vec![
            EngineEvent::Progress(0.4),
            EngineEvent::Progress(f64::NAN),
        ]);
        let mut t = transcoder(&loader);
        let mut rx = t.subscribe();

        t.convert_file(fixtures::video_input("a.mp4"), &ConvertOptions::default())
            .await
            .unwrap();

        let progress: Vec<u8> = std::iter::from_fn(|| rx.try_recv().ok())
            .filter_map(|u| match u {
                TranscoderUpdate::Progress(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![40, 100]);
    }

    #[tokio::test]
    async fn test_engine_logs_are_captured() {
        let loader = MockLoader::new();
        loader.engine().set_events(vec![
            EngineEvent::Log("Input #0, mov,mp4".to_string()),
            EngineEvent::Log("Output #0, mp3".to_string()),
        ]);
        let mut t = transcoder(&loader);

        t.convert_file(fixtures::video_input("a.mp4"), &ConvertOptions::default())
            .await
            .unwrap();

        let logs = t.logs();
        assert!(logs.iter().any(|l| l == "Input #0, mov,mp4"));
        assert!(logs.iter().any(|l| l.starts_with("Running: ffmpeg -i input.mp4")));
        assert_eq!(logs.last().map(String::as_str), Some("Reading output..."));
    }

    #[tokio::test]
    async fn test_drop_releases_output() {
        let loader = MockLoader::new();
        let store = Arc::new(OutputStore::new());
        let mut t = Transcoder::new(
            EngineSlot::new(loader.clone()),
            Arc::new(MockFetcher::new()),
            Arc::clone(&store),
        );

        t.convert_file(fixtures::video_input("a.mp4"), &ConvertOptions::default())
            .await
            .unwrap();
        assert_eq!(store.live_count(), 1);

        drop(t);
        assert_eq!(store.live_count(), 0);
    }

    #[tokio::test]
    async fn test_snapshot() {
        let loader = MockLoader::new();
        let mut t = transcoder(&loader);

        let snapshot = t.snapshot();
        assert_eq!(snapshot.state, ConversionState::Idle);
        assert!(snapshot.output.is_none());

        t.convert_file(fixtures::video_input("a.mp4"), &ConvertOptions::default())
            .await
            .unwrap();

        let snapshot = t.snapshot();
        assert_eq!(snapshot.state, ConversionState::Done);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.status_text, "done!");
        assert_eq!(snapshot.output.unwrap().filename, "a.mp3");
        assert!(snapshot.error.is_none());
    }
}
