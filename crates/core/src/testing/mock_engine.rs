//! Mock engine and loader for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;

use super::fixtures::AUDIO_BYTES;
use crate::engine::{EngineError, EngineEvent, EngineLoader, TranscodeEngine};

#[derive(Debug)]
struct EngineState {
    files: HashMap<String, Vec<u8>>,
    exec_calls: Vec<Vec<String>>,
    events: Vec<EngineEvent>,
    output: Vec<u8>,
    exec_error: Option<String>,
    exec_delay: Duration,
    fail_deletes: bool,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
            exec_calls: Vec::new(),
            events: vec![
                EngineEvent::Log("mock: transcoding".to_string()),
                EngineEvent::Progress(0.5),
                EngineEvent::Progress(1.0),
            ],
            output: AUDIO_BYTES.to_vec(),
            exec_error: None,
            exec_delay: Duration::ZERO,
            fail_deletes: false,
        }
    }
}

/// In-memory implementation of [`TranscodeEngine`].
///
/// `exec` checks that the file after `-i` exists, replays the configured
/// events, and writes the configured output bytes under the last argument.
/// Clones share state, so a test can keep a handle to the engine a loader
/// hands out.
///
/// # Example
///
/// ```rust,ignore
/// let engine = MockEngine::new();
/// engine.fail_exec("Invalid data found when processing input");
///
/// // Run a conversion...
///
/// assert_eq!(engine.exec_calls().len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
}

impl MockEngine {
    /// Create a new mock engine.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the events replayed by every `exec`.
    pub fn set_events(&self, events: Vec<EngineEvent>) {
        self.lock().events = events;
    }

    /// Set the bytes written as output by `exec`.
    pub fn set_output(&self, output: Vec<u8>) {
        self.lock().output = output;
    }

    /// Make every `exec` fail with `reason` after replaying its events.
    pub fn fail_exec(&self, reason: &str) {
        self.lock().exec_error = Some(reason.to_string());
    }

    /// Let `exec` succeed again.
    pub fn clear_exec_failure(&self) {
        self.lock().exec_error = None;
    }

    /// Delay each `exec` by `delay`.
    pub fn set_exec_delay(&self, delay: Duration) {
        self.lock().exec_delay = delay;
    }

    /// Make `delete_file` fail.
    pub fn fail_deletes(&self, fail: bool) {
        self.lock().fail_deletes = fail;
    }

    /// Whether a virtual file currently exists.
    pub fn has_file(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    /// Names of all virtual files, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lock().files.keys().cloned().collect();
        names.sort();
        names
    }

    /// Arguments of every `exec` call, in order.
    pub fn exec_calls(&self) -> Vec<Vec<String>> {
        self.lock().exec_calls.clone()
    }
}

#[async_trait]
impl TranscodeEngine for MockEngine {
    fn name(&self) -> &str {
        "mock"
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.lock().files.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    async fn exec(
        &self,
        args: &[String],
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError> {
        let delay = {
            let mut state = self.lock();
            state.exec_calls.push(args.to_vec());
            state.exec_delay
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let input = args
            .iter()
            .position(|a| a == "-i")
            .and_then(|i| args.get(i + 1));

        let (replay, outcome) = {
            let mut state = self.lock();
            let replay = state.events.clone();
            let outcome = match (input, args.last()) {
                (Some(input), _) if !state.files.contains_key(input) => Err(
                    EngineError::exec_failed(format!("{}: No such file or directory", input), Some(1)),
                ),
                _ if state.exec_error.is_some() => Err(EngineError::exec_failed(
                    state.exec_error.clone().unwrap_or_default(),
                    Some(1),
                )),
                (_, Some(output)) => {
                    let bytes = state.output.clone();
                    state.files.insert(output.clone(), bytes);
                    Ok(())
                }
                (_, None) => Err(EngineError::exec_failed("no output file given", Some(1))),
            };
            (replay, outcome)
        };

        for event in replay {
            let _ = events.send(event);
        }

        outcome
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        self.lock()
            .files
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let mut state = self.lock();
        if state.fail_deletes {
            return Err(EngineError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "delete refused",
            )));
        }
        state
            .files
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| EngineError::FileNotFound {
                name: name.to_string(),
            })
    }
}

#[derive(Debug, Default)]
struct LoaderState {
    load_count: usize,
    next_error: Option<String>,
    load_delay: Duration,
}

/// Loader that hands out clones of one shared [`MockEngine`].
///
/// Clones share state, so a test can keep a handle after moving a clone
/// into an `EngineSlot`.
#[derive(Debug, Clone, Default)]
pub struct MockLoader {
    engine: MockEngine,
    state: Arc<Mutex<LoaderState>>,
}

impl MockLoader {
    /// Create a new mock loader.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every load by `delay`.
    pub fn with_load_delay(self, delay: Duration) -> Self {
        self.lock().load_delay = delay;
        self
    }

    fn lock(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The engine every successful load returns.
    pub fn engine(&self) -> &MockEngine {
        &self.engine
    }

    /// Make the next load fail with `reason`.
    pub fn fail_next_load(&self, reason: &str) {
        self.lock().next_error = Some(reason.to_string());
    }

    /// Number of load attempts, failures included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }
}

#[async_trait]
impl EngineLoader for MockLoader {
    type Engine = MockEngine;

    async fn load(&self) -> Result<MockEngine, EngineError> {
        let (delay, error) = {
            let mut state = self.lock();
            state.load_count += 1;
            (state.load_delay, state.next_error.take())
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match error {
            Some(reason) => Err(EngineError::load_failed(reason)),
            None => Ok(self.engine.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_exec_writes_output() {
        let engine = MockEngine::new();
        engine.write_file("input.mp4", b"video").await.unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        engine
            .exec(&args(&["-i", "input.mp4", "clip.mp3"]), tx)
            .await
            .unwrap();

        assert_eq!(engine.read_file("clip.mp3").await.unwrap(), AUDIO_BYTES);
        assert_eq!(rx.recv().await, Some(EngineEvent::Log("mock: transcoding".to_string())));
        assert_eq!(engine.exec_calls().len(), 1);
    }

    #[tokio::test]
    async fn test_exec_requires_input() {
        let engine = MockEngine::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = engine
            .exec(&args(&["-i", "input.mp4", "clip.mp3"]), tx)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No such file"));
        assert!(!engine.has_file("clip.mp3"));
    }

    #[tokio::test]
    async fn test_loader_shares_engine() {
        let loader = MockLoader::new();
        let engine = loader.load().await.unwrap();
        engine.write_file("a", b"1").await.unwrap();
        assert!(loader.engine().has_file("a"));
    }
}
