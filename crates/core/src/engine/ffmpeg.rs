//! FFmpeg-backed engine implementation.
//!
//! Each loaded engine owns a private scratch directory that plays the role
//! of the virtual filesystem. Progress is derived from `-progress pipe:2`
//! output measured against the input duration ffmpeg prints on startup.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use super::config::EngineConfig;
use super::error::EngineError;
use super::traits::{EngineEvent, EngineLoader, TranscodeEngine};

static DURATION_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"Duration:\s*(\d+):(\d{2}):(\d{2}(?:\.\d+)?)").ok());

static PROGRESS_KEY_REGEX: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^([a-z0-9_]+)=(\S*)$").ok());

/// Lines kept for the failure message.
const ERROR_TAIL_LINES: usize = 3;

/// Loads [`FfmpegEngine`]s.
pub struct FfmpegLoader {
    config: EngineConfig,
}

impl FfmpegLoader {
    /// Creates a loader with the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Creates a loader with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    type Engine = FfmpegEngine;

    async fn load(&self) -> Result<FfmpegEngine, EngineError> {
        let output = Command::new(&self.config.ffmpeg_path)
            .arg("-version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::BinaryNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        if !output.status.success() {
            return Err(EngineError::load_failed(format!(
                "ffmpeg -version exited with code: {:?}",
                output.status.code()
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or("ffmpeg")
            .to_string();

        let dir = self.config.scratch_dir.join(Uuid::new_v4().to_string());
        tokio::fs::create_dir_all(&dir).await?;

        info!("{} ready, scratch directory {:?}", version, dir);

        Ok(FfmpegEngine {
            config: self.config.clone(),
            dir,
            version,
        })
    }
}

/// An engine that runs the ffmpeg binary against a private scratch directory.
///
/// The scratch directory is removed when the engine is dropped.
pub struct FfmpegEngine {
    config: EngineConfig,
    dir: PathBuf,
    version: String,
}

impl FfmpegEngine {
    /// The directory backing the virtual filesystem.
    pub fn scratch_dir(&self) -> &Path {
        &self.dir
    }

    /// First line of `ffmpeg -version`.
    pub fn version(&self) -> &str {
        &self.version
    }

    fn resolve(&self, name: &str) -> Result<PathBuf, EngineError> {
        validate_name(name)?;
        Ok(self.dir.join(name))
    }

    /// Global flags followed by the invocation list.
    fn command_args(&self, args: &[String]) -> Vec<String> {
        let mut full = vec![
            "-hide_banner".to_string(),
            "-nostdin".to_string(),
            "-y".to_string(),
            "-loglevel".to_string(),
            self.config.log_level.clone(),
            "-nostats".to_string(),
            "-progress".to_string(),
            "pipe:2".to_string(),
        ];
        full.extend(self.config.extra_args.iter().cloned());
        full.extend(args.iter().cloned());
        full
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            debug!("Failed to remove scratch directory {:?}: {}", self.dir, e);
        }
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    async fn write_file(&self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::write(path, data).await?;
        Ok(())
    }

    async fn exec(
        &self,
        args: &[String],
        events: mpsc::UnboundedSender<EngineEvent>,
    ) -> Result<(), EngineError> {
        let mut child = Command::new(&self.config.ffmpeg_path)
            .current_dir(&self.dir)
            .args(self.command_args(args))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    EngineError::BinaryNotFound {
                        path: self.config.ffmpeg_path.clone(),
                    }
                } else {
                    EngineError::Io(e)
                }
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| EngineError::exec_failed("ffmpeg stderr was not captured", None))?;
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();

        let mut expected_secs: Option<f64> = None;
        let mut tail: VecDeque<String> = VecDeque::with_capacity(ERROR_TAIL_LINES);

        loop {
            buf.clear();
            if reader.read_until(b'\n', &mut buf).await? == 0 {
                break;
            }
            // Metadata is echoed byte for byte and is not always UTF-8.
            let line = String::from_utf8_lossy(&buf)
                .trim_end_matches(['\n', '\r'])
                .to_string();

            if let Some((key, value)) = progress_pair(&line) {
                match key.as_str() {
                    "out_time_ms" => {
                        if let (Some(total), Ok(us)) = (expected_secs, value.parse::<f64>()) {
                            if total > 0.0 {
                                let _ = events.send(EngineEvent::Progress(us / 1_000_000.0 / total));
                            }
                        }
                    }
                    "progress" if value == "end" => {
                        let _ = events.send(EngineEvent::Progress(1.0));
                    }
                    _ => {}
                }
                continue;
            }

            if expected_secs.is_none() {
                if let Some(input_secs) = parse_duration(&line) {
                    expected_secs = Some(expected_output_secs(args, input_secs));
                }
            }

            if tail.len() == ERROR_TAIL_LINES {
                tail.pop_front();
            }
            tail.push_back(line.clone());

            // A closed receiver only means nobody is listening anymore.
            let _ = events.send(EngineEvent::Log(line));
        }

        let status = child.wait().await?;
        if status.success() {
            return Ok(());
        }

        let mut reason = match status.code() {
            Some(code) => format!("ffmpeg exited with code {}", code),
            None => "ffmpeg was terminated by a signal".to_string(),
        };
        if let Some(last) = tail.back() {
            reason.push_str(": ");
            reason.push_str(last.trim());
        }

        Err(EngineError::exec_failed(reason, status.code()))
    }

    async fn read_file(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::FileNotFound {
                    name: name.to_string(),
                }
            } else {
                EngineError::Io(e)
            }
        })
    }

    async fn delete_file(&self, name: &str) -> Result<(), EngineError> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                EngineError::FileNotFound {
                    name: name.to_string(),
                }
            } else {
                EngineError::Io(e)
            }
        })
    }
}

fn validate_name(name: &str) -> Result<(), EngineError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0']);
    if invalid {
        return Err(EngineError::InvalidFileName {
            name: name.to_string(),
        });
    }
    Ok(())
}

fn progress_pair(line: &str) -> Option<(String, String)> {
    let re = PROGRESS_KEY_REGEX.as_ref()?;
    let caps = re.captures(line.trim())?;
    Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string()))
}

/// Parses the `Duration: HH:MM:SS.cc` header line into seconds.
fn parse_duration(line: &str) -> Option<f64> {
    let re = DURATION_REGEX.as_ref()?;
    let caps = re.captures(line)?;
    let hours: f64 = caps.get(1)?.as_str().parse().ok()?;
    let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
    let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Length of the output given the input length and any `-ss`/`-t` trim.
fn expected_output_secs(args: &[String], input_secs: f64) -> f64 {
    let start = arg_value(args, "-ss")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(0.0);
    let remaining = (input_secs - start).max(0.0);

    match arg_value(args, "-t").and_then(|v| v.parse::<f64>().ok()) {
        Some(limit) => limit.min(remaining),
        None => remaining,
    }
}

fn arg_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    fn engine_in(dir: &TempDir) -> FfmpegEngine {
        FfmpegEngine {
            config: EngineConfig::default(),
            dir: dir.path().join("engine"),
            version: "ffmpeg version test".to_string(),
        }
    }

    #[test]
    fn test_parse_duration() {
        let line = "  Duration: 00:01:23.45, start: 0.000000, bitrate: 1205 kb/s";
        let secs = parse_duration(line).unwrap();
        assert!((secs - 83.45).abs() < 0.001);

        assert_eq!(parse_duration("  Duration: N/A, bitrate: N/A"), None);
        assert_eq!(parse_duration("Stream #0:0: Video: h264"), None);
    }

    #[test]
    fn test_progress_pair() {
        assert_eq!(
            progress_pair("out_time_ms=1500000"),
            Some(("out_time_ms".to_string(), "1500000".to_string()))
        );
        assert_eq!(
            progress_pair("progress=end"),
            Some(("progress".to_string(), "end".to_string()))
        );
        assert_eq!(progress_pair("Input #0, mov,mp4, from 'input.mp4':"), None);
    }

    #[test]
    fn test_expected_output_secs() {
        let plain = strings(&["-i", "input.mp4", "out.mp3"]);
        assert_eq!(expected_output_secs(&plain, 100.0), 100.0);

        let trimmed = strings(&["-ss", "10", "-i", "input.mp4", "-t", "30", "out.mp3"]);
        assert_eq!(expected_output_secs(&trimmed, 100.0), 30.0);

        let tail = strings(&["-ss", "90", "-i", "input.mp4", "-t", "30", "out.mp3"]);
        assert_eq!(expected_output_secs(&tail, 100.0), 10.0);

        let past_end = strings(&["-ss", "200", "-i", "input.mp4", "out.mp3"]);
        assert_eq!(expected_output_secs(&past_end, 100.0), 0.0);
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("input.mp4").is_ok());
        assert!(validate_name("my clip.mp3").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("..").is_err());
        assert!(validate_name("../etc/passwd").is_err());
        assert!(validate_name("a\\b").is_err());
    }

    #[test]
    fn test_command_args_order() {
        let dir = TempDir::new().unwrap();
        let mut engine = engine_in(&dir);
        engine.config.extra_args = strings(&["-threads", "2"]);

        let args = engine.command_args(&strings(&["-i", "input.mp4", "out.mp3"]));
        assert_eq!(&args[..3], &strings(&["-hide_banner", "-nostdin", "-y"])[..]);
        assert!(args.contains(&"pipe:2".to_string()));

        let threads = args.iter().position(|a| a == "-threads").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(threads < input);
        assert_eq!(args.last().unwrap(), "out.mp3");
    }

    #[tokio::test]
    async fn test_virtual_file_round_trip() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        std::fs::create_dir_all(engine.scratch_dir()).unwrap();

        engine.write_file("input.mp4", b"bytes").await.unwrap();
        assert_eq!(engine.read_file("input.mp4").await.unwrap(), b"bytes");

        engine.delete_file("input.mp4").await.unwrap();
        let err = engine.read_file("input.mp4").await.unwrap_err();
        assert!(matches!(err, EngineError::FileNotFound { .. }));

        let err = engine.write_file("../escape", b"x").await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidFileName { .. }));
    }

    #[tokio::test]
    async fn test_drop_removes_scratch_dir() {
        let dir = TempDir::new().unwrap();
        let engine = engine_in(&dir);
        std::fs::create_dir_all(engine.scratch_dir()).unwrap();
        let scratch = engine.scratch_dir().to_path_buf();

        drop(engine);
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_load_missing_binary() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::with_ffmpeg_path(PathBuf::from("/nonexistent/bin/ffmpeg"))
            .with_scratch_dir(dir.path().to_path_buf());
        let loader = FfmpegLoader::new(config);

        let err = loader.load().await.err().unwrap();
        assert!(matches!(err, EngineError::BinaryNotFound { .. }));
    }

    #[cfg(unix)]
    fn fake_ffmpeg(dir: &TempDir, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.path().join("ffmpeg");
        let script = format!(
            "#!/bin/sh\nif [ \"$1\" = \"-version\" ]; then\n  echo 'ffmpeg version 6.1-test'\n  exit 0\nfi\nfor last; do :; done\n{}\n",
            body
        );
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    async fn load_fake(dir: &TempDir, body: &str) -> FfmpegEngine {
        let config = EngineConfig::with_ffmpeg_path(fake_ffmpeg(dir, body))
            .with_scratch_dir(dir.path().join("scratch"));
        let engine = FfmpegLoader::new(config).load().await.unwrap();
        engine.write_file("input.mp4", b"video").await.unwrap();
        engine
    }

    #[cfg(unix)]
    async fn run(engine: &FfmpegEngine, args: &[&str]) -> (Result<(), EngineError>, Vec<EngineEvent>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let result = engine.exec(&strings(args), tx).await;
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        (result, events)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_load_reports_version() {
        let dir = TempDir::new().unwrap();
        let engine = load_fake(&dir, "exit 0").await;

        assert_eq!(engine.version(), "ffmpeg version 6.1-test");
        assert!(engine.scratch_dir().starts_with(dir.path().join("scratch")));
        assert!(engine.scratch_dir().join("input.mp4").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_reports_progress() {
        let dir = TempDir::new().unwrap();
        let engine = load_fake(
            &dir,
            r#"echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s" >&2
echo "out_time_ms=5000000" >&2
echo "progress=continue" >&2
echo "out_time_ms=10000000" >&2
echo "progress=end" >&2
printf 'ID3' > "$last""#,
        )
        .await;

        let (result, events) = run(&engine, &["-i", "input.mp4", "clip.mp3"]).await;
        result.unwrap();

        assert!(matches!(&events[0], EngineEvent::Log(line) if line.contains("Duration: 00:00:10.00")));
        assert_eq!(
            &events[1..],
            &[
                EngineEvent::Progress(0.5),
                EngineEvent::Progress(1.0),
                EngineEvent::Progress(1.0),
            ]
        );
        assert_eq!(engine.read_file("clip.mp3").await.unwrap(), b"ID3");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_progress_scales_with_trim() {
        let dir = TempDir::new().unwrap();
        let engine = load_fake(
            &dir,
            r#"echo "  Duration: 00:00:10.00, start: 0.000000, bitrate: 128 kb/s" >&2
echo "out_time_ms=2000000" >&2
printf 'ID3' > "$last""#,
        )
        .await;

        let (result, events) = run(
            &engine,
            &["-ss", "2", "-i", "input.mp4", "-t", "4", "clip.mp3"],
        )
        .await;
        result.unwrap();

        assert!(events.contains(&EngineEvent::Progress(0.5)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_failure_carries_last_line() {
        let dir = TempDir::new().unwrap();
        let engine = load_fake(
            &dir,
            r#"echo "Input #0, mov,mp4, from 'input.mp4':" >&2
echo "input.mp4: Invalid data found when processing input" >&2
exit 1"#,
        )
        .await;

        let (result, events) = run(&engine, &["-i", "input.mp4", "clip.mp3"]).await;

        match result.unwrap_err() {
            EngineError::ExecFailed { reason, exit_code } => {
                assert_eq!(
                    reason,
                    "ffmpeg exited with code 1: input.mp4: Invalid data found when processing input"
                );
                assert_eq!(exit_code, Some(1));
            }
            other => panic!("expected ExecFailed, got {:?}", other),
        }
        assert_eq!(events.len(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_exec_tolerates_non_utf8_output() {
        let dir = TempDir::new().unwrap();
        let engine = load_fake(
            &dir,
            r#"printf '    title           : Caf\351\n' >&2
printf 'ID3' > "$last""#,
        )
        .await;

        let (result, events) = run(&engine, &["-i", "input.mp4", "clip.mp3"]).await;
        result.unwrap();

        assert_eq!(
            events,
            vec![EngineEvent::Log("    title           : Caf\u{FFFD}".to_string())]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_transcoder_converts_with_non_utf8_metadata() {
        use crate::engine::EngineSlot;
        use crate::output::OutputStore;
        use crate::testing::{fixtures, MockFetcher};
        use crate::transcoder::{ConversionState, ConvertOptions, Transcoder};
        use std::sync::Arc;

        let dir = TempDir::new().unwrap();
        let config = EngineConfig::with_ffmpeg_path(fake_ffmpeg(
            &dir,
            r#"printf '    title           : Caf\351\n' >&2
printf 'ID3' > "$last""#,
        ))
        .with_scratch_dir(dir.path().join("scratch"));

        let mut transcoder = Transcoder::new(
            EngineSlot::new(FfmpegLoader::new(config)),
            Arc::new(MockFetcher::new()),
            Arc::new(OutputStore::new()),
        );

        let output = transcoder
            .convert_file(fixtures::video_input("clip.mp4"), &ConvertOptions::default())
            .await
            .unwrap();

        assert_eq!(output.filename, "clip.mp3");
        assert_eq!(transcoder.state(), ConversionState::Done);
        assert!(transcoder.logs().iter().any(|l| l.contains("Caf\u{FFFD}")));
    }
}
