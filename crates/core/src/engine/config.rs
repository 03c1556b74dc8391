//! Configuration for the process-backed engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for [`FfmpegLoader`](super::FfmpegLoader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the ffmpeg binary.
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: PathBuf,

    /// Parent directory of per-engine scratch directories.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    /// Levels below `info` hide the input duration, so progress stays at zero.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Additional global ffmpeg arguments, placed before the invocation list.
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_ffmpeg_path() -> PathBuf {
    PathBuf::from("ffmpeg")
}

fn default_scratch_dir() -> PathBuf {
    std::env::temp_dir().join("audora")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg_path(),
            scratch_dir: default_scratch_dir(),
            log_level: default_log_level(),
            extra_args: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Creates a config with a custom ffmpeg path.
    pub fn with_ffmpeg_path(ffmpeg_path: PathBuf) -> Self {
        Self {
            ffmpeg_path,
            ..Default::default()
        }
    }

    /// Sets the scratch directory.
    pub fn with_scratch_dir(mut self, scratch_dir: PathBuf) -> Self {
        self.scratch_dir = scratch_dir;
        self
    }

    /// Sets the ffmpeg log level.
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.ffmpeg_path, PathBuf::from("ffmpeg"));
        assert_eq!(config.log_level, "info");
        assert!(config.scratch_dir.ends_with("audora"));
        assert!(config.extra_args.is_empty());
    }

    #[test]
    fn test_config_builder() {
        let config = EngineConfig::with_ffmpeg_path(PathBuf::from("/opt/ffmpeg/bin/ffmpeg"))
            .with_scratch_dir(PathBuf::from("/tmp/scratch"))
            .with_log_level("verbose");

        assert_eq!(config.ffmpeg_path, PathBuf::from("/opt/ffmpeg/bin/ffmpeg"));
        assert_eq!(config.scratch_dir, PathBuf::from("/tmp/scratch"));
        assert_eq!(config.log_level, "verbose");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: EngineConfig = toml::from_str(r#"ffmpeg_path = "/usr/bin/ffmpeg""#).unwrap();
        assert_eq!(config.ffmpeg_path, PathBuf::from("/usr/bin/ffmpeg"));
        assert_eq!(config.log_level, "info");
    }
}
